pub mod identity;
pub mod ingest_service;
pub mod media;
pub mod staging;
pub mod storage;
pub mod storage_key;
pub mod video_store;
