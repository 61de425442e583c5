use crate::entities::{prelude::*, videos};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

/// Video metadata records
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(
        &self,
        user_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<videos::Model, DbErr>;

    async fn get(&self, video_id: &str) -> Result<Option<videos::Model>, DbErr>;

    /// Set the published URL of an existing record
    async fn set_published_url(&self, video_id: &str, url: &str) -> Result<(), DbErr>;
}

pub struct SeaOrmVideoStore {
    db: DatabaseConnection,
}

impl SeaOrmVideoStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VideoStore for SeaOrmVideoStore {
    async fn create(
        &self,
        user_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<videos::Model, DbErr> {
        let now = Utc::now();
        let video = videos::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            title: Set(title.to_string()),
            description: Set(description.map(str::to_string)),
            video_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        video.insert(&self.db).await
    }

    async fn get(&self, video_id: &str) -> Result<Option<videos::Model>, DbErr> {
        Videos::find_by_id(video_id.to_string()).one(&self.db).await
    }

    async fn set_published_url(&self, video_id: &str, url: &str) -> Result<(), DbErr> {
        let video = Videos::find_by_id(video_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("video {}", video_id)))?;

        let mut active: videos::ActiveModel = video.into();
        active.video_url = Set(Some(url.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        Ok(())
    }
}
