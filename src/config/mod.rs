use std::env;
use std::path::PathBuf;

/// Hard cap on the size of an upload request body (1 GiB)
pub const MAX_UPLOAD_SIZE: u64 = 1 << 30;

/// Application configuration, built once at startup and handed to every service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum request body size in bytes (default: 1 GiB)
    pub max_upload_size: u64,

    /// JWT signing secret (Required in production)
    pub jwt_secret: String,

    /// Destination bucket for published videos
    pub s3_bucket: String,

    /// Bucket region (default: "us-east-1")
    pub s3_region: String,

    /// Custom S3 endpoint (MinIO, localstack). Enables path-style addressing.
    pub s3_endpoint: Option<String>,

    /// Static access key, otherwise the default AWS provider chain is used
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    /// Origin prepended to storage keys to build public URLs (CDN distribution)
    pub public_origin: String,

    /// Directory for staged upload artifacts (default: OS temp dir)
    pub temp_dir: PathBuf,

    /// Remux tool binary (default: "ffmpeg")
    pub ffmpeg_path: String,

    /// Probe tool binary (default: "ffprobe")
    pub ffprobe_path: String,

    /// Metadata database URL
    pub database_url: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_upload_size: MAX_UPLOAD_SIZE,
            jwt_secret: "secret".to_string(),
            s3_bucket: "videos".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            public_origin: "http://localhost:9000/videos".to_string(),
            temp_dir: env::temp_dir(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            database_url: "sqlite://videos.db?mode=rwc".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),

            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),

            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),

            public_origin: env::var("S3_CF_DISTRIBUTION")
                .or_else(|_| env::var("PUBLIC_ORIGIN"))
                .unwrap_or(default.public_origin),

            temp_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (local MinIO, relaxed secrets)
    pub fn development() -> Self {
        Self {
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            ..Self::default()
        }
    }

    /// Create config for production (strict secrets)
    pub fn production() -> Self {
        let from_env = Self::from_env();
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            s3_bucket: env::var("S3_BUCKET").expect("CRITICAL: S3_BUCKET must be set"),
            ..from_env
        }
    }

    /// Pick the constructor for an `APP_ENV` value; anything unrecognised
    /// reads the environment as-is.
    pub fn for_environment(app_env: Option<&str>) -> Self {
        match app_env {
            Some("production") => Self::production(),
            Some("development") => Self::development(),
            _ => Self::from_env(),
        }
    }

    /// Public URL of an object stored under `key`
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_origin.trim_end_matches('/'), key)
    }
}
