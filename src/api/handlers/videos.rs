use crate::api::error::AppError;
use crate::entities::videos;
use crate::services::identity::Identity;
use crate::utils::validation::{check_declared_length, is_body_limit_error, parse_video_id};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use validator::Validate;

/// Multipart form field carrying the video bytes
pub const VIDEO_FIELD: &str = "video";

#[derive(Serialize, ToSchema)]
pub struct UploadVideoResponse {
    pub video_url: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VideoResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<videos::Model> for VideoResponse {
    fn from(v: videos::Model) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            title: v.title,
            description: v.description,
            video_url: v.video_url,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

fn multipart_error(e: &(dyn std::error::Error + 'static)) -> AppError {
    if is_body_limit_error(e) {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(format!("Couldn't parse multipart form: {}", e))
    }
}

#[utoipa::path(
    post,
    path = "/api/video_upload/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    request_body(content = Vec<u8>, description = "Form with a `video` file field (video/mp4)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video published", body = UploadVideoResponse),
        (status = 400, description = "Invalid ID, media type, form or size"),
        (status = 401, description = "Missing/invalid token or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 500, description = "Processing, storage or persistence failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadVideoResponse>, AppError> {
    // Ownership is settled before any of the body is read
    let video = state.ingest.authorize_upload(&identity, &video_id).await?;

    check_declared_length(&headers, state.config.max_upload_size)
        .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;

    let mut multipart = multipart.map_err(|e| multipart_error(&e))?;

    tracing::info!("⬆️  Uploading video {} for user {}", video.id, identity.user_id);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(|s| s.to_string());

        // Cancelled if the client disconnects and this future is dropped
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        let reader = StreamReader::new(field.map_err(std::io::Error::other));

        let video_url = state
            .ingest
            .publish(&video, content_type.as_deref(), reader, &cancel)
            .await?;

        return Ok(Json(UploadVideoResponse { video_url }));
    }

    Err(AppError::BadRequest("Missing video field".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video draft created", body = VideoResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn create_video(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VideoResponse>), AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let video = state
        .videos
        .create(&identity.user_id, req.title.trim(), req.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(video.into())))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video metadata", body = VideoResponse),
        (status = 400, description = "Invalid video ID"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let id = parse_video_id(&video_id)
        .map_err(|_| AppError::BadRequest("Invalid video ID".to_string()))?;

    let video = state
        .videos
        .get(&id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    if video.user_id != identity.user_id {
        return Err(AppError::Unauthorized(
            "Not authorized to view this video".to_string(),
        ));
    }

    Ok(Json(video.into()))
}
