pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::identity::IdentityResolver;
use crate::services::ingest_service::IngestService;
use crate::services::storage::StorageService;
use crate::services::video_store::VideoStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::videos::upload_video,
        api::handlers::videos::create_video,
        api::handlers::videos::get_video,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::videos::UploadVideoResponse,
            api::handlers::videos::CreateVideoRequest,
            api::handlers::videos::VideoResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    modifiers(&JwtSecurity),
    tags(
        (name = "videos", description = "Video metadata and publishing endpoints"),
        (name = "system", description = "Operational endpoints")
    )
)]
pub struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub videos: Arc<dyn VideoStore>,
    pub storage: Arc<dyn StorageService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub ingest: Arc<IngestService>,
    pub config: AppConfig,
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/videos",
            post(api::handlers::videos::create_video).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/api/videos/:video_id",
            get(api::handlers::videos::get_video).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/api/video_upload/:video_id",
            post(api::handlers::videos::upload_video)
                .layer::<_, Infallible>(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                ))
                .layer(DefaultBodyLimit::max(state.config.max_upload_size as usize)),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}
