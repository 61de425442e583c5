use clap::Parser;
use dotenvy::dotenv;
use rust_video_backend::config::AppConfig;
use rust_video_backend::infrastructure::{database, storage};
use rust_video_backend::services::identity::JwtIdentityResolver;
use rust_video_backend::services::ingest_service::IngestService;
use rust_video_backend::services::media::TokioProcessRunner;
use rust_video_backend::services::video_store::SeaOrmVideoStore;
use rust_video_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Video publishing backend")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8091)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1")]
    bind: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_video_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Video Backend...");

    let config = AppConfig::for_environment(std::env::var("APP_ENV").ok().as_deref());
    info!(
        "🎞️  Media Config: Max Upload={}MB, Staging={}, ffmpeg={}, ffprobe={}",
        config.max_upload_size / 1024 / 1024,
        config.temp_dir.display(),
        config.ffmpeg_path,
        config.ffprobe_path
    );

    let db = database::setup_database(&config).await?;
    let storage_service = storage::setup_storage(&config).await;

    let videos = Arc::new(SeaOrmVideoStore::new(db.clone()));
    let ingest = Arc::new(IngestService::new(
        videos.clone(),
        storage_service.clone(),
        Arc::new(TokioProcessRunner),
        config.clone(),
    ));

    let state = AppState {
        db,
        videos,
        storage: storage_service,
        identity: Arc::new(JwtIdentityResolver::new(config.jwt_secret.clone())),
        ingest,
        config,
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::from((args.bind, args.port));
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
