use clap::Parser;
use dotenvy::dotenv;
use rust_video_backend::config::AppConfig;
use rust_video_backend::utils::auth::create_jwt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Issue a bearer token for local testing of the upload endpoints
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// User id placed in the `sub` claim
    user_id: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mint_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env();

    let token = create_jwt(
        &args.user_id,
        &config.jwt_secret,
        chrono::Duration::hours(args.hours),
    )?;

    info!("🔑 Minted token for {} (valid {}h)", args.user_id, args.hours);
    println!("{}", token);

    Ok(())
}
