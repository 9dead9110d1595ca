use std::net::SocketAddr;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foodgram::{config::Config, db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodgram=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    db::prepare_db(&pool)
        .await
        .context("failed to apply the database schema")?;

    let state = AppState::new(pool, &config)
        .map_err(|err| anyhow::anyhow!("invalid JWT key pair: {err}"))?;
    let app = routes::generate_routes(state, config.rate_limit_per_second);

    let address: SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.address()))?;

    tracing::info!("listening on {}", address);
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
