use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator::Validate;

use foodgram::db::{self, NewIngredient, NewTag};

/// Loads ingredients (and optionally tags) into an empty database.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON array of `{"name", "measurement_unit"}`
    #[arg(long, default_value = "data/ingredients.json")]
    ingredients: PathBuf,

    /// JSON array of `{"name", "color", "slug"}`
    #[arg(long)]
    tags: Option<PathBuf>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let ingredients: Vec<NewIngredient> = read_json(&args.ingredients)?;
    let tags: Vec<NewTag> = match &args.tags {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    for tag in &tags {
        tag.validate()
            .with_context(|| format!("invalid tag {:?}", tag.name))?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.database_url)
        .await
        .context("failed to connect to the database")?;
    db::prepare_db(&pool).await?;

    let mut tx = pool.begin().await?;

    if db::ingredients_exist(&mut tx).await.map_err(into_anyhow)? {
        log::info!("Ingredients are already loaded, skipping import");
        return Ok(());
    }

    let loaded = db::insert_ingredients(&mut tx, &ingredients)
        .await
        .map_err(into_anyhow)?;
    let loaded_tags = db::insert_tags(&mut tx, &tags).await.map_err(into_anyhow)?;

    tx.commit().await?;

    log::info!("Loaded {loaded} ingredients and {loaded_tags} tags");
    Ok(())
}

fn into_anyhow(err: foodgram::error::AppError) -> anyhow::Error {
    anyhow::anyhow!("{err}")
}
