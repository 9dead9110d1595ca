mod user;
pub use user::*;
mod recipe;
pub use recipe::*;
mod ingredient;
pub use ingredient::*;
mod tag;
pub use tag::*;
mod subscription;
pub use subscription::*;
mod collection;
pub use collection::*;

use sqlx::{Executor, PgPool};

/// Applies the idempotent schema; safe to run on every start.
pub async fn prepare_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(include_str!("sql/schema.sql")).await?;
    Ok(())
}
