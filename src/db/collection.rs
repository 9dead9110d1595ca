use sqlx::PgPool;

use crate::{
    error::{AppResult, DBError},
    utils::auth::UserId,
};

use super::{get_recipe_short, RecipeId, RecipeShort};

/// The per-user recipe lists sharing the same `(user_id, recipe_id)` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCollection {
    Favorites,
    ShoppingCart,
}

impl RecipeCollection {
    fn table(self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "shopping_carts",
        }
    }

    fn already_added(self) -> DBError {
        match self {
            RecipeCollection::Favorites => DBError::AlreadyFavorited,
            RecipeCollection::ShoppingCart => DBError::AlreadyInCart,
        }
    }

    fn not_added(self) -> DBError {
        match self {
            RecipeCollection::Favorites => DBError::NotFavorited,
            RecipeCollection::ShoppingCart => DBError::NotInCart,
        }
    }
}

pub async fn add_to_collection(
    pool: &PgPool,
    collection: RecipeCollection,
    user_id: UserId,
    recipe_id: RecipeId,
) -> AppResult<RecipeShort> {
    let recipe = get_recipe_short(pool, recipe_id).await?;

    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        collection.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(collection.already_added().into());
    }

    Ok(recipe)
}

pub async fn remove_from_collection(
    pool: &PgPool,
    collection: RecipeCollection,
    user_id: UserId,
    recipe_id: RecipeId,
) -> AppResult<()> {
    let deleted = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        collection.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if deleted.rows_affected() == 0 {
        get_recipe_short(pool, recipe_id).await?;
        return Err(collection.not_added().into());
    }

    Ok(())
}
