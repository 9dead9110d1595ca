use std::collections::HashMap;

use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::{
    error::{AppError, AppResult, DBError},
    utils::auth::UserId,
};

use super::{get_user_profile, user_exists, RecipeShort, UserProfile};

const AUTHOR_PREVIEWS: &str = include_str!("../sql/recipes/author_previews.sql");

/// A followed author with a preview of their newest recipes.
#[derive(Debug, Serialize)]
pub struct SubscribedAuthor {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(FromRow)]
struct AuthorRow {
    #[sqlx(flatten)]
    profile: UserProfile,
    recipes_count: i64,
}

#[derive(FromRow)]
struct PreviewRow {
    author_id: UserId,
    #[sqlx(flatten)]
    recipe: RecipeShort,
}

const AUTHOR_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    TRUE AS is_subscribed,
    (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
";

pub async fn subscribe(
    pool: &PgPool,
    follower: UserId,
    author: UserId,
    recipes_limit: Option<i64>,
) -> AppResult<SubscribedAuthor> {
    if follower == author {
        return Err(AppError::bad_request("You cannot subscribe to yourself"));
    }

    if !user_exists(pool, author).await? {
        return Err(DBError::NotFound.into());
    }

    let inserted = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(follower)
    .bind(author)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(DBError::AlreadySubscribed.into());
    }

    log::info!("User {follower} subscribed to {author}");
    get_subscription(pool, follower, author, recipes_limit).await
}

pub async fn unsubscribe(pool: &PgPool, follower: UserId, author: UserId) -> AppResult<()> {
    let deleted = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(follower)
        .bind(author)
        .execute(pool)
        .await?;

    if deleted.rows_affected() == 0 {
        if !user_exists(pool, author).await? {
            return Err(DBError::NotFound.into());
        }
        return Err(DBError::NotSubscribed.into());
    }

    Ok(())
}

pub async fn get_subscription(
    pool: &PgPool,
    follower: UserId,
    author: UserId,
    recipes_limit: Option<i64>,
) -> AppResult<SubscribedAuthor> {
    let profile = get_user_profile(pool, author, Some(follower)).await?;

    let (recipes_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author)
            .fetch_one(pool)
            .await?;

    let mut previews = recipe_previews(pool, &[author], recipes_limit).await?;

    Ok(SubscribedAuthor {
        profile,
        recipes: previews.remove(&author).unwrap_or_default(),
        recipes_count,
    })
}

/// Authors the user follows, most recent subscription first.
pub async fn list_subscriptions(
    pool: &PgPool,
    follower: UserId,
    limit: i64,
    offset: i64,
    recipes_limit: Option<i64>,
) -> AppResult<(Vec<SubscribedAuthor>, i64)> {
    let authors = sqlx::query_as::<_, AuthorRow>(&format!(
        r#"
        SELECT {AUTHOR_COLUMNS}
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.created DESC, s.id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(follower)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(follower)
        .fetch_one(pool)
        .await?;

    let ids: Vec<UserId> = authors.iter().map(|row| row.profile.user.id).collect();
    let mut previews = recipe_previews(pool, &ids, recipes_limit).await?;

    let results = authors
        .into_iter()
        .map(|row| SubscribedAuthor {
            recipes: previews.remove(&row.profile.user.id).unwrap_or_default(),
            profile: row.profile,
            recipes_count: row.recipes_count,
        })
        .collect();

    Ok((results, count))
}

/// Newest recipes of each author, at most `limit` per author when given.
async fn recipe_previews(
    pool: &PgPool,
    authors: &[UserId],
    limit: Option<i64>,
) -> AppResult<HashMap<UserId, Vec<RecipeShort>>> {
    if authors.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, PreviewRow>(AUTHOR_PREVIEWS)
        .bind(authors)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut previews: HashMap<UserId, Vec<RecipeShort>> = HashMap::new();
    for row in rows {
        previews.entry(row.author_id).or_default().push(row.recipe);
    }

    Ok(previews)
}
