use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    error::{AppResult, DBError},
    utils::auth::{UserAuth, UserId},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A user as seen by the viewer of the request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub user: User,
    pub is_subscribed: bool,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub hash: &'a str,
}

const PROFILE_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS (
        SELECT 1
        FROM subscriptions s
        WHERE s.user_id = $1 AND s.author_id = u.id
    ) AS is_subscribed
";

pub async fn create_user(pool: &PgPool, new_user: NewUser<'_>) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, username, first_name, last_name, hash)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING email, id, username, first_name, last_name
        "#,
    )
    .bind(new_user.email)
    .bind(new_user.username)
    .bind(new_user.first_name)
    .bind(new_user.last_name)
    .bind(new_user.hash)
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| DBError::AlreadyRegistered.into())
}

pub async fn get_user_profile(
    pool: &PgPool,
    user_id: UserId,
    viewer: Option<UserId>,
) -> AppResult<UserProfile> {
    let profile = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    profile.ok_or_else(|| DBError::NotFound.into())
}

pub async fn list_users(
    pool: &PgPool,
    viewer: Option<UserId>,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<UserProfile>, i64)> {
    let users = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok((users, count))
}

pub async fn user_exists(pool: &PgPool, user_id: UserId) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(exists)
}

pub async fn get_user_auth(pool: &PgPool, user_id: UserId) -> AppResult<UserAuth> {
    let user = sqlx::query_as::<_, UserAuth>("SELECT id, email, hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    user.ok_or_else(|| DBError::NotFound.into())
}

pub async fn find_user_auth(pool: &PgPool, email: &str) -> AppResult<Option<UserAuth>> {
    let user = sqlx::query_as::<_, UserAuth>(
        "SELECT id, email, hash FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn update_password(pool: &PgPool, user_id: UserId, hash: &str) -> AppResult<()> {
    sqlx::query("UPDATE users SET hash = $1 WHERE id = $2")
        .bind(hash)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
