use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    db,
    error::AppResult,
    pagination::{Page, PageQuery, PageSize},
    utils::auth::{optional_user, require_user, AuthHeader, UserId},
};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    recipes_limit: Option<i64>,
}

impl SubscriptionQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    fn recipes_limit(&self) -> Option<i64> {
        self.recipes_limit.map(|limit| limit.max(0))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    recipes_limit: Option<i64>,
}

// GET /api/users/
pub async fn list_users(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    State(size): State<PageSize>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PageQuery>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let viewer = optional_user(header, &key)?;

    let (users, count) =
        db::list_users(&pool, viewer, query.limit(size), query.offset(size)).await?;

    Ok(Json(Page::from_rows(users, count, &query, size, &uri)))
}

// GET /api/users/:id/
pub async fn get_user(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(user_id): Path<UserId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let viewer = optional_user(header, &key)?;
    let profile = db::get_user_profile(&pool, user_id, viewer).await?;
    Ok(Json(profile))
}

// GET /api/users/me/
pub async fn get_current_user(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    let profile = db::get_user_profile(&pool, user_id, Some(user_id)).await?;
    Ok(Json(profile))
}

// GET /api/users/subscriptions/
pub async fn list_subscriptions(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    State(size): State<PageSize>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<SubscriptionQuery>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    let page = query.page_query();

    let (authors, count) = db::list_subscriptions(
        &pool,
        user_id,
        page.limit(size),
        page.offset(size),
        query.recipes_limit(),
    )
    .await?;

    Ok(Json(Page::from_rows(authors, count, &page, size, &uri)))
}

// POST /api/users/:id/subscribe/
pub async fn subscribe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(author_id): Path<UserId>,
    Query(query): Query<SubscribeQuery>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    let recipes_limit = query.recipes_limit.map(|limit| limit.max(0));

    let subscription = db::subscribe(&pool, user_id, author_id, recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

// DELETE /api/users/:id/subscribe/
pub async fn unsubscribe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(author_id): Path<UserId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    db::unsubscribe(&pool, user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
