use axum::{
    extract::{Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    db,
    error::AppResult,
    shopping_list::{self, CartLine, ShoppingListFormat},
    utils::auth::{require_user, AuthHeader},
};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    format: Option<String>,
}

// GET /api/recipes/download_shopping_cart/?format=txt|pdf
pub async fn download_shopping_cart(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Query(query): Query<DownloadQuery>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;

    let format = match query.format.as_deref() {
        Some(format) => format.parse()?,
        None => ShoppingListFormat::default(),
    };

    let lines = db::cart_ingredients(&pool, user_id).await?;
    let items = shopping_list::aggregate(lines.into_iter().map(CartLine::from));
    let body = format.render(&items)?;

    log::debug!("User {user_id} downloaded {} shopping list items", items.len());

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        body,
    ))
}
