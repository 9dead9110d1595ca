use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    db::{self, IngredientId},
    error::AppResult,
};

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearch {
    #[serde(default)]
    name: Option<String>,
}

// GET /api/ingredients/?name=
pub async fn get_ingredients(
    State(pool): State<PgPool>,
    Query(search): Query<IngredientSearch>,
) -> AppResult<impl IntoResponse> {
    let ingredients = db::search_ingredients(&pool, search.name.as_deref()).await?;
    Ok(Json(ingredients))
}

// GET /api/ingredients/:id/
pub async fn get_ingredient(
    State(pool): State<PgPool>,
    Path(ingredient_id): Path<IngredientId>,
) -> AppResult<impl IntoResponse> {
    let ingredient = db::get_ingredient(&pool, ingredient_id).await?;
    Ok(Json(ingredient))
}
