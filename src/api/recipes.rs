use std::collections::HashSet;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use sqlx::PgPool;
use validator::{Validate, ValidationError};

use crate::{
    db::{self, IngredientAmount, RecipeCollection, RecipeFilter, RecipeId, RecipeWrite, TagId},
    error::{AppError, AppResult},
    pagination::{Page, PageQuery, PageSize},
    utils::auth::{optional_user, require_user, AuthHeader},
};

// ================================================= PAYLOAD ================================================= //

#[derive(Debug, Deserialize, Validate)]
pub struct RecipePayload {
    #[validate(custom(function = "validate_ingredients"))]
    ingredients: Vec<IngredientAmount>,
    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    tags: Vec<TagId>,
    #[serde(default)]
    #[validate(custom(function = "validate_image"))]
    image: Option<String>,
    #[validate(length(min = 1, max = 200, message = "name must be 1 to 200 characters"))]
    name: String,
    #[validate(length(min = 1, message = "text can't be blank"))]
    text: String,
    #[validate(range(min = 1, message = "cooking time must be at least 1 minute"))]
    cooking_time: i32,
}

impl RecipePayload {
    fn as_write(&self) -> RecipeWrite<'_> {
        RecipeWrite {
            name: &self.name,
            text: &self.text,
            image: self.image.as_deref(),
            cooking_time: self.cooking_time,
            tags: &self.tags,
            ingredients: &self.ingredients,
        }
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(invalid("empty", "a recipe needs at least one ingredient"));
    }

    if ingredients.iter().any(|ingredient| ingredient.amount < 1) {
        return Err(invalid("amount", "ingredient amount must be at least 1"));
    }

    let mut seen = HashSet::new();
    if !ingredients.iter().all(|ingredient| seen.insert(ingredient.id)) {
        return Err(invalid("duplicate", "ingredients must not repeat"));
    }

    Ok(())
}

fn validate_tags(tags: &[TagId]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if !tags.iter().all(|tag| seen.insert(*tag)) {
        return Err(invalid("duplicate", "tags must not repeat"));
    }

    Ok(())
}

/// Accepts `data:image/<type>;base64,<payload>`.
fn validate_image(image: &str) -> Result<(), ValidationError> {
    let payload = image
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .filter(|(kind, payload)| !kind.is_empty() && !payload.is_empty())
        .map(|(_, payload)| payload);

    match payload {
        Some(payload) if base64::engine::general_purpose::STANDARD.decode(payload).is_ok() => {
            Ok(())
        }
        _ => Err(invalid("image", "image must be a base64 encoded data URI")),
    }
}

// ================================================= QUERY ================================================= //

#[derive(Debug, Default)]
pub struct RecipeListQuery {
    page: PageQuery,
    filter: RecipeFilter,
}

impl RecipeListQuery {
    /// Reads the raw pairs so that `tags` may repeat.
    pub fn parse(pairs: Vec<(String, String)>) -> AppResult<Self> {
        let mut query = RecipeListQuery::default();

        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.page.page = Some(parse_number(&key, &value)?),
                "limit" => query.page.limit = Some(parse_number(&key, &value)?),
                "author" => query.filter.author = Some(parse_number(&key, &value)?),
                "tags" if !value.is_empty() => query.filter.tags.push(value),
                "is_favorited" => query.filter.is_favorited = Some(parse_flag(&key, &value)?),
                "is_in_shopping_cart" => {
                    query.filter.is_in_shopping_cart = Some(parse_flag(&key, &value)?)
                }
                _ => {}
            }
        }

        Ok(query)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::bad_request(format!("{key} must be a number")))
}

fn parse_flag(key: &str, value: &str) -> AppResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(AppError::bad_request(format!("{key} must be 0, 1, true or false"))),
    }
}

// ================================================= RECIPES ================================================= //

// GET /api/recipes/
pub async fn get_recipes(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    State(size): State<PageSize>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<Vec<(String, String)>>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let viewer = optional_user(header, &key)?;
    let query = RecipeListQuery::parse(pairs)?;

    let (recipes, count) = db::list_recipes(
        &pool,
        viewer,
        &query.filter,
        query.page.limit(size),
        query.page.offset(size),
    )
    .await?;

    Ok(Json(Page::from_rows(recipes, count, &query.page, size, &uri)))
}

// GET /api/recipes/:id/
pub async fn get_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let viewer = optional_user(header, &key)?;
    let recipe = db::get_recipe(&pool, recipe_id, viewer).await?;
    Ok(Json(recipe))
}

// POST /api/recipes/
pub async fn create_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    header: AuthHeader,
    Json(payload): Json<RecipePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    payload.validate()?;

    let recipe_id = db::create_recipe(&pool, user_id, payload.as_write()).await?;
    let recipe = db::get_recipe(&pool, recipe_id, Some(user_id)).await?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

// PATCH, PUT /api/recipes/:id/
pub async fn update_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
    Json(payload): Json<RecipePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    payload.validate()?;

    db::update_recipe(&pool, recipe_id, user_id, payload.as_write()).await?;
    let recipe = db::get_recipe(&pool, recipe_id, Some(user_id)).await?;

    Ok(Json(recipe))
}

// DELETE /api/recipes/:id/
pub async fn delete_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    db::delete_recipe(&pool, recipe_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ================================================= FAVORITES & CART ================================================= //

async fn add(
    pool: PgPool,
    key: DecodingKey,
    header: AuthHeader,
    recipe_id: RecipeId,
    collection: RecipeCollection,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    let recipe = db::add_to_collection(&pool, collection, user_id, recipe_id).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn remove(
    pool: PgPool,
    key: DecodingKey,
    header: AuthHeader,
    recipe_id: RecipeId,
    collection: RecipeCollection,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    db::remove_from_collection(&pool, collection, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/recipes/:id/favorite/
pub async fn favorite_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    add(pool, key, header, recipe_id, RecipeCollection::Favorites).await
}

// DELETE /api/recipes/:id/favorite/
pub async fn unfavorite_recipe(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    remove(pool, key, header, recipe_id, RecipeCollection::Favorites).await
}

// POST /api/recipes/:id/shopping_cart/
pub async fn add_to_cart(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    add(pool, key, header, recipe_id, RecipeCollection::ShoppingCart).await
}

// DELETE /api/recipes/:id/shopping_cart/
pub async fn remove_from_cart(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    Path(recipe_id): Path<RecipeId>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    remove(pool, key, header, recipe_id, RecipeCollection::ShoppingCart).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    fn payload(ingredients: Vec<(i32, i32)>, tags: Vec<TagId>) -> RecipePayload {
        RecipePayload {
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
            tags,
            image: Some(PIXEL.to_string()),
            name: "Pancakes".to_string(),
            text: "Mix and fry.".to_string(),
            cooking_time: 20,
        }
    }

    fn pairs(query: &[(&str, &str)]) -> Vec<(String, String)> {
        query
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload(vec![(1, 200), (2, 3)], vec![1, 2]).validate().is_ok());
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        let errors = payload(vec![(1, 200), (1, 100)], vec![]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("ingredients"));
    }

    #[test]
    fn rejected_ingredients_are_echoed_back() {
        let errors = payload(vec![(4, 1), (4, 2)], vec![]).validate().unwrap_err();
        let error = &errors.field_errors()["ingredients"][0];
        assert_eq!(
            error.params["value"],
            serde_json::json!([{ "id": 4, "amount": 1 }, { "id": 4, "amount": 2 }])
        );
    }

    #[test]
    fn empty_ingredients_and_zero_amount_are_rejected() {
        assert!(payload(vec![], vec![]).validate().is_err());
        assert!(payload(vec![(1, 0)], vec![]).validate().is_err());
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let errors = payload(vec![(1, 1)], vec![3, 3]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("tags"));
    }

    #[test]
    fn cooking_time_and_name_are_checked() {
        let mut recipe = payload(vec![(1, 1)], vec![]);
        recipe.cooking_time = 0;
        recipe.name = String::new();

        let errors = recipe.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("cooking_time"));
        assert!(fields.contains_key("name"));
    }

    #[test]
    fn image_must_be_a_base64_data_uri() {
        assert!(validate_image(PIXEL).is_ok());
        assert!(validate_image("https://example.com/cake.png").is_err());
        assert!(validate_image("data:image/png;base64,***").is_err());
        assert!(validate_image("data:text/plain;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn missing_image_is_left_to_the_handler() {
        let mut recipe = payload(vec![(1, 1)], vec![]);
        recipe.image = None;
        assert!(recipe.validate().is_ok());
    }

    #[test]
    fn query_collects_repeated_tags_and_flags() {
        let query = RecipeListQuery::parse(pairs(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "false"),
            ("author", "3"),
            ("page", "2"),
            ("limit", "10"),
        ]))
        .unwrap();

        assert_eq!(
            query.filter,
            RecipeFilter {
                author: Some(3),
                tags: vec!["breakfast".to_string(), "lunch".to_string()],
                is_favorited: Some(true),
                is_in_shopping_cart: Some(false),
            }
        );
        assert_eq!(query.page.page(), 2);
        assert_eq!(query.page.limit(PageSize(6)), 10);
    }

    #[test]
    fn query_rejects_bad_values() {
        assert!(RecipeListQuery::parse(pairs(&[("is_favorited", "yes")])).is_err());
        assert!(RecipeListQuery::parse(pairs(&[("author", "bob")])).is_err());
    }

    #[test]
    fn unknown_query_keys_are_ignored() {
        let query = RecipeListQuery::parse(pairs(&[("format", "pdf"), ("tags", "")])).unwrap();
        assert_eq!(query.filter, RecipeFilter::default());
    }
}
