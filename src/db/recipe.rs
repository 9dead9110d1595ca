use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult, DBError},
    utils::auth::UserId,
};

use super::{IngredientId, Tag, TagId, UserProfile};

pub type RecipeId = i32;

const SELECT_RECIPE: &str = include_str!("../sql/recipes/select_recipe.sql");
const CART_INGREDIENTS: &str = include_str!("../sql/recipes/cart_ingredients.sql");

/// The compact form used by favorites, the cart and subscription previews.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeShort {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Recipe {
    pub id: RecipeId,
    pub tags: Json<Vec<Tag>>,
    pub author: Json<UserProfile>,
    pub ingredients: Json<Vec<RecipeIngredient>>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: IngredientId,
    pub amount: i32,
}

/// Field values for a create or a full update. `image` may be left out on update.
pub struct RecipeWrite<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub image: Option<&'a str>,
    pub cooking_time: i32,
    pub tags: &'a [TagId],
    pub ingredients: &'a [IngredientAmount],
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

/// Starts a query whose `viewer` CTE holds the caller (NULL when anonymous).
fn with_viewer<'a>(viewer: Option<UserId>, select: &str) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("WITH viewer AS (SELECT ");
    builder.push_bind(viewer);
    builder.push("::INT AS id) ");
    builder.push(select);
    builder
}

fn push_recipe_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    builder.push(" WHERE TRUE");

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ");
        builder.push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND EXISTS (
                SELECT 1
                FROM recipe_tags rt
                INNER JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        builder.push_bind(filter.tags.clone());
        builder.push("))");
    }

    // A false flag does not narrow. An anonymous viewer has a NULL id, so a true flag matches nothing.
    for (flag, table) in [
        (filter.is_favorited, "favorites"),
        (filter.is_in_shopping_cart, "shopping_carts"),
    ] {
        if flag == Some(true) {
            builder.push(format!(
                " AND EXISTS (SELECT 1 FROM {table} x WHERE x.recipe_id = r.id AND x.user_id = (SELECT id FROM viewer))"
            ));
        }
    }
}

pub async fn list_recipes(
    pool: &PgPool,
    viewer: Option<UserId>,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<Recipe>, i64)> {
    let mut query = with_viewer(viewer, SELECT_RECIPE);
    push_recipe_filters(&mut query, filter);
    query.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let recipes = query.build_query_as::<Recipe>().fetch_all(pool).await?;

    let mut count = with_viewer(viewer, "SELECT COUNT(*) FROM recipes r");
    push_recipe_filters(&mut count, filter);
    let count = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    Ok((recipes, count))
}

pub async fn get_recipe(
    pool: &PgPool,
    recipe_id: RecipeId,
    viewer: Option<UserId>,
) -> AppResult<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "WITH viewer AS (SELECT $1::INT AS id) {SELECT_RECIPE} WHERE r.id = $2"
    ))
    .bind(viewer)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;

    recipe.ok_or_else(|| DBError::NotFound.into())
}

pub async fn get_recipe_short(pool: &PgPool, recipe_id: RecipeId) -> AppResult<RecipeShort> {
    let recipe = sqlx::query_as::<_, RecipeShort>(
        "SELECT id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;

    recipe.ok_or_else(|| DBError::NotFound.into())
}

pub async fn create_recipe(
    pool: &PgPool,
    author: UserId,
    recipe: RecipeWrite<'_>,
) -> AppResult<RecipeId> {
    let Some(image) = recipe.image else {
        return Err(AppError::bad_request("image is required"));
    };

    let mut tx = pool.begin().await?;
    check_references(&mut tx, &recipe).await?;

    let (recipe_id,): (RecipeId,) = sqlx::query_as(
        r#"
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(author)
    .bind(recipe.name)
    .bind(image)
    .bind(recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    insert_associations(&mut tx, recipe_id, &recipe).await?;
    tx.commit().await?;

    log::info!("User {author} created recipe {recipe_id}");
    Ok(recipe_id)
}

/// Rewrites the recipe and replaces all of its tag and ingredient rows.
pub async fn update_recipe(
    pool: &PgPool,
    recipe_id: RecipeId,
    user_id: UserId,
    recipe: RecipeWrite<'_>,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    ensure_author(&mut tx, recipe_id, user_id).await?;
    check_references(&mut tx, &recipe).await?;

    sqlx::query(
        r#"
        UPDATE recipes
        SET name = $1, image = COALESCE($2, image), text = $3, cooking_time = $4
        WHERE id = $5
        "#,
    )
    .bind(recipe.name)
    .bind(recipe.image)
    .bind(recipe.text)
    .bind(recipe.cooking_time)
    .bind(recipe_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

    insert_associations(&mut tx, recipe_id, &recipe).await?;
    tx.commit().await?;

    Ok(())
}

pub async fn delete_recipe(pool: &PgPool, recipe_id: RecipeId, user_id: UserId) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    ensure_author(&mut tx, recipe_id, user_id).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("User {user_id} deleted recipe {recipe_id}");
    Ok(())
}

/// Every `(name, measurement_unit, amount)` row of the recipes in the user's cart.
pub async fn cart_ingredients(
    pool: &PgPool,
    user_id: UserId,
) -> AppResult<Vec<(String, String, i64)>> {
    let rows = sqlx::query_as::<_, (String, String, i64)>(CART_INGREDIENTS)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

async fn ensure_author(
    conn: &mut PgConnection,
    recipe_id: RecipeId,
    user_id: UserId,
) -> AppResult<()> {
    let author: Option<(UserId,)> =
        sqlx::query_as("SELECT author_id FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(recipe_id)
            .fetch_optional(&mut *conn)
            .await?;

    match author {
        None => Err(DBError::NotFound.into()),
        Some((author,)) if author != user_id => Err(AppError::Forbidden(
            "Only the author can change this recipe",
        )),
        Some(_) => Ok(()),
    }
}

async fn check_references(conn: &mut PgConnection, recipe: &RecipeWrite<'_>) -> AppResult<()> {
    let ingredient_ids: Vec<IngredientId> = recipe.ingredients.iter().map(|i| i.id).collect();
    let missing = missing_ids(&mut *conn, "ingredients", &ingredient_ids).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::bad_request(format!(
            "Ingredient with id {id} does not exist"
        )));
    }

    let missing = missing_ids(&mut *conn, "tags", recipe.tags).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::bad_request(format!("Tag with id {id} does not exist")));
    }

    Ok(())
}

async fn missing_ids(conn: &mut PgConnection, table: &str, ids: &[i32]) -> AppResult<Vec<i32>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let missing = sqlx::query_scalar::<_, i32>(&format!(
        r#"
        SELECT ids.id
        FROM UNNEST($1::INT[]) AS ids(id)
        WHERE NOT EXISTS (SELECT 1 FROM {table} t WHERE t.id = ids.id)
        ORDER BY ids.id
        "#
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(missing)
}

async fn insert_associations(
    conn: &mut PgConnection,
    recipe_id: RecipeId,
    recipe: &RecipeWrite<'_>,
) -> AppResult<()> {
    let ingredient_ids: Vec<IngredientId> = recipe.ingredients.iter().map(|i| i.id).collect();
    let amounts: Vec<i32> = recipe.ingredients.iter().map(|i| i.amount).collect();

    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, * FROM UNNEST($2::INT[], $3::INT[])
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, * FROM UNNEST($2::INT[])
        "#,
    )
    .bind(recipe_id)
    .bind(recipe.tags)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
