use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::{AppResult, DBError};

pub type IngredientId = i32;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

/// An ingredient read from an import file.
#[derive(Debug, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

/// Lists ingredients by name. With a search term, only names containing it are
/// returned, and names starting with it come first.
pub async fn search_ingredients(pool: &PgPool, name: Option<&str>) -> AppResult<Vec<Ingredient>> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());

    let ingredients = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, measurement_unit
        FROM ingredients
        WHERE $1::TEXT IS NULL OR name ILIKE '%' || $1 || '%'
        ORDER BY name, id
        "#,
    )
    .bind(name.map(escape_like))
    .fetch_all(pool)
    .await?;

    Ok(match name {
        Some(name) => rank_by_prefix(name, ingredients),
        None => ingredients,
    })
}

pub async fn get_ingredient(pool: &PgPool, ingredient_id: IngredientId) -> AppResult<Ingredient> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
    )
    .bind(ingredient_id)
    .fetch_optional(pool)
    .await?;

    ingredient.ok_or_else(|| DBError::NotFound.into())
}

pub async fn ingredients_exist(conn: &mut PgConnection) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM ingredients)")
        .fetch_one(conn)
        .await?;

    Ok(exists)
}

pub async fn insert_ingredients(
    conn: &mut PgConnection,
    ingredients: &[NewIngredient],
) -> AppResult<u64> {
    let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
    let units: Vec<&str> = ingredients
        .iter()
        .map(|i| i.measurement_unit.as_str())
        .collect();

    let inserted = sqlx::query(
        r#"
        INSERT INTO ingredients (name, measurement_unit)
        SELECT * FROM UNNEST($1::VARCHAR[], $2::VARCHAR[])
        "#,
    )
    .bind(&names)
    .bind(&units)
    .execute(conn)
    .await?;

    Ok(inserted.rows_affected())
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Moves names starting with `query` in front of the ones that only contain it.
/// The sort is stable, so each group keeps its incoming order.
pub fn rank_by_prefix(query: &str, mut ingredients: Vec<Ingredient>) -> Vec<Ingredient> {
    let query = query.to_lowercase();
    ingredients.sort_by_key(|ingredient| !ingredient.name.to_lowercase().starts_with(&query));
    ingredients
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: IngredientId, name: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: "g".to_string(),
        }
    }

    fn names(ingredients: &[Ingredient]) -> Vec<&str> {
        ingredients.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn prefix_matches_come_first() {
        let ranked = rank_by_prefix(
            "sug",
            vec![
                ingredient(1, "brown sugar"),
                ingredient(2, "icing sugar"),
                ingredient(3, "sugar"),
                ingredient(4, "sugar syrup"),
            ],
        );

        assert_eq!(names(&ranked), ["sugar", "sugar syrup", "brown sugar", "icing sugar"]);
    }

    #[test]
    fn ranking_ignores_case() {
        let ranked = rank_by_prefix("Sal", vec![ingredient(1, "sea salt"), ingredient(2, "salmon")]);
        assert_eq!(names(&ranked), ["salmon", "sea salt"]);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_fat\\"), "50\\%\\_fat\\\\");
    }
}
