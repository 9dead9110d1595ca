use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppResult, DBError};

pub type TagId = i32;

pub static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").unwrap());

pub static TAG_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: Option<String>,
    pub slug: Option<String>,
}

/// A tag read from an import file.
#[derive(Debug, Deserialize, Validate)]
pub struct NewTag {
    #[validate(length(min = 1, max = 200, message = "tag name must be 1 to 200 characters"))]
    pub name: String,
    #[validate(regex(path = "HEX_COLOR", message = "invalid color code"))]
    pub color: Option<String>,
    #[validate(
        length(max = 200, message = "slug is too long"),
        regex(path = "TAG_SLUG", message = "invalid slug")
    )]
    #[serde(default)]
    pub slug: Option<String>,
}

impl NewTag {
    pub fn slug(&self) -> String {
        self.slug
            .clone()
            .unwrap_or_else(|| slug::slugify(&self.name))
    }
}

pub async fn list_tags(pool: &PgPool) -> AppResult<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(tags)
}

pub async fn get_tag(pool: &PgPool, tag_id: TagId) -> AppResult<Tag> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(tag_id)
        .fetch_optional(pool)
        .await?;

    tag.ok_or_else(|| DBError::NotFound.into())
}

/// Inserts tags that are not there yet, returning how many were added.
pub async fn insert_tags(conn: &mut PgConnection, tags: &[NewTag]) -> AppResult<u64> {
    let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
    let colors: Vec<Option<&str>> = tags.iter().map(|tag| tag.color.as_deref()).collect();
    let slugs: Vec<String> = tags.iter().map(NewTag::slug).collect();

    let inserted = sqlx::query(
        r#"
        INSERT INTO tags (name, color, slug)
        SELECT * FROM UNNEST($1::VARCHAR[], $2::VARCHAR[], $3::VARCHAR[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&names)
    .bind(&colors)
    .bind(&slugs)
    .execute(conn)
    .await?;

    Ok(inserted.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, color: Option<&str>, slug: Option<&str>) -> NewTag {
        NewTag {
            name: name.to_string(),
            color: color.map(str::to_string),
            slug: slug.map(str::to_string),
        }
    }

    #[test]
    fn slug_defaults_to_slugified_name() {
        assert_eq!(tag("Quick Dinner", None, None).slug(), "quick-dinner");
        assert_eq!(tag("Lunch", None, Some("midday")).slug(), "midday");
    }

    #[test]
    fn accepts_short_and_long_hex_colors() {
        assert!(tag("Breakfast", Some("#E26C2D"), None).validate().is_ok());
        assert!(tag("Breakfast", Some("#abc"), None).validate().is_ok());
    }

    #[test]
    fn rejects_bad_color_and_slug() {
        let errors = tag("Breakfast", Some("orange"), Some("no spaces")).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("color"));
        assert!(fields.contains_key("slug"));
    }
}
