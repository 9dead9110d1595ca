use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::{DatabaseError, ErrorKind};

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum DBError {
    #[error("A user with this email or username is already registered")]
    AlreadyRegistered,

    #[error("Recipe is already in favorites")]
    AlreadyFavorited,

    #[error("Recipe is not in favorites")]
    NotFavorited,

    #[error("Recipe is already in the shopping cart")]
    AlreadyInCart,

    #[error("Recipe is not in the shopping cart")]
    NotInCart,

    #[error("You are already subscribed to this author")]
    AlreadySubscribed,

    #[error("You are not subscribed to this author")]
    NotSubscribed,

    #[error("Not Found")]
    NotFound,
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Any error: {0:?}")]
    Anyhow(#[from] anyhow::Error),

    #[error("{0}")]
    DBError(#[from] DBError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("SQL failed: {0:?}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JWT error: {0:?}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid request")]
    Validation(#[from] validator::ValidationErrors),

    #[error("PDF error: {0:?}")]
    Pdf(#[from] printpdf::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::DBError(DBError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DBError(_) => StatusCode::BAD_REQUEST,
            AppError::Sqlx(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Sqlx(sqlx::Error::Database(db_error))
                if constraint_message(db_error.as_ref()).is_some() =>
            {
                StatusCode::BAD_REQUEST
            }
            AppError::Sqlx(_) | AppError::Anyhow(_) | AppError::Pdf(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Readable text for the constraint violations the schema uses to guard its invariants.
fn constraint_message(db_error: &dyn DatabaseError) -> Option<String> {
    let message = match db_error.kind() {
        ErrorKind::UniqueViolation
        | ErrorKind::ForeignKeyViolation
        | ErrorKind::CheckViolation
        | ErrorKind::NotNullViolation => match db_error.constraint() {
            Some("unique_recipe_in_favorite") => DBError::AlreadyFavorited.to_string(),
            Some("unique_shopping_cart") => DBError::AlreadyInCart.to_string(),
            Some("unique_relationships") => DBError::AlreadySubscribed.to_string(),
            Some("prevent_self_follow") => "You cannot subscribe to yourself".to_string(),
            Some("unique_ingredient_in_recipe") => {
                "Ingredient is already in the recipe".to_string()
            }
            Some("unique_tag_recipe") => "Tag is already on the recipe".to_string(),
            Some("users_email_key" | "users_email_lower_key" | "users_username_key") => {
                DBError::AlreadyRegistered.to_string()
            }
            _ => db_error.message().to_string(),
        },
        _ => return None,
    };

    Some(message)
}

fn field_messages(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| error.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            log::error!("Error: {:?}", self);
        } else {
            log::debug!("Rejected request: {:?}", self);
        }

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": self.to_string(),
                "fields": field_messages(errors),
            }),
            AppError::Sqlx(sqlx::Error::Database(db_error)) if !status.is_server_error() => {
                json!({ "error": constraint_message(db_error.as_ref()) })
            }
            AppError::Sqlx(sqlx::Error::RowNotFound) => json!({ "error": "Not Found" }),
            _ if status.is_server_error() => json!({
                "error": status.canonical_reason().unwrap_or("Internal Server Error"),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_associations_are_client_errors() {
        for error in [
            DBError::AlreadyFavorited,
            DBError::NotFavorited,
            DBError::AlreadyInCart,
            DBError::NotInCart,
            DBError::AlreadySubscribed,
            DBError::NotSubscribed,
            DBError::AlreadyRegistered,
        ] {
            assert_eq!(AppError::from(error).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn missing_rows_are_not_found() {
        assert_eq!(
            AppError::from(DBError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("not yours").status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn internal_failures_hide_details() {
        let response = AppError::from(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[derive(Debug)]
    struct Violation(&'static str);

    impl std::fmt::Display for Violation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "duplicate key value"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.0)
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn email_in_other_case_is_already_registered() {
        let registered = DBError::AlreadyRegistered.to_string();
        for constraint in ["users_email_key", "users_email_lower_key", "users_username_key"] {
            assert_eq!(constraint_message(&Violation(constraint)), Some(registered.clone()));
        }
    }

    #[test]
    fn validation_errors_list_field_messages() {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new("range");
        error.message = Some("too small".into());
        errors.add("cooking_time", error);

        let messages = field_messages(&errors);
        assert_eq!(messages["cooking_time"], vec!["too small".to_string()]);
    }
}
