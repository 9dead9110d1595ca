use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use jsonwebtoken::{DecodingKey, EncodingKey};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    db::{create_user, find_user_auth, get_user_auth, update_password, NewUser},
    error::{AppError, AppResult},
    utils::{
        auth::{require_user, AuthHeader},
        hasher,
    },
};

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

// ================================================= LOGIN ================================================= //

#[derive(Debug, Deserialize, Validate)]
pub struct Login {
    #[validate(
        email(message = "invalid email address"),
        length(min = 1, message = "email can't be blank")
    )]
    email: String,
    #[validate(length(min = 1, message = "password can't be blank"))]
    password: String,
}

// POST /api/auth/token/login/
pub async fn login(
    State(pool): State<PgPool>,
    State(key): State<EncodingKey>,
    Json(login): Json<Login>,
) -> AppResult<impl IntoResponse> {
    login.validate()?;

    const INVALID: &str = "Unable to log in with provided credentials";

    let Some(user_auth) = find_user_auth(&pool, &login.email).await? else {
        return Err(AppError::bad_request(INVALID));
    };

    user_auth.check_password(&login.password, INVALID)?;

    let token = user_auth.generate_jwt(&key)?;
    log::debug!("Issued token for {}", user_auth.email);
    Ok(Json(json!({ "auth_token": token })))
}

// POST /api/auth/token/logout/
pub async fn logout(
    State(key): State<DecodingKey>,
    header: AuthHeader,
) -> AppResult<impl IntoResponse> {
    // Tokens are stateless; the client drops its copy.
    require_user(header, &key)?;
    Ok(StatusCode::NO_CONTENT)
}

// ================================================= REGISTRATION ================================================= //

#[derive(Deserialize, Validate)]
pub struct Registration {
    #[validate(
        length(min = 1, message = "email can't be blank"),
        length(max = 254, message = "too long email address"),
        email(message = "invalid email address")
    )]
    email: String,

    #[validate(
        length(min = 1, max = 150, message = "username must be 1 to 150 characters"),
        regex(path = "USERNAME", message = "username may only contain letters, digits and @/./+/-/_")
    )]
    username: String,

    #[validate(length(min = 1, max = 150, message = "first name must be 1 to 150 characters"))]
    first_name: String,

    #[validate(length(min = 1, max = 150, message = "last name must be 1 to 150 characters"))]
    last_name: String,

    #[validate(
        non_control_character(message = "password can't contain control characters"),
        length(min = 8, message = "password must be at least 8 characters long"),
        length(max = 128, message = "too long password")
    )]
    password: String,
}

// POST /api/users/
pub async fn registration(
    State(pool): State<PgPool>,
    Json(user): Json<Registration>,
) -> AppResult<impl IntoResponse> {
    user.validate()?;

    if user.username.eq_ignore_ascii_case("me") {
        return Err(AppError::bad_request("username 'me' is reserved"));
    }

    let hash = hasher::hash_password(&user.password)?;

    let created = create_user(
        &pool,
        NewUser {
            email: &user.email,
            username: &user.username,
            first_name: &user.first_name,
            last_name: &user.last_name,
            hash: &hash,
        },
    )
    .await?;

    log::info!("Registered user {} ({})", created.id, created.username);
    Ok((StatusCode::CREATED, Json(created)))
}

// ================================================= PASSWORD ================================================= //

#[derive(Deserialize, Validate)]
pub struct SetPassword {
    #[validate(
        non_control_character(message = "password can't contain control characters"),
        length(min = 8, message = "password must be at least 8 characters long"),
        length(max = 128, message = "too long password")
    )]
    new_password: String,
    #[validate(length(min = 1, message = "current password can't be blank"))]
    current_password: String,
}

// POST /api/users/set_password/
pub async fn set_password(
    State(pool): State<PgPool>,
    State(key): State<DecodingKey>,
    header: AuthHeader,
    Json(payload): Json<SetPassword>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(header, &key)?;
    payload.validate()?;

    if payload.new_password == payload.current_password {
        return Err(AppError::bad_request(
            "The new password must differ from the current one",
        ));
    }

    let user_auth = get_user_auth(&pool, user_id).await?;
    user_auth.check_password(&payload.current_password, "Current password is incorrect")?;

    let hash = hasher::hash_password(&payload.new_password)?;
    update_password(&pool, user_id, &hash).await?;

    Ok(StatusCode::NO_CONTENT)
}
