use axum::{headers::Authorization, TypedHeader};
use jsonwebtoken::{DecodingKey, EncodingKey};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

use super::{
    hasher,
    jwt::{self, JWTToken},
};

pub type UserId = i32;

pub type AuthHeader = Option<TypedHeader<Authorization<JWTToken>>>;

#[derive(Debug, Default, FromRow)]
pub struct UserAuth {
    pub id: UserId,
    pub email: String,
    pub hash: String,
}

impl UserAuth {
    pub fn generate_jwt(&self, key: &EncodingKey) -> AppResult<String> {
        jwt::generate_jwt(self.id, key)
    }

    pub fn check_password(&self, password: &str, message: &'static str) -> AppResult<()> {
        hasher::verify_password(password, &self.hash, message)
    }
}

/// The caller's id, or 401 when the request carries no token.
pub fn require_user(header: AuthHeader, key: &DecodingKey) -> AppResult<UserId> {
    let Some(TypedHeader(Authorization(token))) = header else {
        return Err(AppError::Unauthorized);
    };

    jwt::verify_token(&token.0, key)
}

/// Anonymous callers are allowed; a token that is present must still be valid.
pub fn optional_user(header: AuthHeader, key: &DecodingKey) -> AppResult<Option<UserId>> {
    header
        .map(|TypedHeader(Authorization(token))| jwt::verify_token(&token.0, key))
        .transpose()
}
