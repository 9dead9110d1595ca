use axum::headers::authorization::Credentials;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

use super::auth::UserId;

const TOKEN_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64,
    pub user_id: UserId,
}

/// `Authorization: Token <jwt>`
#[derive(Debug)]
pub struct JWTToken(pub String);

impl Credentials for JWTToken {
    const SCHEME: &'static str = "Token";

    fn decode(value: &axum::http::HeaderValue) -> Option<Self> {
        let mut it = value.to_str().ok()?.split_whitespace();
        let scheme = it.next()?;
        let token = it.next()?;

        if scheme != Self::SCHEME || it.next().is_some() {
            None?
        }

        Some(Self(token.to_string()))
    }

    fn encode(&self) -> axum::http::HeaderValue {
        unreachable!()
    }
}

pub fn generate_jwt(user_id: UserId, key: &EncodingKey) -> AppResult<String> {
    let exp = (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp();
    let claims = Claims { exp, user_id };
    let token = encode(&Header::new(Algorithm::RS384), &claims, key)?;

    Ok(token)
}

pub fn verify_token(token: &str, key: &DecodingKey) -> AppResult<UserId> {
    let claim = verify_jwt(token, key)?;
    Ok(claim.user_id)
}

pub fn verify_jwt(token: &str, key: &DecodingKey) -> AppResult<Claims> {
    let claims =
        jsonwebtoken::decode::<Claims>(token, key, &jsonwebtoken::Validation::new(Algorithm::RS384))?
            .claims;
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> (EncodingKey, DecodingKey) {
        (
            EncodingKey::from_rsa_pem(include_bytes!("../../tests/fixtures/jwt_private.pem")).unwrap(),
            DecodingKey::from_rsa_pem(include_bytes!("../../tests/fixtures/jwt_public.pem")).unwrap(),
        )
    }

    #[test]
    fn token_round_trip_keeps_user_id() {
        let (encoding, decoding) = keys();
        let token = generate_jwt(42, &encoding).unwrap();

        assert_eq!(verify_token(&token, &decoding).unwrap(), 42);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let (encoding, decoding) = keys();
        let mut token = generate_jwt(42, &encoding).unwrap();
        token.push('x');

        assert!(verify_token(&token, &decoding).is_err());
    }

    #[test]
    fn only_token_scheme_is_accepted() {
        let value = HeaderValue::from_static("Token abc.def.ghi");
        assert_eq!(JWTToken::decode(&value).unwrap().0, "abc.def.ghi");

        assert!(JWTToken::decode(&HeaderValue::from_static("Bearer abc")).is_none());
        assert!(JWTToken::decode(&HeaderValue::from_static("Token a b")).is_none());
    }
}
