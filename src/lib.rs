pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod pagination;
pub mod routes;
pub mod shopping_list;
pub mod utils;

use axum::extract::FromRef;
use jsonwebtoken::{DecodingKey, EncodingKey};
use sqlx::PgPool;

use crate::{config::Config, error::AppResult, pagination::PageSize};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    page_size: PageSize,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> AppResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())?;

        Ok(Self {
            pool,
            page_size: PageSize(config.page_size),
            encoding_key,
            decoding_key,
        })
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for EncodingKey {
    fn from_ref(app_state: &AppState) -> EncodingKey {
        app_state.encoding_key.clone()
    }
}

impl FromRef<AppState> for DecodingKey {
    fn from_ref(app_state: &AppState) -> DecodingKey {
        app_state.decoding_key.clone()
    }
}

impl FromRef<AppState> for PageSize {
    fn from_ref(app_state: &AppState) -> PageSize {
        app_state.page_size
    }
}
