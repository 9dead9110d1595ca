use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    BoxError, Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tower::{buffer::BufferLayer, limit::RateLimitLayer, ServiceBuilder};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{api, AppState};

pub fn generate_routes(state: AppState, rate_limit_per_second: u64) -> Router {
    Router::new()
        // ==== AUTH ==== //
        .route("/api/auth/token/login/", post(api::auth::login))
        .route("/api/auth/token/logout/", post(api::auth::logout))
        // ==== USERS ==== //
        .route(
            "/api/users/",
            get(api::user::list_users).post(api::auth::registration),
        )
        .route("/api/users/me/", get(api::user::get_current_user))
        .route("/api/users/set_password/", post(api::auth::set_password))
        .route(
            "/api/users/subscriptions/",
            get(api::user::list_subscriptions),
        )
        .route("/api/users/:id/", get(api::user::get_user))
        .route(
            "/api/users/:id/subscribe/",
            post(api::user::subscribe).delete(api::user::unsubscribe),
        )
        // ==== TAGS ==== //
        .route("/api/tags/", get(api::tags::get_tags))
        .route("/api/tags/:id/", get(api::tags::get_tag))
        // ==== INGREDIENTS ==== //
        .route("/api/ingredients/", get(api::ingredients::get_ingredients))
        .route(
            "/api/ingredients/:id/",
            get(api::ingredients::get_ingredient),
        )
        // ==== RECIPES ==== //
        .route(
            "/api/recipes/",
            get(api::recipes::get_recipes).post(api::recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(api::shopping_cart::download_shopping_cart),
        )
        .route(
            "/api/recipes/:id/",
            get(api::recipes::get_recipe)
                .put(api::recipes::update_recipe)
                .patch(api::recipes::update_recipe)
                .delete(api::recipes::delete_recipe),
        )
        .route(
            "/api/recipes/:id/favorite/",
            post(api::recipes::favorite_recipe).delete(api::recipes::unfavorite_recipe),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(api::recipes::add_to_cart).delete(api::recipes::remove_from_cart),
        )
        .fallback(handler_404)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: BoxError| async move {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Unhandled error: {}", err),
                    )
                }))
                .layer(BufferLayer::new(1024))
                .layer(RateLimitLayer::new(
                    rate_limit_per_second,
                    Duration::from_secs(1),
                )),
        )
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}
