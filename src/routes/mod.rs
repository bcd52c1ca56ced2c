pub mod authoring;
pub mod health;
pub mod public;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::middleware::auth::{require_author, require_learner};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

/// Every route of the service. Callers add tracing, CORS and body limits on top.
pub fn api_router(state: AppState, public_rps: u32) -> Router {
    let learner_api = Router::new()
        .route("/api/tests/:id/public", get(public::get_public_test))
        .route("/api/tests/:id/attempts", get(public::list_attempts))
        .route("/api/tests/:id/attempts/start", post(public::start_attempt))
        .route(
            "/api/tests/:id/attempts/:attempt_id",
            get(public::get_attempt_result),
        )
        .route(
            "/api/tests/:id/attempts/:attempt_id/submit",
            post(public::submit_attempt),
        )
        .route("/api/lessons/:lesson_id/test", get(public::get_lesson_test))
        .route(
            "/api/lessons/:lesson_id/test/check",
            get(public::check_lesson_test),
        )
        .route_layer(from_fn_with_state(
            RateLimiter::new(public_rps),
            rps_middleware,
        ));

    let authoring_api = Router::new()
        .route("/api/authoring/tests", post(authoring::create_test))
        .route(
            "/api/authoring/tests/:id",
            get(authoring::get_test).delete(authoring::delete_test),
        )
        .route_layer(from_fn(require_author));

    let authenticated = learner_api
        .merge(authoring_api)
        .route_layer(from_fn_with_state(state.auth.clone(), require_learner));

    Router::new()
        .route("/health", get(health::health))
        .merge(authenticated)
        .with_state(state)
}
