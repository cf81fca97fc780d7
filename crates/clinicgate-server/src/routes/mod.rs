//! Route configuration for the clinicgate API server.

mod internal;
mod v1;

use crate::{
    error::ApiError,
    middleware::auth::SessionLayer,
    middleware::rate_limit::{RateLimitConfigError, TrustProxyHeaders},
    state::AppState,
};
use axum::{response::IntoResponse, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

/// Create the main application router.
///
/// Fails when a rate limit gate cannot be built from the configuration.
pub fn create_router(state: AppState) -> Result<Router, RateLimitConfigError> {
    let common_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(state.config.server.request_timeout()));

    let mut router = Router::new()
        .nest("/api/v1", v1::router(&state)?)
        .nest("/internal", internal::router())
        .fallback(fallback_handler)
        .layer(SessionLayer::new(state.config.auth.jwt_secret.clone()));

    if state.config.server.trust_proxy_headers {
        router = router.layer(Extension(TrustProxyHeaders));
    }

    Ok(router.layer(common_middleware).with_state(state))
}

async fn fallback_handler() -> impl IntoResponse {
    ApiError::NotFound("Route".into())
}
