//! API v1 routes.
//!
//! Each route group sits behind its own rate limit gate. The business
//! endpoints proper live in downstream services; these are the gateway's own.

use crate::{
    error::{ApiError, ApiResult},
    middleware::{
        auth::{decode_token, AuthUser, MaybeAuth},
        rate_limit::{presets, LimiterOverrides, RateLimitConfigError, ANONYMOUS_ROLE},
    },
    response::ApiResponse,
    state::AppState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Create the v1 API router.
pub fn router(state: &AppState) -> Result<Router<AppState>, RateLimitConfigError> {
    let status = Router::new().route("/status", get(service_status));
    let verify = Router::new().route("/auth/verify", post(verify_session));
    let whoami = Router::new().route("/whoami", get(whoami));

    if !state.config.rate_limit.enabled {
        return Ok(status.merge(verify).merge(whoami));
    }

    let registry = &state.rate_limits;
    Ok(Router::new()
        .merge(status.route_layer(registry.preset(presets::GENEROUS, None)?))
        .merge(verify.route_layer(registry.preset(
            presets::STRICT,
            Some(LimiterOverrides::new().key_prefix("auth")),
        )?))
        .merge(whoami.route_layer(registry.role_aware(None)?)))
}

#[derive(Debug, Serialize)]
struct ServiceStatus {
    status: &'static str,
    version: &'static str,
}

async fn service_status() -> ApiResponse<ServiceStatus> {
    ApiResponse::success(ServiceStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    token: String,
}

/// Only failed verifications count against the strict gate.
async fn verify_session(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<ApiResponse<AuthUser>> {
    let claims = decode_token(&body.token, &state.config.auth.jwt_secret)?;
    let user = AuthUser::from_claims(claims).ok_or(ApiError::InvalidToken)?;
    Ok(ApiResponse::success(user))
}

#[derive(Debug, Serialize)]
struct Caller {
    authenticated: bool,
    id: Option<String>,
    role: String,
}

async fn whoami(MaybeAuth(user): MaybeAuth) -> ApiResponse<Caller> {
    let caller = match user {
        Some(user) => Caller {
            authenticated: true,
            id: Some(user.id),
            role: user.role,
        },
        None => Caller {
            authenticated: false,
            id: None,
            role: ANONYMOUS_ROLE.to_string(),
        },
    };
    ApiResponse::success(caller)
}
