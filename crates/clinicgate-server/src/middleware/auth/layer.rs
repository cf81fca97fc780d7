//! Session middleware layer.

use super::{jwt::decode_token, types::AuthUser};
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Attaches the caller's [`AuthUser`] to the request when a valid session
/// token is present.
///
/// Requests without a token, or with one that fails verification, continue
/// as anonymous callers. Rejecting them is up to the handlers behind.
#[derive(Clone)]
pub struct SessionLayer {
    jwt_secret: Arc<String>,
}

impl SessionLayer {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: Arc::new(jwt_secret.into()),
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}

/// Session middleware service.
#[derive(Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    jwt_secret: Arc<String>,
}

impl<S> Service<Request<Body>> for SessionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if let Some(user) = authenticate(&req, &self.jwt_secret) {
            req.extensions_mut().insert(user);
        }

        Box::pin(async move { inner.call(req).await })
    }
}

fn authenticate(req: &Request<Body>, secret: &str) -> Option<AuthUser> {
    let token = extract_token(req)?;
    match decode_token(&token, secret) {
        Ok(claims) if !claims.is_expired() => AuthUser::from_claims(claims),
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "Ignoring invalid session token");
            None
        }
    }
}

pub(crate) fn extract_token(req: &Request<Body>) -> Option<String> {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION) {
        if let Some(token) = auth_header
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
        {
            return Some(token.trim().to_string());
        }
    }

    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix("access_token="))
        .map(String::from)
}
