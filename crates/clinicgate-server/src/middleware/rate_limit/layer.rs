//! Rate limit middleware layer.

use super::{
    store::QuotaStore,
    types::{LimiterConfig, RateLimitConfigError, RateLimitRejection, RateLimitResult},
};
use crate::error::ApiError;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Response},
    response::IntoResponse,
};
use futures::future::BoxFuture;
use std::{
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::warn;

/// A validated limiter bound to the store it counts in.
pub struct RateLimiter {
    store: Arc<QuotaStore>,
    config: LimiterConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<QuotaStore>, config: LimiterConfig) -> Result<Self, RateLimitConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Count `req` against its key.
    ///
    /// `Ok(None)` means the request is skipped and the store was not touched.
    pub fn check(&self, req: &Request) -> Result<Option<RateLimitResult>, ApiError> {
        if let Some(skip) = &self.config.skip_fn {
            if skip(req)? {
                return Ok(None);
            }
        }

        let key = match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, (self.config.key_fn)(req)?),
            None => (self.config.key_fn)(req)?,
        };
        let max = self.config.max.resolve(req);
        let now = Instant::now();
        let state = self.store.hit(&key, self.config.window, max, now);

        Ok(Some(RateLimitResult::from_state(key, &state, now)))
    }

    /// Give back a provisional increment after a successful response.
    fn settle(&self, result: &mut RateLimitResult) {
        if self.store.rollback(&result.key, result.window_id) {
            result.count -= 1;
            result.remaining = result.limit.saturating_sub(result.count);
        }
    }

    fn reject(&self, result: &RateLimitResult) -> Response<Body> {
        match &self.config.handler {
            Some(handler) => handler(&RateLimitRejection {
                key: result.key.clone(),
                count: result.count,
                limit: result.limit,
                retry_after: result.retry_after,
                reset_time: result.reset_time,
                message: self.config.message.clone(),
            }),
            None => ApiError::RateLimited {
                message: self.config.message.clone(),
                retry_after: result.retry_after,
            }
            .into_response(),
        }
    }

    pub fn into_layer(self) -> RateLimitLayer {
        RateLimitLayer {
            limiter: Arc::new(self),
        }
    }
}

/// Rate limit layer.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<Request> for RateLimitMiddleware<S>
where
    S: Service<Request, Response = Response<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let limiter = self.limiter.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // Counting happens here, before the future is first polled.
        let checked = limiter.check(&req);

        Box::pin(async move {
            let mut result = match checked {
                Ok(Some(result)) => result,
                Ok(None) => return inner.call(req).await,
                Err(err) => return Ok(err.into_response()),
            };

            if !result.allowed {
                warn!(
                    key = %result.key,
                    count = result.count,
                    max = result.limit,
                    method = %req.method(),
                    path = %req.uri().path(),
                    "Rate limit exceeded"
                );
                let mut response = limiter.reject(&result);
                add_rate_limit_headers(response.headers_mut(), &result);
                return Ok(response);
            }

            let mut response = inner.call(req).await?;

            if limiter.config.skip_successful_requests && response.status().as_u16() < 400 {
                limiter.settle(&mut result);
            }

            add_rate_limit_headers(response.headers_mut(), &result);
            Ok(response)
        })
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(result.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(result.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(result.reset_time.timestamp()),
    );

    if !result.allowed {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(result.retry_after));
    }
}
