use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;
use tracing::warn;

use crate::rate_limit::{ClientIdentity, Decision, FailurePolicy, RateLimitBucket, RateLimiter};

/// Derives the optional sub-key a request is counted under.
pub type Discriminator = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// A layer that enforces a bucket's quota using a [`RateLimiter`].
///
/// Denied requests get `429 Too Many Requests` and never reach the inner service.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<dyn RateLimiter>,
    bucket: Arc<RateLimitBucket>,
    discriminator: Option<Discriminator>,
}

impl RateLimitLayer {
    /// Create a new rate limit layer.
    pub fn new(limiter: Arc<dyn RateLimiter>, bucket: RateLimitBucket) -> Self {
        Self { limiter, bucket: Arc::new(bucket), discriminator: None }
    }

    /// Count requests separately per value returned by `f`.
    pub fn with_discriminator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        self.discriminator = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for RateLimitLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitLayer").field("bucket", &self.bucket.name()).finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: self.limiter.clone(),
            bucket: self.bucket.clone(),
            discriminator: self.discriminator.clone(),
        }
    }
}

/// Middleware service that enforces rate limits.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<dyn RateLimiter>,
    bucket: Arc<RateLimitBucket>,
    discriminator: Option<Discriminator>,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let limiter = self.limiter.clone();
        let bucket = self.bucket.clone();
        let client = client_identity(req.headers());
        let sub_key = self.discriminator.as_ref().and_then(|f| f(&req));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match limiter.check(&bucket, &client, sub_key.as_deref()).await {
                Ok(Decision::Allowed { remaining }) => {
                    let mut response = inner.call(req).await?;
                    set_quota_headers(response.headers_mut(), bucket.quota(), remaining);
                    Ok(response)
                }
                Ok(Decision::Denied { wait, .. }) => Ok(too_many_requests(&bucket, wait)),
                Err(err) => match bucket.on_store_failure() {
                    FailurePolicy::FailOpen => {
                        warn!(
                            target: "forecourt::rate_limit",
                            bucket = bucket.name(),
                            error = %err,
                            "rate limit store unavailable; failing open"
                        );
                        inner.call(req).await
                    }
                    FailurePolicy::FailClosed => {
                        warn!(
                            target: "forecourt::rate_limit",
                            bucket = bucket.name(),
                            error = %err,
                            "rate limit store unavailable; failing closed"
                        );
                        Ok(StatusCode::SERVICE_UNAVAILABLE.into_response())
                    }
                },
            }
        })
    }
}

/// Attribute a request using proxy headers, see [`ClientIdentity::from_forwarded`].
pub fn client_identity(headers: &HeaderMap) -> ClientIdentity {
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    ClientIdentity::from_forwarded(text("x-forwarded-for"), text("x-real-ip"))
}

fn set_quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
}

fn too_many_requests(bucket: &RateLimitBucket, wait: Duration) -> Response {
    // Round up so a client honouring Retry-After never comes back a moment too early.
    let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "too_many_requests", "retryAfter": retry_after })),
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    set_quota_headers(headers, bucket.quota(), 0);
    response
}

/// Sub-key from the last path segment, e.g. `/forms/finance` → `finance`.
pub fn last_path_segment(req: &Request<Body>) -> Option<String> {
    req.uri().path().rsplit('/').find(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), ClientIdentity::fallback());
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_identity(&headers).as_str(), "203.0.113.5");
    }

    #[test]
    fn last_segment() {
        let req = axum::http::Request::builder()
            .uri("/forms/part-exchange?x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(last_path_segment(&req).as_deref(), Some("part-exchange"));
    }

    #[test]
    fn retry_after_rounds_up() {
        let response = too_many_requests(&RateLimitBucket::contact(), Duration::from_millis(1_200));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    }
}
