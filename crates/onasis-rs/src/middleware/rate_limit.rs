//! Gateway-side rate limiting with hashed identity buckets.
//!
//! Two fixed windows guard the public surfaces: `/api/*` and `/mcp`, each
//! with its own budget. The bucket key is a truncated SHA-256 of the
//! caller's identity material (session id, bearer, api key, or forwarded
//! IP, in that order), so raw credentials never sit in the bucket map.

use crate::models::context::RequestId;
use crate::models::settings::RateWindow;
use crate::utils::hash::bucket_key;

use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tracks one bucket's fixed window.
#[derive(Debug, Clone)]
struct WindowEntry {
    count: u64,
    window_start: Instant,
}

/// In-memory bucket store with periodic cleanup.
///
/// Bucket reset is atomic under the map-level lock; the limiter is a
/// safety valve, not an accounting system.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    entries: Mutex<HashMap<String, WindowEntry>>,
    last_cleanup: Mutex<Option<Instant>>,
}

/// Outcome of a limiter check.
#[derive(Debug, PartialEq)]
pub enum Decision {
    Allowed { remaining: u64 },
    Limited { retry_after_secs: u64 },
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, window: &RateWindow) -> Decision {
        self.cleanup(window);

        let now = Instant::now();
        let window_len = Duration::from_secs(window.window_secs);
        let mut entries = self.entries.lock().expect("rate limit lock poisoned");
        let entry = entries
            .entry(key.to_string())
            .or_insert(WindowEntry { count: 0, window_start: now });

        if now.duration_since(entry.window_start) >= window_len {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count < window.max {
            entry.count += 1;
            Decision::Allowed { remaining: window.max - entry.count }
        } else {
            let elapsed = now.duration_since(entry.window_start);
            let retry_after = window_len.saturating_sub(elapsed).as_secs().max(1);
            Decision::Limited { retry_after_secs: retry_after }
        }
    }

    // Every 5 minutes, drop buckets idle for two windows.
    fn cleanup(&self, window: &RateWindow) {
        let now = Instant::now();
        {
            let mut last = self.last_cleanup.lock().expect("cleanup lock poisoned");
            match *last {
                Some(at) if now.duration_since(at) < Duration::from_secs(300) => return,
                _ => *last = Some(now),
            }
        }

        let threshold = Duration::from_secs(window.window_secs * 2);
        let mut entries = self.entries.lock().expect("rate limit lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < threshold);
        if entries.len() != before {
            info!("Rate limiter cleanup: {} buckets retained", entries.len());
        }
    }
}

/// Path-scoped limiter middleware: `/api/*` and `/mcp` budgets; other
/// paths pass untouched.
#[derive(Clone)]
pub struct ScopedRateLimit {
    store: Arc<RateLimitStore>,
    api: RateWindow,
    mcp: RateWindow,
}

impl ScopedRateLimit {
    pub fn new(api: RateWindow, mcp: RateWindow) -> Self {
        ScopedRateLimit { store: Arc::new(RateLimitStore::new()), api, mcp }
    }

    fn window_for(&self, path: &str) -> Option<(&'static str, RateWindow)> {
        if path == "/mcp" || path.starts_with("/mcp/") {
            Some(("mcp", self.mcp))
        } else if path.starts_with("/api/") || path == "/api" {
            Some(("api", self.api))
        } else {
            None
        }
    }
}

/// Identity material in precedence order: session, bearer, api key,
/// forwarded IP.
fn identity_material(req: &ServiceRequest) -> String {
    let header = |name: &str| {
        req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    };

    header("x-session-id")
        .or_else(|| header("authorization"))
        .or_else(|| header("x-api-key").or_else(|| header("apikey")))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        })
        .or_else(|| req.connection_info().realip_remote_addr().map(str::to_string))
        .unwrap_or_else(|| "anonymous".to_string())
}

impl<S, B> Transform<S, ServiceRequest> for ScopedRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = ScopedRateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ScopedRateLimitMiddleware { service: Rc::new(service), limiter: self.clone() })
    }
}

pub struct ScopedRateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: ScopedRateLimit,
}

impl<S, B> Service<ServiceRequest> for ScopedRateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let scope = limiter.window_for(req.path());
            let (scope_name, window) = match scope {
                Some(pair) => pair,
                None => return Ok(service.call(req).await?.map_into_boxed_body()),
            };

            let key = format!("{}:{}", scope_name, bucket_key(&identity_material(&req)));

            match limiter.store.check(&key, &window) {
                Decision::Allowed { remaining } => {
                    debug!("rate limit {}: {} remaining", key, remaining);
                    Ok(service.call(req).await?.map_into_boxed_body())
                }
                Decision::Limited { retry_after_secs } => {
                    warn!("rate limit exceeded for bucket {}", key);
                    let request_id =
                        req.extensions().get::<RequestId>().map(|id| id.0.clone());
                    let mut error = json!({
                        "code": "RATE_LIMIT_EXCEEDED",
                        "message": "Too many requests. Please try again later.",
                        "retryAfter": retry_after_secs,
                    });
                    if let Some(id) = request_id {
                        error["requestId"] = json!(id);
                    }
                    let response = HttpResponse::TooManyRequests()
                        .insert_header(("Retry-After", retry_after_secs.to_string()))
                        .json(json!({ "error": error }));
                    Ok(req.into_response(response).map_into_boxed_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    #[::core::prelude::v1::test]
    fn fixed_window_exhausts_and_resets() {
        let store = RateLimitStore::new();
        let window = RateWindow { max: 2, window_secs: 60 };

        assert!(matches!(store.check("k", &window), Decision::Allowed { remaining: 1 }));
        assert!(matches!(store.check("k", &window), Decision::Allowed { remaining: 0 }));
        match store.check("k", &window) {
            Decision::Limited { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected Limited, got {:?}", other),
        }

        // Distinct buckets do not interfere.
        assert!(matches!(store.check("other", &window), Decision::Allowed { .. }));
    }

    #[::core::prelude::v1::test]
    fn no_more_than_max_allowed_per_window() {
        let store = RateLimitStore::new();
        let window = RateWindow { max: 10, window_secs: 900 };
        let allowed = (0..50)
            .filter(|_| matches!(store.check("bucket", &window), Decision::Allowed { .. }))
            .count();
        assert_eq!(allowed, 10);
    }

    async fn handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn mcp_scope_is_limited_and_health_is_not() {
        let limiter = ScopedRateLimit::new(
            RateWindow { max: 100, window_secs: 900 },
            RateWindow { max: 2, window_secs: 900 },
        );
        let app = test::init_service(
            App::new()
                .wrap(limiter)
                .route("/mcp", web::post().to(handler))
                .route("/health", web::get().to(handler)),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/mcp")
                .insert_header(("X-Session-ID", "sess-1"))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 200);
        }
        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("X-Session-ID", "sess-1"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 429);
        assert!(res.headers().get("retry-after").is_some());

        // Unscoped paths never hit the limiter.
        for _ in 0..5 {
            let req = test::TestRequest::get().uri("/health").to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 200);
        }
    }

    #[actix_web::test]
    async fn buckets_are_per_identity() {
        let limiter = ScopedRateLimit::new(
            RateWindow { max: 1, window_secs: 900 },
            RateWindow { max: 1, window_secs: 900 },
        );
        let app = test::init_service(
            App::new().wrap(limiter).route("/api/x", web::get().to(handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/x")
            .insert_header(("Authorization", "Bearer alice"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        // Alice is out of budget, Bob is not.
        let req = test::TestRequest::get()
            .uri("/api/x")
            .insert_header(("Authorization", "Bearer alice"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 429);

        let req = test::TestRequest::get()
            .uri("/api/x")
            .insert_header(("Authorization", "Bearer bob"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
