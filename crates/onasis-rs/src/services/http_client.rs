//! Per-adapter outbound HTTP client.
//!
//! One instance fronts one upstream vendor and encapsulates everything
//! about talking to it: credential injection, rate-limit accounting,
//! retry with exponential backoff, circuit breaking, and request/response
//! event emission. Adapters never touch `reqwest` directly.

use crate::models::catalog::AuthConfig;
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::utils::hash::body_digest;
use crate::utils::path::join_url;

use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use sha1::Sha1;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

/// Declarative upstream endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: Method,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Endpoint { path: path.into(), method }
    }

    pub fn parse_method(raw: &str) -> Method {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            _ => Method::POST,
        }
    }
}

/// Per-request options beyond the endpoint itself.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Extra headers, e.g. a forwarded caller `Authorization`.
    pub headers: Vec<(String, String)>,
}

/// Resolved credentials for one upstream.
///
/// Built from the catalog's [`AuthConfig`] at adapter construction time;
/// secret material comes from the named environment variables and never
/// lives in the catalog itself.
#[derive(Debug, Clone, Default)]
pub enum AuthScheme {
    #[default]
    None,
    Bearer { token: String },
    ApiKey { key: String, value: String, in_query: bool },
    Basic { user: String, password: String },
    Hmac { user: String, secret: String, prefix: String },
    OAuth2 { access_token: Option<String> },
}

impl AuthScheme {
    /// Resolves a catalog auth declaration against the environment.
    /// Missing variables degrade to unauthenticated with a warning; the
    /// upstream's 401 is more diagnosable than a boot failure.
    pub fn from_config(adapter_id: &str, config: &AuthConfig) -> Self {
        let lookup = |env: &str| -> Option<String> {
            let value = std::env::var(env).ok().filter(|v| !v.is_empty());
            if value.is_none() {
                warn!("Adapter {}: env var {} is not set", adapter_id, env);
            }
            value
        };

        match config {
            AuthConfig::None => AuthScheme::None,
            AuthConfig::Bearer { token_env } => match lookup(token_env) {
                Some(token) => AuthScheme::Bearer { token },
                None => AuthScheme::None,
            },
            AuthConfig::Apikey { key, value_env, in_query } => match lookup(value_env) {
                Some(value) => {
                    AuthScheme::ApiKey { key: key.clone(), value, in_query: *in_query }
                }
                None => AuthScheme::None,
            },
            AuthConfig::Basic { user_env, password_env } => {
                match (lookup(user_env), lookup(password_env)) {
                    (Some(user), Some(password)) => AuthScheme::Basic { user, password },
                    _ => AuthScheme::None,
                }
            }
            AuthConfig::Hmac { user_env, secret_env, prefix } => {
                match (lookup(user_env), lookup(secret_env)) {
                    (Some(user), Some(secret)) => {
                        AuthScheme::Hmac { user, secret, prefix: prefix.clone() }
                    }
                    _ => AuthScheme::None,
                }
            }
            AuthConfig::Oauth2 { access_token_env } => {
                AuthScheme::OAuth2 { access_token: std::env::var(access_token_env).ok() }
            }
        }
    }
}

/// Retry policy: exponential backoff `base_delay * 2^(attempt-1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay_ms: 250 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exp))
    }
}

// Default window assumed when the upstream sends no rate-limit headers.
const DEFAULT_BUCKET_LIMIT: i64 = 1000;
const DEFAULT_BUCKET_WINDOW_SECS: i64 = 3600;

/// Rate-limit accounting for one upstream, updated from response headers.
#[derive(Debug, Clone)]
struct RateBucket {
    remaining: i64,
    reset_at: chrono::DateTime<Utc>,
}

impl RateBucket {
    fn fresh() -> Self {
        RateBucket {
            remaining: DEFAULT_BUCKET_LIMIT,
            reset_at: Utc::now() + chrono::Duration::seconds(DEFAULT_BUCKET_WINDOW_SECS),
        }
    }
}

/// The outbound client owned by one adapter.
pub struct HttpClient {
    service: String,
    base_url: String,
    auth: AuthScheme,
    client: Client,
    breaker: Arc<CircuitBreaker>,
    bucket: Mutex<RateBucket>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        auth: AuthScheme,
        timeout_secs: u64,
    ) -> Self {
        let service = service.into();
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("Failed to create HTTP client");

        HttpClient {
            breaker: CircuitBreaker::new(service.clone(), CircuitBreakerConfig::default()),
            service,
            base_url: base_url.into(),
            auth,
            client,
            bucket: Mutex::new(RateBucket::fresh()),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Executes a declarative endpoint against the upstream.
    ///
    /// The retry loop lives inside the breaker's protected section: one
    /// call makes at most `retry.attempts` outbound attempts, each
    /// network/5xx failure counts once toward the breaker, and upstream
    /// 429s wait out the indicated delay without touching the breaker.
    /// Non-retryable failures surface immediately; exhausted retries
    /// surface the last upstream error unchanged.
    pub async fn request(
        &self,
        endpoint: &Endpoint,
        opts: RequestOptions,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        if !self.breaker.can_execute().await {
            return Err(GatewayError::CircuitOpen { service: self.service.clone() });
        }

        let url = join_url(&self.base_url, &endpoint.path);
        let mut last_err =
            GatewayError::Internal { message: format!("no attempt made for {}", url) };

        for attempt in 1..=self.retry.attempts {
            if attempt > 1 && !self.breaker.can_execute().await {
                // The breaker tripped on this call's own failures; surface
                // what the upstream last said rather than CIRCUIT_OPEN.
                break;
            }

            self.check_bucket().await?;
            self.emit("request", &endpoint.method, &url, None, ctx);

            let builder = self.build_request(endpoint, &url, &opts);
            let outcome = timeout(self.timeout, builder.send()).await;

            match outcome {
                Err(_) => {
                    self.breaker.record_failure().await;
                    last_err = GatewayError::Timeout {
                        service: self.service.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    };
                    self.emit("error", &endpoint.method, &url, None, ctx);
                }
                Ok(Err(e)) => {
                    self.breaker.record_failure().await;
                    last_err = GatewayError::Upstream {
                        service: self.service.clone(),
                        message: e.to_string(),
                        status: None,
                        body: None,
                    };
                    self.emit("error", &endpoint.method, &url, None, ctx);
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    self.update_bucket(response.headers()).await;
                    self.emit("response", &endpoint.method, &url, Some(status.as_u16()), ctx);

                    if status.is_success() {
                        self.breaker.record_success().await;
                        return Ok(decode_body(response).await);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        // Retryable after the server-indicated delay; not
                        // counted toward the breaker.
                        let delay = retry_after(response.headers())
                            .unwrap_or_else(|| self.retry.backoff(attempt));
                        last_err = upstream_error(&self.service, response).await;
                        if attempt < self.retry.attempts {
                            debug!(
                                "{}: 429 from upstream, retrying in {:?} (attempt {}/{})",
                                self.service, delay, attempt, self.retry.attempts
                            );
                            sleep(delay).await;
                        }
                        continue;
                    }

                    if status.is_client_error() {
                        // Caller problem; retrying cannot help and the
                        // upstream is healthy, so the breaker is untouched.
                        return Err(upstream_error(&self.service, response).await);
                    }

                    // 5xx
                    self.breaker.record_failure().await;
                    last_err = upstream_error(&self.service, response).await;
                }
            }

            if attempt < self.retry.attempts {
                let delay = self.retry.backoff(attempt);
                warn!(
                    "{}: attempt {}/{} failed, backing off {:?}",
                    self.service, attempt, self.retry.attempts, delay
                );
                sleep(delay).await;
            }
        }

        Err(last_err)
    }

    fn build_request(&self, endpoint: &Endpoint, url: &str, opts: &RequestOptions) -> RequestBuilder {
        let mut builder = self.client.request(endpoint.method.clone(), url);

        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }

        let body_bytes = opts
            .body
            .as_ref()
            .map(|b| serde_json::to_vec(b).unwrap_or_default())
            .unwrap_or_default();

        builder = self.apply_auth(builder, endpoint, &body_bytes);

        for (name, value) in &opts.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
            {
                builder = builder.header(name, value);
            }
        }

        if opts.body.is_some() {
            builder = builder.header("content-type", "application/json").body(body_bytes);
        }

        builder.header(
            "user-agent",
            concat!("onasis-gateway/", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Injects credentials according to the configured scheme.
    fn apply_auth(
        &self,
        builder: RequestBuilder,
        endpoint: &Endpoint,
        body_bytes: &[u8],
    ) -> RequestBuilder {
        match &self.auth {
            AuthScheme::None => builder,
            AuthScheme::Bearer { token } => builder.bearer_auth(token),
            AuthScheme::ApiKey { key, value, in_query } => {
                if *in_query {
                    builder.query(&[(key.as_str(), value.as_str())])
                } else {
                    builder.header(key.as_str(), value.as_str())
                }
            }
            AuthScheme::Basic { user, password } => builder.basic_auth(user, Some(password)),
            AuthScheme::Hmac { user, secret, prefix } => {
                let now = Utc::now();
                let signature = hmac_signature(
                    secret,
                    endpoint.method.as_str(),
                    &endpoint.path,
                    now.timestamp(),
                    body_bytes,
                );
                builder
                    .header("Authorization", format!("{} {}:{}", prefix, user, signature))
                    .header("Date", now.to_rfc2822())
            }
            AuthScheme::OAuth2 { access_token } => match access_token {
                Some(token) => builder.bearer_auth(token),
                None => builder,
            },
        }
    }

    /// Fails fast when the upstream's window is exhausted.
    async fn check_bucket(&self) -> Result<(), GatewayError> {
        let mut bucket = self.bucket.lock().await;
        let now = Utc::now();
        if now >= bucket.reset_at {
            *bucket = RateBucket::fresh();
        }
        if bucket.remaining <= 0 {
            let wait = (bucket.reset_at - now).num_seconds().max(1) as u64;
            return Err(GatewayError::RateLimited {
                retry_after_secs: wait,
                bucket: self.service.clone(),
            });
        }
        Ok(())
    }

    /// Updates the bucket from response headers; a 1-hour default window
    /// is assumed when the upstream does not advertise its limits.
    async fn update_bucket(&self, headers: &HeaderMap) {
        let remaining = header_i64(headers, "x-ratelimit-remaining");
        let reset = header_i64(headers, "x-ratelimit-reset");

        let mut bucket = self.bucket.lock().await;
        match (remaining, reset) {
            (Some(remaining), Some(reset)) => {
                bucket.remaining = remaining;
                bucket.reset_at = chrono::DateTime::<Utc>::from_timestamp(reset, 0)
                    .unwrap_or_else(|| {
                        Utc::now() + chrono::Duration::seconds(DEFAULT_BUCKET_WINDOW_SECS)
                    });
            }
            (Some(remaining), None) => {
                bucket.remaining = remaining;
            }
            _ => {
                bucket.remaining -= 1;
            }
        }
    }

    /// Structured request lifecycle event.
    fn emit(
        &self,
        phase: &str,
        method: &Method,
        url: &str,
        status: Option<u16>,
        ctx: &RequestContext,
    ) {
        let event = serde_json::json!({
            "event": phase,
            "service": self.service,
            "method": method.as_str(),
            "url": url,
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "requestId": ctx.request_id,
        });
        match phase {
            "error" => warn!(target: "onasis::http", "{}", event),
            "response" => info!(target: "onasis::http", "{}", event),
            _ => debug!(target: "onasis::http", "{}", event),
        }
    }
}

/// `HMAC-SHA1(secret, METHOD || path || unixSeconds || base64(SHA256(body)))`,
/// base64-encoded.
pub fn hmac_signature(
    secret: &str,
    method: &str,
    path: &str,
    unix_seconds: i64,
    body: &[u8],
) -> String {
    let string_to_sign = format!("{}{}{}{}", method, path, unix_seconds, body_digest(body));
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_i64(headers, "retry-after").map(|secs| Duration::from_secs(secs.max(0) as u64))
}

async fn decode_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

async fn upstream_error(service: &str, response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.ok();
    GatewayError::Upstream {
        service: service.to_string(),
        message: format!("upstream returned status {}", status),
        status: Some(status),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryPolicy { attempts: 3, base_delay_ms: 100 };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn hmac_signature_is_deterministic() {
        let a = hmac_signature("secret", "POST", "/tunnels", 1_700_000_000, b"{}");
        let b = hmac_signature("secret", "POST", "/tunnels", 1_700_000_000, b"{}");
        assert_eq!(a, b);
        // Any component change moves the signature.
        let c = hmac_signature("secret", "GET", "/tunnels", 1_700_000_000, b"{}");
        assert_ne!(a, c);
        let d = hmac_signature("secret", "POST", "/tunnels", 1_700_000_001, b"{}");
        assert_ne!(a, d);
    }

    #[test]
    fn endpoint_method_parsing_defaults_to_post() {
        assert_eq!(Endpoint::parse_method("get"), Method::GET);
        assert_eq!(Endpoint::parse_method("DELETE"), Method::DELETE);
        assert_eq!(Endpoint::parse_method("banana"), Method::POST);
    }

    #[tokio::test]
    async fn exhausted_bucket_fails_fast_with_wait() {
        let client = HttpClient::new("svc", "https://api.example.com", AuthScheme::None, 30);
        {
            let mut bucket = client.bucket.lock().await;
            bucket.remaining = 0;
            bucket.reset_at = Utc::now() + chrono::Duration::seconds(120);
        }
        let err = client.check_bucket().await.unwrap_err();
        match err {
            GatewayError::RateLimited { retry_after_secs, .. } => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 120);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn expired_window_resets_the_bucket() {
        let client = HttpClient::new("svc", "https://api.example.com", AuthScheme::None, 30);
        {
            let mut bucket = client.bucket.lock().await;
            bucket.remaining = 0;
            bucket.reset_at = Utc::now() - chrono::Duration::seconds(5);
        }
        assert!(client.check_bucket().await.is_ok());
    }

    #[tokio::test]
    async fn bucket_updates_from_headers() {
        let client = HttpClient::new("svc", "https://api.example.com", AuthScheme::None, 30);
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("7"));
        let reset = (Utc::now() + chrono::Duration::seconds(30)).timestamp();
        headers.insert("x-ratelimit-reset", HeaderValue::from_str(&reset.to_string()).unwrap());

        client.update_bucket(&headers).await;
        let bucket = client.bucket.lock().await;
        assert_eq!(bucket.remaining, 7);
        assert_eq!(bucket.reset_at.timestamp(), reset);
    }
}
