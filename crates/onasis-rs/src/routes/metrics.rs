//! Request metrics and the Prometheus-format exposition endpoint.
//!
//! Counters use relaxed atomics and are monotonic approximations: two
//! concurrent requests may interleave updates in any order, which is fine
//! for rates and histograms.

use actix_web::{web, HttpResponse, Result};
use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Per-endpoint counters.
#[derive(Debug, Default, Clone)]
pub struct EndpointCounters {
    pub count: u64,
    pub errors: u64,
    pub total_ms: u64,
}

/// Thread-safe metrics collector shared across workers.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// Total requests processed.
    pub requests_total: Arc<AtomicU64>,
    /// Requests with 2xx/3xx outcomes.
    pub requests_success: Arc<AtomicU64>,
    /// Requests with 4xx/5xx outcomes.
    pub requests_error: Arc<AtomicU64>,
    /// Sum of response times in milliseconds.
    pub response_time_sum: Arc<AtomicU64>,
    /// Requests currently in flight.
    pub active_connections: Arc<AtomicU64>,
    // Cumulative histogram buckets.
    pub bucket_100ms: Arc<AtomicU64>,
    pub bucket_500ms: Arc<AtomicU64>,
    pub bucket_1s: Arc<AtomicU64>,
    pub bucket_5s: Arc<AtomicU64>,
    pub bucket_inf: Arc<AtomicU64>,
    /// Per-endpoint counters keyed by normalized label.
    per_endpoint: Arc<RwLock<AHashMap<String, EndpointCounters>>>,
    pub start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            requests_success: Arc::new(AtomicU64::new(0)),
            requests_error: Arc::new(AtomicU64::new(0)),
            response_time_sum: Arc::new(AtomicU64::new(0)),
            active_connections: Arc::new(AtomicU64::new(0)),
            bucket_100ms: Arc::new(AtomicU64::new(0)),
            bucket_500ms: Arc::new(AtomicU64::new(0)),
            bucket_1s: Arc::new(AtomicU64::new(0)),
            bucket_5s: Arc::new(AtomicU64::new(0)),
            bucket_inf: Arc::new(AtomicU64::new(0)),
            per_endpoint: Arc::new(RwLock::new(AHashMap::new())),
            start_time: Instant::now(),
        }
    }
}

/// Collapses a request path into a bounded endpoint label so per-endpoint
/// metrics cannot grow without bound on parameterized paths.
pub fn endpoint_label(path: &str) -> String {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (None, _) => "/".to_string(),
        (Some(first), None) => format!("/{}", first),
        (Some("api"), Some(second)) => format!("/api/{}", second),
        (Some("functions"), Some(_)) => "/functions/v1".to_string(),
        (Some(first), Some(_)) => format!("/{}", first),
    }
}

impl MetricsCollector {
    /// Records one completed request.
    pub fn record_request(&self, path: &str, success: bool, response_time: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let ms = response_time.as_millis() as u64;
        self.response_time_sum.fetch_add(ms, Ordering::Relaxed);

        if ms <= 100 {
            self.bucket_100ms.fetch_add(1, Ordering::Relaxed);
        }
        if ms <= 500 {
            self.bucket_500ms.fetch_add(1, Ordering::Relaxed);
        }
        if ms <= 1000 {
            self.bucket_1s.fetch_add(1, Ordering::Relaxed);
        }
        if ms <= 5000 {
            self.bucket_5s.fetch_add(1, Ordering::Relaxed);
        } else {
            self.bucket_inf.fetch_add(1, Ordering::Relaxed);
        }

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }

        let label = endpoint_label(path);
        let mut endpoints = self.per_endpoint.write().expect("metrics lock poisoned");
        let counters = endpoints.entry(label).or_default();
        counters.count += 1;
        counters.total_ms += ms;
        if !success {
            counters.errors += 1;
        }
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn endpoint_snapshot(&self) -> Vec<(String, EndpointCounters)> {
        let endpoints = self.per_endpoint.read().expect("metrics lock poisoned");
        let mut rows: Vec<_> =
            endpoints.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Prometheus text exposition.
    pub fn prometheus_text(&self) -> String {
        let total = self.requests_total.load(Ordering::Relaxed);
        let success = self.requests_success.load(Ordering::Relaxed);
        let errors = self.requests_error.load(Ordering::Relaxed);
        let sum_ms = self.response_time_sum.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed().as_secs();

        let mut out = String::with_capacity(2048);
        out.push_str("# HELP onasis_requests_total Total HTTP requests processed\n");
        out.push_str("# TYPE onasis_requests_total counter\n");
        out.push_str(&format!("onasis_requests_total {}\n", total));
        out.push_str(&format!("onasis_requests_success_total {}\n", success));
        out.push_str(&format!("onasis_requests_error_total {}\n", errors));

        out.push_str("# HELP onasis_response_time_seconds Response time distribution\n");
        out.push_str("# TYPE onasis_response_time_seconds histogram\n");
        for (le, bucket) in [
            ("0.1", &self.bucket_100ms),
            ("0.5", &self.bucket_500ms),
            ("1", &self.bucket_1s),
            ("5", &self.bucket_5s),
        ] {
            out.push_str(&format!(
                "onasis_response_time_seconds_bucket{{le=\"{}\"}} {}\n",
                le,
                bucket.load(Ordering::Relaxed)
            ));
        }
        out.push_str(&format!(
            "onasis_response_time_seconds_bucket{{le=\"+Inf\"}} {}\n",
            total
        ));
        out.push_str(&format!(
            "onasis_response_time_seconds_sum {}\n",
            sum_ms as f64 / 1000.0
        ));
        out.push_str(&format!("onasis_response_time_seconds_count {}\n", total));

        out.push_str("# HELP onasis_active_connections Requests currently in flight\n");
        out.push_str("# TYPE onasis_active_connections gauge\n");
        out.push_str(&format!(
            "onasis_active_connections {}\n",
            self.active_connections.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP onasis_uptime_seconds Seconds since process start\n");
        out.push_str("# TYPE onasis_uptime_seconds counter\n");
        out.push_str(&format!("onasis_uptime_seconds {}\n", uptime));

        out.push_str("# HELP onasis_endpoint_requests_total Requests per endpoint\n");
        out.push_str("# TYPE onasis_endpoint_requests_total counter\n");
        for (label, counters) in self.endpoint_snapshot() {
            out.push_str(&format!(
                "onasis_endpoint_requests_total{{endpoint=\"{}\"}} {}\n",
                label, counters.count
            ));
            out.push_str(&format!(
                "onasis_endpoint_errors_total{{endpoint=\"{}\"}} {}\n",
                label, counters.errors
            ));
        }

        out
    }
}

async fn prometheus_metrics(collector: web::Data<MetricsCollector>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(collector.prometheus_text()))
}

async fn json_metrics(collector: web::Data<MetricsCollector>) -> Result<HttpResponse> {
    let total = collector.requests_total.load(Ordering::Relaxed);
    let sum_ms = collector.response_time_sum.load(Ordering::Relaxed);
    let endpoints: serde_json::Map<String, serde_json::Value> = collector
        .endpoint_snapshot()
        .into_iter()
        .map(|(label, c)| {
            (
                label,
                serde_json::json!({
                    "count": c.count,
                    "errors": c.errors,
                    "avgMs": if c.count > 0 { c.total_ms / c.count } else { 0 },
                }),
            )
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requestsTotal": total,
        "requestsSuccess": collector.requests_success.load(Ordering::Relaxed),
        "requestsError": collector.requests_error.load(Ordering::Relaxed),
        "avgResponseMs": if total > 0 { sum_ms / total } else { 0 },
        "activeConnections": collector.active_connections.load(Ordering::Relaxed),
        "uptimeSecs": collector.start_time.elapsed().as_secs(),
        "endpoints": endpoints,
    })))
}

/// Registers `GET /metrics` (Prometheus) and `GET /metrics/json`.
pub fn configure_metrics(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(prometheus_metrics))
        .route("/metrics/json", web::get().to(json_metrics));
}
