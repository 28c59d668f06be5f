use crate::services::registry::AdapterRegistry;
use actix_web::{web, HttpResponse, Result};
use serde_json::json;
use std::sync::Arc;

/// Aggregated health across all registered adapters.
///
/// # Response Format
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.3.2",
///   "timestamp": "2026-08-01T10:30:00Z",
///   "adapters": [ { "adapter": "paystack", "healthy": true } ],
///   "stats": { "adapters": 6, "real": 4, "mock": 1, "tools": 42 }
/// }
/// ```
///
/// Degraded adapters flip `status` to `"degraded"` but the endpoint stays
/// 200; liveness is `/live`, not this.
pub async fn health_check(registry: web::Data<Arc<AdapterRegistry>>) -> Result<HttpResponse> {
    let adapters = registry.aggregate_health().await;
    let healthy = adapters.iter().all(|a| a.healthy);

    Ok(HttpResponse::Ok().json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "adapters": adapters,
        "stats": registry.get_stats(),
    })))
}

/// Readiness probe: ready once the adapter warm-up gate has released.
///
/// Returns 503 while adapters are still initializing so load balancers
/// hold traffic back; `tools/list` can therefore never observe a partial
/// catalog from a routed request.
pub async fn readiness_check(registry: web::Data<Arc<AdapterRegistry>>) -> Result<HttpResponse> {
    if registry.is_ready() {
        Ok(HttpResponse::Ok().json(json!({
            "status": "ready",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "warming_up",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })))
    }
}

/// Liveness probe. Fails only if the process itself is broken.
pub async fn liveness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Registers `/health`, `/ready`, and `/live`.
pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/live", web::get().to(liveness_check));
}
