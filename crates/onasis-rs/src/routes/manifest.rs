//! Service manifest, route policy, and the API-service catalog routes.

use crate::models::catalog::ServiceCatalog;
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::rpc::PROTOCOL_VERSION;
use crate::models::settings::Settings;
use crate::routes::proxy::ProxyState;
use crate::services::auth_bridge::AuthBridge;
use crate::services::registry::AdapterRegistry;

use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::debug;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// `GET /` — who this gateway is and what it fronts.
pub async fn service_manifest(
    registry: web::Data<Arc<AdapterRegistry>>,
    settings: web::Data<Settings>,
    catalog: web::Data<ServiceCatalog>,
) -> Result<HttpResponse> {
    let stats = registry.get_stats();
    Ok(HttpResponse::Ok().json(json!({
        "name": "onasis-gateway",
        "description": "API aggregation gateway for the Onasis platform",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": settings.mode.as_str(),
        "adapters": stats,
        "apiServices": catalog.api_services.keys().collect::<Vec<_>>(),
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "rpc": "/mcp",
            "abstracted": "/api/{category}/{operation}",
            "functions": "/functions/v1/{name}",
            "routePolicy": "/api/v1/gateway/route-policy",
        },
        "components": {
            "gateway": env!("CARGO_PKG_VERSION"),
            "protocol": PROTOCOL_VERSION,
        },
    })))
}

/// `GET /api/v1/gateway/route-policy` — the published contract that all
/// client traffic enters through the central gateway.
pub async fn route_policy(settings: web::Data<Settings>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "policy": "central-gateway-only",
        "statement": "All client traffic must enter via the central gateway; upstream services do not accept direct client connections.",
        "authService": settings.auth_service_url,
        "acceptedProxyRoutes": [
            "/functions/v1/{name}",
            "/api/v1/functions/v1/{name}",
            "/api/v1/ai-chat",
            "/api/services/{name}/*",
        ],
        "updatedAt": chrono::Utc::now().to_rfc3339(),
    })))
}

/// `GET /api/services` — the configured API-service index.
pub async fn list_services(catalog: web::Data<ServiceCatalog>) -> Result<HttpResponse> {
    let services: Vec<_> = catalog
        .api_services
        .iter()
        .map(|(name, service)| {
            json!({
                "name": name,
                "description": service.description,
                "proxyBase": format!("/api/services/{}", name),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "services": services })))
}

/// `GET /api/services/{name}`.
pub async fn service_detail(
    path: web::Path<String>,
    catalog: web::Data<ServiceCatalog>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    match catalog.api_services.get(&name) {
        Some(service) => Ok(HttpResponse::Ok().json(json!({
            "name": name,
            "description": service.description,
            "baseUrl": service.base_url,
            "proxyBase": format!("/api/services/{}", name),
        }))),
        None => {
            let err = GatewayError::FunctionNotFound { function: name };
            Ok(err.to_response(None, settings.expose_error_messages))
        }
    }
}

/// `ALL /api/services/{name}/{tail}` — transparent proxy onto the named
/// service's base URL. Query strings and bodies pass through; honored
/// identity headers are forwarded.
pub async fn service_proxy(
    req: HttpRequest,
    body: web::Bytes,
    path: web::Path<(String, String)>,
    catalog: web::Data<ServiceCatalog>,
    state: web::Data<ProxyState>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let (name, tail) = path.into_inner();
    let ctx = RequestContext::from_request(&req);
    let expose = settings.expose_error_messages;

    let service = match catalog.api_services.get(&name) {
        Some(service) => service,
        None => {
            let err = GatewayError::FunctionNotFound { function: name };
            return Ok(err.to_response(Some(&ctx.request_id), expose));
        }
    };

    let mut url = format!("{}/{}", service.base_url.trim_end_matches('/'), tail);
    if !req.query_string().is_empty() {
        url.push('?');
        url.push_str(req.query_string());
    }
    debug!("service proxy {} {} (request {})", req.method(), url, ctx.request_id);

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut outbound = state.client.request(method, &url);
    if let Some(bearer) = ctx.bearer_header() {
        outbound = outbound.header("authorization", bearer);
    }
    if let Some(key) = &ctx.api_key {
        outbound = outbound.header("x-api-key", key.clone());
    }
    if let Some(content_type) = req.headers().get("content-type").and_then(|v| v.to_str().ok()) {
        outbound = outbound.header("content-type", content_type);
    }
    if !body.is_empty() {
        outbound = outbound.body(body.to_vec());
    }

    let timeout = Duration::from_secs(settings.outbound_timeout_secs);
    match tokio::time::timeout(timeout, outbound.send()).await {
        Err(_) => {
            let err = GatewayError::Timeout {
                service: format!("api-service:{}", name),
                timeout_secs: settings.outbound_timeout_secs,
            };
            Ok(err.to_response(Some(&ctx.request_id), expose))
        }
        Ok(Err(e)) => {
            let err = GatewayError::Upstream {
                service: format!("api-service:{}", name),
                message: e.to_string(),
                status: None,
                body: None,
            };
            Ok(err.to_response(Some(&ctx.request_id), expose))
        }
        Ok(Ok(upstream)) => {
            let status = actix_web::http::StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
            let content_type = upstream
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            let bytes = upstream.bytes().await.unwrap_or_default();
            Ok(HttpResponse::build(status).content_type(content_type).body(bytes))
        }
    }
}

/// `GET /api/v1/gateway/adapters` — adapter listing with call statistics.
/// Operational endpoint: requires a verified bearer or the monitor token.
pub async fn adapter_listing(
    req: HttpRequest,
    registry: web::Data<Arc<AdapterRegistry>>,
    auth: web::Data<Arc<AuthBridge>>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);
    if let Err(err) = auth.verify(&ctx, false, true).await {
        return Ok(err.to_response(Some(&ctx.request_id), settings.expose_error_messages));
    }

    Ok(HttpResponse::Ok().json(json!({
        "adapters": registry.list_adapters(),
        "stats": registry.get_stats(),
    })))
}

/// Registers the manifest, policy, and service-catalog routes.
pub fn configure_manifest(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(service_manifest))
        .route("/api/v1/gateway/route-policy", web::get().to(route_policy))
        .route("/api/v1/gateway/adapters", web::get().to(adapter_listing))
        .route("/api/services", web::get().to(list_services))
        .route("/api/services/{name}", web::get().to(service_detail))
        .service(
            web::resource("/api/services/{name}/{tail:.*}")
                .route(web::route().to(service_proxy)),
        );
}
