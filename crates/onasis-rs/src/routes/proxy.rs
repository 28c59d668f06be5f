//! Central upstream proxying: the Supabase edge-function fleet and the
//! AI chat route with fallback.
//!
//! Per the published route policy, client traffic reaches upstream
//! functions only through these routes; responses are passed through with
//! their status and content type intact and stamped with the gateway
//! route that served them.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::settings::Settings;

use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Header stamped on every proxied edge-function response.
pub const GATEWAY_ROUTE_HEADER: (&str, &str) = ("X-Gateway-Route", "central-supabase-proxy");

/// Shared outbound client for proxy routes.
#[derive(Clone)]
pub struct ProxyState {
    pub client: Client,
}

impl Default for ProxyState {
    fn default() -> Self {
        ProxyState {
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(32)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

fn reqwest_method(req: &HttpRequest) -> reqwest::Method {
    reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET)
}

/// `/(api/v1/)?functions/v1/{name}` — forwards any method to the edge
/// fleet, preserving the query string and mirroring status and
/// content-type back.
pub async fn central_function_proxy(
    req: HttpRequest,
    body: web::Bytes,
    path: web::Path<String>,
    state: web::Data<ProxyState>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    let ctx = RequestContext::from_request(&req);
    let expose = settings.expose_error_messages;

    if !FUNCTION_NAME.is_match(&name) {
        let err = GatewayError::FunctionNotFound { function: name };
        return Ok(err.to_response(Some(&ctx.request_id), expose));
    }

    let base = match settings.supabase_url.as_deref() {
        Some(base) => base.trim_end_matches('/'),
        None => {
            let err = GatewayError::Config {
                message: "SUPABASE_URL is not configured".to_string(),
            };
            return Ok(err.to_response(Some(&ctx.request_id), expose));
        }
    };

    let mut url = format!("{}/functions/v1/{}", base, name);
    if !req.query_string().is_empty() {
        url.push('?');
        url.push_str(req.query_string());
    }
    debug!("central proxy {} {} (request {})", req.method(), url, ctx.request_id);

    let mut outbound = state.client.request(reqwest_method(&req), &url);
    if let Some(key) = &settings.supabase_key {
        outbound = outbound.header("apikey", key);
    }
    if let Some(bearer) = ctx.bearer_header() {
        outbound = outbound.header("authorization", bearer);
    }

    // The body travels as JSON; an absent body becomes an empty object so
    // the functions runtime always sees a JSON payload.
    let payload: Value = if body.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(
            String::from_utf8_lossy(&body).into_owned(),
        ))
    };
    if req.method() != actix_web::http::Method::GET {
        outbound = outbound.json(&payload);
    }

    let timeout = Duration::from_secs(settings.outbound_timeout_secs);
    match tokio::time::timeout(timeout, outbound.send()).await {
        Err(_) => {
            let err = GatewayError::Timeout {
                service: "supabase-functions".to_string(),
                timeout_secs: settings.outbound_timeout_secs,
            };
            Ok(err.to_response(Some(&ctx.request_id), expose))
        }
        Ok(Err(e)) => {
            warn!("central proxy transport error: {} (request {})", e, ctx.request_id);
            let err = GatewayError::Upstream {
                service: "supabase-functions".to_string(),
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

            Ok(HttpResponse::build(status)
                .content_type(content_type)
                .insert_header(GATEWAY_ROUTE_HEADER)
                .body(bytes))
        }
    }
}

/// `POST /api/v1/ai-chat` — tries the primary AI router first, falls back
/// to the `ai-chat` edge function. The serving route is stamped in
/// `X-AI-Route`.
pub async fn ai_chat(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<ProxyState>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);
    let expose = settings.expose_error_messages;
    let timeout = Duration::from_secs(settings.outbound_timeout_secs);

    let payload: Value = if body.is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                let err = GatewayError::Validation {
                    message: format!("request body is not valid JSON: {}", e),
                    field: None,
                };
                return Ok(err.to_response(Some(&ctx.request_id), expose));
            }
        }
    };

    if let Some(router_url) = &settings.ai_router_url {
        let mut outbound = state.client.post(router_url).json(&payload);
        if let Some(bearer) = ctx.bearer_header() {
            outbound = outbound.header("authorization", bearer);
        }
        match tokio::time::timeout(timeout, outbound.send()).await {
            Ok(Ok(upstream)) if upstream.status().is_success() => {
                let bytes = upstream.bytes().await.unwrap_or_default();
                return Ok(HttpResponse::Ok()
                    .content_type("application/json")
                    .insert_header(("X-AI-Route", "ai-router"))
                    .body(bytes));
            }
            Ok(Ok(upstream)) => {
                warn!(
                    "ai router returned {}; falling back to supabase (request {})",
                    upstream.status(),
                    ctx.request_id
                );
            }
            Ok(Err(e)) => {
                warn!("ai router unreachable: {} (request {})", e, ctx.request_id);
            }
            Err(_) => {
                warn!("ai router timed out; falling back (request {})", ctx.request_id);
            }
        }
    }

    let base = match settings.supabase_url.as_deref() {
        Some(base) => base.trim_end_matches('/'),
        None => {
            let err = GatewayError::Upstream {
                service: "ai-chat".to_string(),
                message: "no AI route available".to_string(),
                status: None,
                body: None,
            };
            return Ok(err.to_response(Some(&ctx.request_id), expose));
        }
    };

    let url = format!("{}/functions/v1/ai-chat", base);
    let mut outbound = state.client.post(&url).json(&payload);
    if let Some(key) = &settings.supabase_key {
        outbound = outbound.header("apikey", key);
    }
    if let Some(bearer) = ctx.bearer_header() {
        outbound = outbound.header("authorization", bearer);
    }

    match tokio::time::timeout(timeout, outbound.send()).await {
        Ok(Ok(upstream)) => {
            let status = actix_web::http::StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
            let bytes = upstream.bytes().await.unwrap_or_default();
            Ok(HttpResponse::build(status)
                .content_type("application/json")
                .insert_header(("X-AI-Route", "supabase"))
                .body(bytes))
        }
        Ok(Err(e)) => {
            let err = GatewayError::Upstream {
                service: "ai-chat".to_string(),
                message: e.to_string(),
                status: None,
                body: None,
            };
            Ok(err.to_response(Some(&ctx.request_id), expose))
        }
        Err(_) => {
            let err = GatewayError::Timeout {
                service: "ai-chat".to_string(),
                timeout_secs: settings.outbound_timeout_secs,
            };
            Ok(err.to_response(Some(&ctx.request_id), expose))
        }
    }
}

/// Registers the central proxy under both spellings plus the AI route.
pub fn configure_proxy(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/functions/v1/{name}").route(web::route().to(central_function_proxy)),
    )
    .service(
        web::resource("/api/v1/functions/v1/{name}")
            .route(web::route().to(central_function_proxy)),
    )
    .route("/api/v1/ai-chat", web::post().to(ai_chat));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_name_guard() {
        for good in ["ai-chat", "memory_create", "Fn123"] {
            assert!(FUNCTION_NAME.is_match(good), "{} should match", good);
        }
        for bad in ["../etc/passwd", "a b", "fn/evil", "", "fn?x=1"] {
            assert!(!FUNCTION_NAME.is_match(bad), "{} should not match", bad);
        }
    }
}
