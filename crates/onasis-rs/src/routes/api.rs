//! The abstracted REST facade: `POST /api/{category}/{operation}`.
//!
//! Callers address capabilities, never vendors. A vendor can still be
//! pinned per request with the `X-Vendor` header or a `vendor` query
//! parameter; otherwise the category's default vendor serves the call.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::settings::Settings;
use crate::services::abstraction::AbstractionLayer;
use crate::services::registry::AdapterRegistry;

use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::{json, Value};
use std::sync::Arc;

fn vendor_preference(req: &HttpRequest) -> Option<String> {
    if let Some(header) = req.headers().get("x-vendor").and_then(|v| v.to_str().ok()) {
        if !header.is_empty() {
            return Some(header.to_string());
        }
    }
    req.query_string().split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "vendor" && !value.is_empty()).then(|| value.to_string())
    })
}

pub async fn abstracted_call(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Bytes,
    registry: web::Data<Arc<AdapterRegistry>>,
    val: web::Data<Arc<AbstractionLayer>>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let (category, operation) = path.into_inner();
    let mut ctx = RequestContext::from_request(&req);
    if ctx.project_scope.is_none() {
        ctx.project_scope = settings.project_scope.clone();
    }
    let expose = settings.expose_error_messages;

    // An empty body is an empty input object; anything else must parse.
    let input: Value = if body.is_empty() {
        json!({})
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

    let vendor = vendor_preference(&req);

    let outcome = match registry.ensure_ready().await {
        Ok(()) => {
            val.execute_abstracted_call(&category, &operation, &input, vendor.as_deref(), &ctx)
                .await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(envelope) => Ok(HttpResponse::Ok().json(envelope)),
        Err(err) => Ok(err.to_response(Some(&ctx.request_id), expose)),
    }
}

/// Registers the facade route.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/{category}/{operation}", web::post().to(abstracted_call));
}
