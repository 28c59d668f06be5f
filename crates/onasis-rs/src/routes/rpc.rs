//! The JSON-RPC 2.0 tool-call surface (`/mcp`).
//!
//! `POST /mcp` carries the protocol; `GET /mcp` opens an SSE stream that
//! announces a session id and then keeps the connection warm with comment
//! frames. Which tools `tools/list` exposes depends on the execution
//! mode: every adapter tool in full mode, the five discovery meta-tools
//! in lazy mode.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::rpc::{
    rpc_failure, RpcRequest, RpcResponse, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::models::settings::{ExecutionMode, Settings};
use crate::services::discovery::{DiscoveryService, LAZY_GUIDANCE, META_TOOL_PREFIX};
use crate::services::registry::AdapterRegistry;

use actix_web::{web, HttpRequest, HttpResponse, Result};
use futures_util::stream;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Seconds between SSE keepalive comments.
const KEEPALIVE_SECS: u64 = 30;

pub async fn mcp_post(
    req: HttpRequest,
    body: web::Bytes,
    registry: web::Data<Arc<AdapterRegistry>>,
    discovery: web::Data<Arc<DiscoveryService>>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);
    let expose = settings.expose_error_messages;

    let rpc: RpcRequest = match serde_json::from_slice(&body) {
        Ok(rpc) => rpc,
        Err(e) => {
            let response =
                RpcResponse::failure(None, PARSE_ERROR, format!("invalid JSON-RPC request: {}", e));
            return Ok(HttpResponse::Ok().json(response));
        }
    };
    let id = rpc.id.clone();

    let response = match rpc.method.as_str() {
        "initialize" => RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": "onasis-gateway",
                    "version": env!("CARGO_PKG_VERSION"),
                    "mode": settings.mode.as_str(),
                },
            }),
        ),

        "notifications/initialized" | "ping" => RpcResponse::success(id, json!({})),

        "tools/list" => match registry.ensure_ready().await {
            Err(err) => rpc_failure(id, &err, &ctx.request_id, expose),
            Ok(()) => {
                let tools = match settings.mode {
                    ExecutionMode::Lazy => DiscoveryService::meta_tools(),
                    ExecutionMode::Full => registry.list_all_tools(),
                };
                RpcResponse::success(id, json!({ "tools": tools }))
            }
        },

        "tools/call" => {
            let name = rpc.params["name"].as_str().unwrap_or_default().to_string();
            let arguments = rpc.params.get("arguments").cloned().unwrap_or_else(|| json!({}));

            if name.is_empty() {
                let err = GatewayError::Validation {
                    message: "missing required param 'name'".into(),
                    field: Some("name".into()),
                };
                rpc_failure(id, &err, &ctx.request_id, expose)
            } else if name.starts_with(META_TOOL_PREFIX) {
                match discovery.dispatch(&name, &arguments, &ctx).await {
                    Ok(result) => RpcResponse::success(id, result),
                    Err(err) => rpc_failure(id, &err, &ctx.request_id, expose),
                }
            } else if settings.mode == ExecutionMode::Lazy {
                // Concrete tool ids are not addressable in lazy mode.
                RpcResponse::failure_with_data(
                    id,
                    METHOD_NOT_FOUND,
                    format!("unknown tool '{}'. {}", name, LAZY_GUIDANCE),
                    json!({ "requestId": ctx.request_id }),
                )
            } else {
                let outcome = match registry.ensure_ready().await {
                    Ok(()) => registry.call_tool(&name, arguments, &ctx).await,
                    Err(err) => Err(err),
                };
                match outcome {
                    Ok(result) => RpcResponse::success(id, result),
                    Err(err) => rpc_failure(id, &err, &ctx.request_id, expose),
                }
            }
        }

        other => RpcResponse::failure_with_data(
            id,
            METHOD_NOT_FOUND,
            format!("method '{}' not found", other),
            json!({ "requestId": ctx.request_id }),
        ),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// SSE stream: an `open` event carrying a fresh session id, then a
/// comment keepalive every 30 seconds until the client disconnects.
pub async fn mcp_sse() -> HttpResponse {
    let session_id = Uuid::new_v4().to_string();
    let open_frame = format!(
        "event: open\ndata: {}\n\n",
        json!({ "sessionId": session_id, "keepaliveSecs": KEEPALIVE_SECS })
    );

    let opening = stream::once(async move {
        Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(open_frame))
    });
    let keepalive = stream::unfold((), |()| async {
        tokio::time::sleep(Duration::from_secs(KEEPALIVE_SECS)).await;
        Some((Ok::<web::Bytes, actix_web::Error>(web::Bytes::from_static(b": keepalive\n\n")), ()))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(Box::pin(futures_util::StreamExt::chain(opening, keepalive)))
}

/// Registers `POST /mcp` and `GET /mcp`.
pub fn configure_rpc(cfg: &mut web::ServiceConfig) {
    cfg.route("/mcp", web::post().to(mcp_post)).route("/mcp", web::get().to(mcp_sse));
}

