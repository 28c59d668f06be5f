use crate::models::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision the gateway speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_ERROR: i64 = -32000;

/// Inbound JSON-RPC request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Outbound JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(RpcError { code, message: message.into(), data: None }),
        }
    }

    pub fn failure_with_data(
        id: Option<Value>,
        code: i64,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(RpcError { code, message: message.into(), data: Some(data) }),
        }
    }
}

/// Maps the gateway taxonomy onto JSON-RPC numeric codes.
///
/// Unknown targets are method-not-found; schema failures are
/// invalid-params; everything else is the generic server error, with the
/// stable gateway code attached as error data by the dispatcher.
pub fn rpc_code_for(err: &GatewayError) -> i64 {
    match err {
        GatewayError::UnknownCategory { .. }
        | GatewayError::UnknownOperation { .. }
        | GatewayError::ToolNotFound { .. }
        | GatewayError::FunctionNotFound { .. } => METHOD_NOT_FOUND,
        GatewayError::Validation { .. } => INVALID_PARAMS,
        _ => SERVER_ERROR,
    }
}

/// Renders a gateway error as a JSON-RPC failure envelope.
pub fn rpc_failure(id: Option<Value>, err: &GatewayError, request_id: &str, expose: bool) -> RpcResponse {
    let message = if err.message_is_safe() || expose {
        err.to_string()
    } else {
        "internal error".to_string()
    };
    RpcResponse::failure_with_data(
        id,
        rpc_code_for(err),
        message,
        serde_json::json!({ "code": err.code(), "requestId": request_id }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_minimal_envelope() {
        let req: RpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.params.is_null());
    }

    #[test]
    fn unknown_target_maps_to_method_not_found() {
        let err = GatewayError::ToolNotFound { tool: "x:y".into() };
        assert_eq!(rpc_code_for(&err), METHOD_NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_invalid_params() {
        let err = GatewayError::Validation { message: "bad".into(), field: None };
        assert_eq!(rpc_code_for(&err), INVALID_PARAMS);
    }

    #[test]
    fn failure_envelope_carries_stable_code() {
        let err = GatewayError::CircuitOpen { service: "ngrok-api".into() };
        let resp = rpc_failure(Some(json!(7)), &err, "req-1", false);
        let raw = serde_json::to_value(&resp).unwrap();
        assert_eq!(raw["id"], 7);
        assert_eq!(raw["error"]["code"], SERVER_ERROR);
        assert_eq!(raw["error"]["data"]["code"], "CIRCUIT_OPEN");
        assert_eq!(raw["error"]["data"]["requestId"], "req-1");
        assert!(raw.get("result").is_none());
    }
}
