use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::{json, Value};

/// Unified error type for the gateway.
///
/// Every failure the gateway can surface is one of these variants. Each
/// variant maps to a stable machine-readable `code` and an HTTP status;
/// the JSON-RPC surface derives its numeric codes from the same taxonomy
/// (see [`crate::models::rpc`]).
///
/// Errors are wrapped once, at the domain boundary where they occur, and
/// flow up unchanged. Retries happen below this type, inside the HTTP
/// client; above it one failure equals one user-facing failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Input validation failed: {message}")]
    Validation { message: String, field: Option<String> },

    #[error("Unknown category: {category}")]
    UnknownCategory { category: String },

    #[error("Unknown operation '{operation}' in category '{category}'")]
    UnknownOperation { category: String, operation: String },

    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Function not found: {function}")]
    FunctionNotFound { function: String },

    #[error("Operation '{operation}' is not supported by vendor '{vendor}'")]
    OperationNotSupported { vendor: String, operation: String },

    #[error("Adapter '{adapter}' is registered for discovery only and cannot execute calls")]
    AdapterNotExecutable { adapter: String },

    #[error("Adapter registry is still warming up")]
    RegistryNotReady,

    #[error("No vendors are registered for category '{category}'")]
    NoVendors { category: String },

    #[error("Authentication required")]
    AuthRequired,

    #[error("Forbidden: {message}")]
    AuthForbidden { message: String },

    #[error("Auth gateway unavailable: {message}")]
    AuthGatewayUnavailable { message: String },

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64, bucket: String },

    #[error("Circuit breaker open for service '{service}'")]
    CircuitOpen { service: String },

    #[error("Upstream error from {service}: {message}")]
    Upstream {
        service: String,
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    #[error("Request to {service} timed out after {timeout_secs}s")]
    Timeout { service: String, timeout_secs: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Stable machine-readable code for the wire envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "VALIDATION_ERROR",
            GatewayError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            GatewayError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            GatewayError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            GatewayError::FunctionNotFound { .. } => "FUNCTION_NOT_FOUND",
            GatewayError::OperationNotSupported { .. } => "OPERATION_NOT_SUPPORTED",
            GatewayError::AdapterNotExecutable { .. } => "ADAPTER_NOT_EXECUTABLE",
            GatewayError::RegistryNotReady => "ADAPTER_REGISTRY_NOT_READY",
            GatewayError::NoVendors { .. } => "NO_VENDORS",
            GatewayError::AuthRequired => "AUTH_REQUIRED",
            GatewayError::AuthForbidden { .. } => "AUTH_FORBIDDEN",
            GatewayError::AuthGatewayUnavailable { .. } => "AUTH_GATEWAY_UNAVAILABLE",
            GatewayError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            GatewayError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            GatewayError::Upstream { .. } => "UPSTREAM_ERROR",
            GatewayError::Timeout { .. } => "UPSTREAM_TIMEOUT",
            GatewayError::Config { .. } => "CONFIG_ERROR",
            GatewayError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for the REST surface.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::UnknownCategory { .. }
            | GatewayError::UnknownOperation { .. }
            | GatewayError::ToolNotFound { .. }
            | GatewayError::FunctionNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::OperationNotSupported { .. }
            | GatewayError::AdapterNotExecutable { .. } => StatusCode::NOT_IMPLEMENTED,
            GatewayError::RegistryNotReady
            | GatewayError::NoVendors { .. }
            | GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::AuthRequired => StatusCode::UNAUTHORIZED,
            GatewayError::AuthForbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::AuthGatewayUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Config { .. } | GatewayError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message is safe to show callers even when message
    /// exposure is off. Target-and-input errors are actionable for the
    /// caller; internal and upstream detail is not.
    pub fn message_is_safe(&self) -> bool {
        !matches!(
            self,
            GatewayError::Internal { .. }
                | GatewayError::Config { .. }
                | GatewayError::Upstream { .. }
                | GatewayError::AuthGatewayUnavailable { .. }
        )
    }

    /// Builds the wire body `{ "error": { code, message?, requestId, ... } }`.
    ///
    /// `expose` overrides suppression for unsafe messages
    /// (`EXPOSE_ERROR_MESSAGES`); the request id is always present when known.
    pub fn to_body(&self, request_id: Option<&str>, expose: bool) -> Value {
        let mut error = json!({ "code": self.code() });

        if self.message_is_safe() || expose {
            error["message"] = json!(self.to_string());
        }
        if let Some(id) = request_id {
            error["requestId"] = json!(id);
        }
        match self {
            GatewayError::RateLimited { retry_after_secs, .. } => {
                error["retryAfter"] = json!(retry_after_secs);
            }
            GatewayError::Upstream { status: Some(s), body: Some(b), .. } if expose => {
                error["upstreamStatus"] = json!(s);
                error["upstreamBody"] = b.clone();
            }
            GatewayError::Validation { field: Some(f), .. } => {
                error["field"] = json!(f);
            }
            _ => {}
        }

        json!({ "error": error })
    }

    /// Full response for handlers that carry a request context.
    pub fn to_response(&self, request_id: Option<&str>, expose: bool) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status());
        if let GatewayError::RateLimited { retry_after_secs, .. } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(self.to_body(request_id, expose))
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        // Fallback path for handlers returning `Result<_, GatewayError>`
        // directly; messages default to suppressed here since the exposure
        // flag is not in scope.
        self.to_response(None, false)
    }
}
