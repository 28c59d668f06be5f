use actix_web::http::header::HeaderMap;
use actix_web::{HttpMessage, HttpRequest};

/// Request id assigned by the identity middleware, stored in request
/// extensions so handlers and the completion log see the same value.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Per-request context carried from the HTTP edge down to adapters.
///
/// Constructed once per request and dropped when the response completes;
/// nothing in here is ever persisted.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub session_id: Option<String>,
    /// Bearer token from `Authorization`, without the scheme prefix.
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub project_scope: Option<String>,
    /// Client address as reported by the connection / forwarding headers.
    pub forwarded_ip: Option<String>,
}

/// Inbound headers the gateway honors and selectively forwards upstream.
pub const FORWARDED_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "client-id",
    "x-project-scope",
    "x-session-id",
    "x-request-id",
    "apikey",
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl RequestContext {
    /// Builds the context from an inbound request.
    ///
    /// The request id comes from the identity middleware when present so
    /// the context, the `X-Request-ID` response header, and the completion
    /// log always agree.
    pub fn from_request(req: &HttpRequest) -> Self {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let headers = req.headers();
        let authorization = header_str(headers, "authorization")
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::to_string);

        let api_key = header_str(headers, "x-api-key")
            .or_else(|| header_str(headers, "apikey"))
            .map(str::to_string);

        let forwarded_ip = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| req.connection_info().realip_remote_addr().map(str::to_string));

        RequestContext {
            request_id,
            session_id: header_str(headers, "x-session-id").map(str::to_string),
            authorization,
            api_key,
            client_id: header_str(headers, "client-id").map(str::to_string),
            project_scope: header_str(headers, "x-project-scope").map(str::to_string),
            forwarded_ip,
        }
    }

    /// Key material for the gateway-side rate limiter bucket.
    pub fn bucket_material(&self) -> String {
        self.session_id
            .clone()
            .or_else(|| self.authorization.clone())
            .or_else(|| self.api_key.clone())
            .or_else(|| self.forwarded_ip.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// Raw bearer header value (with scheme), for upstream forwarding.
    pub fn bearer_header(&self) -> Option<String> {
        self.authorization.as_ref().map(|t| format!("Bearer {}", t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn context_extracts_honored_headers() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok-123"))
            .insert_header(("X-API-Key", "key-456"))
            .insert_header(("client-id", "cli-1"))
            .insert_header(("X-Project-Scope", "lanonasis"))
            .insert_header(("X-Session-ID", "sess-9"))
            .to_http_request();

        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.authorization.as_deref(), Some("tok-123"));
        assert_eq!(ctx.api_key.as_deref(), Some("key-456"));
        assert_eq!(ctx.client_id.as_deref(), Some("cli-1"));
        assert_eq!(ctx.project_scope.as_deref(), Some("lanonasis"));
        assert_eq!(ctx.session_id.as_deref(), Some("sess-9"));
        assert!(!ctx.request_id.is_empty());
    }

    #[actix_web::test]
    async fn bucket_material_prefers_session() {
        let req = TestRequest::default()
            .insert_header(("X-Session-ID", "sess-1"))
            .insert_header(("Authorization", "Bearer t"))
            .to_http_request();
        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.bucket_material(), "sess-1");
    }

    #[actix_web::test]
    async fn apikey_header_is_an_alias() {
        let req = TestRequest::default()
            .insert_header(("apikey", "anon-key"))
            .to_http_request();
        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.api_key.as_deref(), Some("anon-key"));
    }
}
