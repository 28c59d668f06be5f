use serde::{Deserialize, Serialize};

/// How the JSON-RPC surface enumerates tools.
///
/// In `Full` mode `tools/list` returns every registered tool. In `Lazy`
/// mode the catalog is reduced to the five discovery meta-tools and all
/// execution goes through `gateway-execute`; this is the primary mechanism
/// for keeping the tool catalog bounded, not a debug convenience.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Full,
    Lazy,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Lazy
    }
}

impl ExecutionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "lazy" => Some(Self::Lazy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Lazy => "lazy",
        }
    }
}

/// One fixed rate-limit window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RateWindow {
    /// Requests allowed per window.
    pub max: u64,
    /// Window length in seconds.
    pub window_secs: u64,
}

/// Origin policy for the CORS middleware.
///
/// An origin is allowed iff it matches the exact list, ends with one of
/// the allowed suffixes, or is localhost while localhost is permitted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OriginPolicy {
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub allow_localhost: bool,
}

impl OriginPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        if self.exact.iter().any(|o| o == origin) {
            return true;
        }
        let host = origin
            .strip_prefix("https://")
            .or_else(|| origin.strip_prefix("http://"))
            .unwrap_or(origin);
        let host = host.split(':').next().unwrap_or(host);
        if self.allow_localhost && (host == "localhost" || host == "127.0.0.1") {
            return true;
        }
        self.suffixes
            .iter()
            .any(|suffix| host == suffix || host.ends_with(&format!(".{}", suffix)))
    }
}

/// Complete runtime configuration for the gateway.
///
/// Assembled from environment variables by
/// [`crate::config::settings::load_settings`]; the catalog of adapters is
/// loaded separately (see [`crate::config::catalog`]).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Bind address for the HTTP listener.
    pub host: String,
    /// Bind port for the HTTP listener.
    pub port: u16,

    /// Tool enumeration mode for the JSON-RPC surface.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Base URL of the external identity service used for bearer
    /// verification. The gateway never validates credentials locally.
    pub auth_service_url: String,
    /// Deadline for calls to the identity service, in seconds.
    pub auth_timeout_secs: u64,
    /// Shared-secret token that bypasses remote verification, accepted
    /// only by specific operational endpoints.
    #[serde(skip_serializing)]
    pub monitor_token: Option<String>,

    /// Project scope stamped onto outbound calls when the caller does not
    /// provide one.
    pub project_scope: Option<String>,

    /// Supabase project base URL for the edge-function fleet. Derived from
    /// the `ref` claim of the anon key when not set explicitly.
    pub supabase_url: Option<String>,
    /// Supabase anon key, forwarded as `apikey` on edge-function calls.
    #[serde(skip_serializing)]
    pub supabase_key: Option<String>,

    /// Primary AI router endpoint for `/api/v1/ai-chat`; the Supabase
    /// `ai-chat` function is the fallback.
    pub ai_router_url: Option<String>,

    /// Deadline for upstream adapter calls, in seconds.
    pub outbound_timeout_secs: u64,

    /// When on, unsafe error messages (internal/upstream detail) are
    /// included in response bodies. Off by default.
    pub expose_error_messages: bool,

    /// Origin policy for the CORS middleware.
    pub origins: OriginPolicy,

    /// Path to the JSON adapter catalog.
    pub catalog_path: String,
    /// Directory scanned for per-adapter descriptors when the catalog file
    /// is absent.
    pub services_dir: String,

    /// Gateway-side limiter for `/api/*`.
    pub api_rate_limit: RateWindow,
    /// Gateway-side limiter for `/mcp`.
    pub mcp_rate_limit: RateWindow,
}

impl Settings {
    /// Basic sanity validation; the catalog has its own validator.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_service_url.is_empty() {
            return Err("auth_service_url must not be empty".to_string());
        }
        if !self.auth_service_url.starts_with("http://")
            && !self.auth_service_url.starts_with("https://")
        {
            return Err(format!(
                "auth_service_url must include a scheme: {}",
                self.auth_service_url
            ));
        }
        if self.auth_timeout_secs == 0 || self.outbound_timeout_secs == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        if self.api_rate_limit.max == 0 || self.mcp_rate_limit.max == 0 {
            return Err("rate limit maxima must be greater than zero".to_string());
        }
        if let Some(url) = &self.supabase_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("supabase_url must include a scheme: {}", url));
            }
        }
        Ok(())
    }
}
