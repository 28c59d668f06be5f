use crate::models::settings::{ExecutionMode, OriginPolicy, RateWindow, Settings};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use serde::Deserialize;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env_var(name)
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn env_flag(name: &str) -> bool {
    matches!(env_var(name).as_deref(), Some("1") | Some("true") | Some("yes"))
}

#[derive(Deserialize)]
struct SupabaseClaims {
    #[serde(rename = "ref")]
    project_ref: Option<String>,
}

/// Derives the Supabase project URL from the anon key's `ref` claim.
///
/// The anon key is a JWT whose payload names the project; this is a claim
/// read, not a verification — the gateway never checks the signature.
pub fn derive_supabase_url(anon_key: &str) -> Option<String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data =
        jsonwebtoken::decode::<SupabaseClaims>(anon_key, &DecodingKey::from_secret(b""), &validation)
            .ok()?;
    data.claims
        .project_ref
        .filter(|r| !r.is_empty())
        .map(|r| format!("https://{}.supabase.co", r))
}

/// Assembles the runtime settings from the environment.
///
/// # Environment Variables
///
/// - `ONASIS_HOST` / `ONASIS_PORT` - listener bind address (default `0.0.0.0:5800`)
/// - `ONASIS_MODE` - `full` or `lazy` tool enumeration (default `lazy`)
/// - `AUTH_SERVICE_URL` - identity service base URL (default `https://api.lanonasis.com`)
/// - `AUTH_TIMEOUT_SECS` - identity call deadline (default `8`)
/// - `MONITOR_TOKEN` - shared-secret bypass for operational endpoints
/// - `PROJECT_SCOPE` - default project scope stamped on upstream calls
/// - `SUPABASE_URL` / `SUPABASE_KEY` - edge-function fleet; the URL is
///   derived from the key's `ref` claim when unset
/// - `AI_ROUTER_URL` - primary endpoint for `/api/v1/ai-chat`
/// - `OUTBOUND_TIMEOUT_SECS` - upstream call deadline (default `30`)
/// - `EXPOSE_ERROR_MESSAGES` - include unsafe error messages in bodies
/// - `ALLOWED_ORIGINS` / `ALLOWED_ORIGIN_SUFFIXES` / `ALLOW_LOCALHOST` -
///   CORS policy (suffixes default to `lanonasis.com`)
/// - `ONASIS_CATALOG_PATH` - adapter catalog (default `./adapters.json`)
/// - `ONASIS_SERVICES_DIR` - descriptor scan fallback (default `./services`)
/// - `API_RATE_LIMIT` / `MCP_RATE_LIMIT` - requests per 15-minute window
///   (defaults `100` and `1000`)
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let supabase_key = env_var("SUPABASE_KEY").or_else(|| env_var("SUPABASE_ANON_KEY"));
    let supabase_url = env_var("SUPABASE_URL").or_else(|| {
        supabase_key.as_deref().and_then(|key| {
            let derived = derive_supabase_url(key);
            match &derived {
                Some(url) => debug!("Derived Supabase URL from anon key: {}", url),
                None => warn!("SUPABASE_URL unset and anon key carries no usable ref claim"),
            }
            derived
        })
    });

    let mut suffixes = env_list("ALLOWED_ORIGIN_SUFFIXES");
    if suffixes.is_empty() {
        suffixes.push("lanonasis.com".to_string());
    }

    let mode = match env_var("ONASIS_MODE") {
        Some(raw) => ExecutionMode::parse(&raw)
            .ok_or_else(|| format!("Invalid ONASIS_MODE '{}', expected full|lazy", raw))?,
        None => ExecutionMode::default(),
    };

    let settings = Settings {
        host: env_var("ONASIS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_u16("ONASIS_PORT", 5800),
        mode,
        auth_service_url: env_var("AUTH_SERVICE_URL")
            .unwrap_or_else(|| "https://api.lanonasis.com".to_string()),
        auth_timeout_secs: env_u64("AUTH_TIMEOUT_SECS", 8),
        monitor_token: env_var("MONITOR_TOKEN"),
        project_scope: env_var("PROJECT_SCOPE"),
        supabase_url,
        supabase_key,
        ai_router_url: env_var("AI_ROUTER_URL"),
        outbound_timeout_secs: env_u64("OUTBOUND_TIMEOUT_SECS", 30),
        expose_error_messages: env_flag("EXPOSE_ERROR_MESSAGES"),
        origins: OriginPolicy {
            exact: env_list("ALLOWED_ORIGINS"),
            suffixes,
            allow_localhost: env_var("ALLOW_LOCALHOST").map(|v| v != "false").unwrap_or(true),
        },
        catalog_path: env_var("ONASIS_CATALOG_PATH").unwrap_or_else(|| "./adapters.json".to_string()),
        services_dir: env_var("ONASIS_SERVICES_DIR").unwrap_or_else(|| "./services".to_string()),
        api_rate_limit: RateWindow { max: env_u64("API_RATE_LIMIT", 100), window_secs: 900 },
        mcp_rate_limit: RateWindow { max: env_u64("MCP_RATE_LIMIT", 1000), window_secs: 900 },
    };

    settings.validate()?;
    debug!(
        "Settings loaded: mode={}, auth={}, catalog={}",
        settings.mode.as_str(),
        settings.auth_service_url,
        settings.catalog_path
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    // An unsigned JWT with payload {"ref":"abcdefghij"}. Header and payload
    // only; the signature segment is irrelevant to claim extraction.
    fn unsigned_token(payload: &str) -> String {
        use base64::Engine as _;
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            engine.encode(payload),
            engine.encode("sig")
        )
    }

    #[test]
    fn supabase_url_derived_from_ref_claim() {
        let token = unsigned_token(r#"{"ref":"abcdefghij","role":"anon"}"#);
        assert_eq!(
            derive_supabase_url(&token).as_deref(),
            Some("https://abcdefghij.supabase.co")
        );
    }

    #[test]
    fn missing_ref_claim_yields_none() {
        let token = unsigned_token(r#"{"role":"anon"}"#);
        assert_eq!(derive_supabase_url(&token), None);
    }

    #[test]
    fn garbage_key_yields_none() {
        assert_eq!(derive_supabase_url("not-a-jwt"), None);
    }
}
