use crate::models::tool::{InputSchema, Tool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outbound authentication scheme for an adapter, as declared in the
/// catalog. Secret material is resolved from the named environment
/// variables at construction time; the catalog itself carries no secrets.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        /// Environment variable holding the token.
        token_env: String,
    },
    Apikey {
        /// Header or query parameter name.
        key: String,
        /// Environment variable holding the value.
        value_env: String,
        /// Where the key goes; `header` (default) or `query`.
        #[serde(default)]
        in_query: bool,
    },
    Basic {
        user_env: String,
        password_env: String,
    },
    Hmac {
        user_env: String,
        secret_env: String,
        /// Scheme prefix in the Authorization header.
        #[serde(default = "default_hmac_prefix")]
        prefix: String,
    },
    Oauth2 {
        access_token_env: String,
    },
}

fn default_hmac_prefix() -> String {
    "HMAC".to_string()
}

/// Kind of adapter a catalog entry describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Fully executable HTTP adapter.
    Real,
    /// Discovery-only entry; contributes tool counts, fails execution.
    Mock,
    /// Edge-function adapter whose tool list is derived from descriptor
    /// documents rather than declared inline.
    Supabase,
}

/// One tool entry in a catalog descriptor, pairing the tool contract with
/// the upstream endpoint it maps to.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: InputSchema,
    /// Upstream path, relative to the adapter base URL.
    pub path: String,
    /// HTTP method, e.g. `GET` or `POST`.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "POST".to_string()
}

impl ToolDescriptor {
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// One adapter entry in the service catalog.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdapterDescriptor {
    /// Stable identifier, e.g. `paystack`.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub category: Option<String>,

    #[serde(rename = "type")]
    pub kind: AdapterKind,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Upstream base URL (real adapters).
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Declared tool table (real adapters).
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,

    /// Advertised tool count (mock adapters).
    #[serde(default)]
    pub tool_count: Option<usize>,

    /// Route-description documents the supabase adapter derives its tool
    /// list from.
    #[serde(default)]
    pub descriptor_paths: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl AdapterDescriptor {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Immutable configuration snapshot loaded at startup: the ordered adapter
/// list plus an optional index of plain API services exposed under
/// `/api/services`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServiceCatalog {
    #[serde(default)]
    pub adapters: Vec<AdapterDescriptor>,

    /// Name → base URL index for the transparent `/api/services` proxy.
    #[serde(default)]
    pub api_services: BTreeMap<String, ApiService>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiService {
    pub base_url: String,
    #[serde(default)]
    pub description: String,
}

impl ServiceCatalog {
    pub fn enabled_adapters(&self) -> impl Iterator<Item = &AdapterDescriptor> {
        self.adapters.iter().filter(|a| a.enabled)
    }

    pub fn find(&self, id: &str) -> Option<&AdapterDescriptor> {
        self.adapters.iter().find(|a| a.id == id)
    }
}
