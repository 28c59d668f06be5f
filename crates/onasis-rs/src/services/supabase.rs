//! Edge-function adapter: a fully data-driven upstream.
//!
//! The tool list is not written in code or even in the catalog; it is
//! derived from route-description documents (markdown) that name each
//! deployed function. Adding an upstream function is a descriptor
//! refresh, never a code change.

use crate::models::catalog::AdapterDescriptor;
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::tool::{InputSchema, Tool};
use crate::services::adapter::{Adapter, AdapterHealth, AdapterStats, AdapterStatsSnapshot};
use crate::services::http_client::{Endpoint, HttpClient, RequestOptions};

use async_trait::async_trait;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::RwLock;
use std::time::{Duration, Instant};

// `## slug` or `### slug`, optionally backticked; slugs are the same
// shape the central proxy accepts.
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{2,3}[ \t]+`?([A-Za-z0-9][A-Za-z0-9_-]*)`?[ \t]*$").unwrap());

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```json(.*?)```").unwrap());

/// Default re-parse interval for descriptor documents.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct ToolCache {
    tools: Vec<Tool>,
    slugs: HashSet<String>,
    refreshed_at: Option<Instant>,
}

pub struct SupabaseAdapter {
    descriptor: AdapterDescriptor,
    client: HttpClient,
    cache: RwLock<ToolCache>,
    ttl: Duration,
    stats: AdapterStats,
}

impl SupabaseAdapter {
    pub fn new(descriptor: AdapterDescriptor, client: HttpClient) -> Self {
        SupabaseAdapter {
            descriptor,
            client,
            cache: RwLock::new(ToolCache {
                tools: Vec::new(),
                slugs: HashSet::new(),
                refreshed_at: None,
            }),
            ttl: DEFAULT_TTL,
            stats: AdapterStats::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_is_fresh(&self) -> bool {
        self.cache
            .read()
            .expect("cache lock poisoned")
            .refreshed_at
            .map(|at| at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    fn refresh_from_descriptors(&self) {
        let mut tools = Vec::new();
        for path in &self.descriptor.descriptor_paths {
            match std::fs::read_to_string(path) {
                Ok(markdown) => tools.extend(parse_function_descriptors(&markdown)),
                Err(e) => warn!(
                    "Adapter {}: descriptor {} unreadable: {}",
                    self.descriptor.id, path, e
                ),
            }
        }

        // Later documents win on slug collisions.
        let mut seen = HashSet::new();
        tools.reverse();
        tools.retain(|t: &Tool| seen.insert(t.name.clone()));
        tools.reverse();

        let slugs = tools.iter().map(|t| t.name.clone()).collect();
        let mut cache = self.cache.write().expect("cache lock poisoned");
        cache.tools = tools;
        cache.slugs = slugs;
        cache.refreshed_at = Some(Instant::now());

        info!(
            "Adapter {}: derived {} function tools from {} descriptor document(s)",
            self.descriptor.id,
            cache.tools.len(),
            self.descriptor.descriptor_paths.len()
        );
    }
}

/// Parses function slugs and input hints out of one markdown document.
///
/// Every level-2/3 heading that looks like a function slug becomes a
/// tool. The first paragraph after the heading is the description; a
/// fenced ```json block before the next heading, when it parses as a
/// schema, becomes the input schema.
pub fn parse_function_descriptors(markdown: &str) -> Vec<Tool> {
    let mut tools = Vec::new();
    let headings: Vec<_> = HEADING.captures_iter(markdown).collect();

    for (index, capture) in headings.iter().enumerate() {
        let slug = capture.get(1).expect("capture group 1 exists").as_str().to_string();
        let section_start = capture.get(0).expect("whole match exists").end();
        let section_end = headings
            .get(index + 1)
            .map(|next| next.get(0).expect("whole match exists").start())
            .unwrap_or(markdown.len());
        let section = &markdown[section_start..section_end];

        let description = section
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('`') && !line.starts_with('#'))
            .unwrap_or_default()
            .to_string();

        let input_schema = JSON_FENCE
            .captures(section)
            .and_then(|c| serde_json::from_str::<InputSchema>(c.get(1)?.as_str()).ok())
            .unwrap_or_default();

        tools.push(Tool { name: slug, description, input_schema });
    }

    tools
}

#[async_trait]
impl Adapter for SupabaseAdapter {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn display_name(&self) -> &str {
        self.descriptor.display_name()
    }

    fn version(&self) -> &str {
        &self.descriptor.version
    }

    fn category(&self) -> Option<&str> {
        self.descriptor.category.as_deref()
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        if !self.cache_is_fresh() {
            self.refresh_from_descriptors();
        }
        Ok(())
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.cache.read().expect("cache lock poisoned").tools.clone()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let known = self.cache.read().expect("cache lock poisoned").slugs.contains(name);
        if !known {
            return Err(GatewayError::FunctionNotFound { function: name.to_string() });
        }

        self.stats.record_call();

        let endpoint = Endpoint::new(reqwest::Method::POST, format!("/functions/v1/{}", name));
        let mut opts = RequestOptions { body: Some(args), ..Default::default() };
        // The caller's identity travels with the call; the anon apikey is
        // injected by the client's configured auth scheme.
        if let Some(bearer) = ctx.bearer_header() {
            opts.headers.push(("authorization".to_string(), bearer));
        }
        if let Some(scope) = &ctx.project_scope {
            opts.headers.push(("x-project-scope".to_string(), scope.clone()));
        }

        let result = self.client.request(&endpoint, opts, ctx).await;
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    async fn health_check(&self) -> AdapterHealth {
        let cache = self.cache.read().expect("cache lock poisoned");
        let healthy = cache.refreshed_at.is_some();
        AdapterHealth {
            adapter: self.descriptor.id.clone(),
            healthy,
            detail: if healthy {
                Some(format!("{} functions", cache.tools.len()))
            } else {
                Some("descriptors not yet parsed".to_string())
            },
        }
    }

    fn stats(&self) -> AdapterStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::http_client::AuthScheme;
    use serde_json::json;

    const DESCRIPTOR_DOC: &str = r#"
# Edge Functions

## ai-chat

Routes a chat message to the configured model.

```json
{
  "type": "object",
  "properties": {
    "message": { "type": "string" }
  },
  "required": ["message"]
}
```

## memory-create

Stores a memory entry for the caller's project.

### memory-search

Searches stored memories.

Some trailing prose that is not a function.
"#;

    #[test]
    fn parses_slugs_descriptions_and_schemas() {
        let tools = parse_function_descriptors(DESCRIPTOR_DOC);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ai-chat", "memory-create", "memory-search"]);

        let chat = &tools[0];
        assert_eq!(chat.description, "Routes a chat message to the configured model.");
        assert_eq!(chat.input_schema.required, vec!["message"]);

        // Section without a fence gets an empty schema.
        assert!(tools[1].input_schema.properties.is_empty());
    }

    fn adapter_with_doc(doc: &str) -> (tempfile::TempDir, SupabaseAdapter) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.md");
        std::fs::write(&path, doc).unwrap();

        let descriptor: AdapterDescriptor = serde_json::from_value(json!({
            "id": "lanonasis",
            "type": "supabase",
            "descriptor_paths": [path.to_str().unwrap()],
        }))
        .unwrap();
        let client =
            HttpClient::new("lanonasis", "https://project.supabase.co", AuthScheme::None, 30);
        (dir, SupabaseAdapter::new(descriptor, client))
    }

    #[tokio::test]
    async fn initialize_derives_tools_from_documents() {
        let (_dir, adapter) = adapter_with_doc(DESCRIPTOR_DOC);
        assert!(adapter.list_tools().is_empty());

        adapter.initialize().await.unwrap();
        assert_eq!(adapter.list_tools().len(), 3);

        // Fresh cache short-circuits the re-parse.
        adapter.initialize().await.unwrap();
        assert_eq!(adapter.list_tools().len(), 3);
    }

    #[tokio::test]
    async fn unknown_slug_is_function_not_found() {
        let (_dir, adapter) = adapter_with_doc(DESCRIPTOR_DOC);
        adapter.initialize().await.unwrap();

        let ctx = RequestContext::default();
        let err = adapter.call_tool("nonexistent-fn", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::FunctionNotFound { .. }));
        assert_eq!(err.code(), "FUNCTION_NOT_FOUND");
    }
}
