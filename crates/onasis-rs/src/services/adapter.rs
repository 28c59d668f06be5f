//! Adapter lifecycle and the uniform execution surface.
//!
//! An adapter fronts one upstream vendor and exposes a fixed set of
//! tools. Real adapters are data-driven: a catalog descriptor supplies
//! the tool table and endpoints, and a [`HttpClient`] does the talking.
//! Mock adapters exist for discovery only and fail every execution.

use crate::models::catalog::AdapterDescriptor;
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::tool::Tool;
use crate::services::http_client::{Endpoint, HttpClient, RequestOptions};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

/// Result of an adapter health probe.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterHealth {
    pub adapter: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Point-in-time view of an adapter's call counters.
///
/// Counters are relaxed atomics: concurrent calls may observe each
/// other's updates in any interleaving, so these are monotonic
/// approximations, not transactional truth.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdapterStatsSnapshot {
    pub calls: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct AdapterStats {
    calls: AtomicU64,
    errors: AtomicU64,
    last_call_ts: AtomicI64,
}

impl AdapterStats {
    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.last_call_ts.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdapterStatsSnapshot {
        let ts = self.last_call_ts.load(Ordering::Relaxed);
        AdapterStatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_call: (ts > 0).then(|| DateTime::<Utc>::from_timestamp(ts, 0)).flatten(),
        }
    }
}

/// Uniform execution surface over one upstream vendor.
///
/// Lifecycle is `constructed` → `initialized`; adapters are never
/// demoted. Replacing one means registering a new instance.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable identifier, e.g. `paystack`.
    fn id(&self) -> &str;

    fn display_name(&self) -> &str {
        self.id()
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn category(&self) -> Option<&str> {
        None
    }

    /// Mock adapters appear in discovery but cannot execute.
    fn is_mock(&self) -> bool {
        false
    }

    /// Populates the tool list, possibly by calling the upstream.
    /// Must be idempotent.
    async fn initialize(&self) -> Result<(), GatewayError>;

    fn list_tools(&self) -> Vec<Tool>;

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError>;

    /// Adapter-defined probe; healthy unless the adapter says otherwise.
    async fn health_check(&self) -> AdapterHealth {
        AdapterHealth { adapter: self.id().to_string(), healthy: true, detail: None }
    }

    fn stats(&self) -> AdapterStatsSnapshot {
        AdapterStatsSnapshot::default()
    }
}

/// Catalog-driven adapter over a [`HttpClient`].
pub struct HttpAdapter {
    descriptor: AdapterDescriptor,
    client: HttpClient,
    tools: RwLock<Vec<Tool>>,
    endpoints: RwLock<HashMap<String, Endpoint>>,
    initialized: AtomicBool,
    stats: AdapterStats,
}

impl HttpAdapter {
    pub fn new(descriptor: AdapterDescriptor, client: HttpClient) -> Self {
        HttpAdapter {
            descriptor,
            client,
            tools: RwLock::new(Vec::new()),
            endpoints: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            stats: AdapterStats::default(),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
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
        let tools: Vec<Tool> = self.descriptor.tools.iter().map(|t| t.to_tool()).collect();
        let endpoints: HashMap<String, Endpoint> = self
            .descriptor
            .tools
            .iter()
            .map(|t| {
                (t.name.clone(), Endpoint::new(Endpoint::parse_method(&t.method), t.path.clone()))
            })
            .collect();

        *self.tools.write().expect("tools lock poisoned") = tools;
        *self.endpoints.write().expect("endpoints lock poisoned") = endpoints;
        self.initialized.store(true, Ordering::Release);

        info!(
            "Adapter {} initialized with {} tools",
            self.descriptor.id,
            self.descriptor.tools.len()
        );
        Ok(())
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tools.read().expect("tools lock poisoned").clone()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let endpoint = {
            let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
            endpoints.get(name).cloned()
        }
        .ok_or_else(|| GatewayError::ToolNotFound {
            tool: format!("{}:{}", self.descriptor.id, name),
        })?;

        self.stats.record_call();

        let mut opts = RequestOptions::default();
        if endpoint.method == reqwest::Method::GET {
            // GET endpoints take their arguments as query parameters.
            if let Value::Object(map) = &args {
                for (key, value) in map {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    opts.query.push((key.clone(), rendered));
                }
            }
        } else {
            opts.body = Some(args);
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
        let initialized = self.initialized.load(Ordering::Acquire);
        AdapterHealth {
            adapter: self.descriptor.id.clone(),
            healthy: initialized,
            detail: (!initialized).then(|| "not initialized".to_string()),
        }
    }

    fn stats(&self) -> AdapterStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Discovery-only adapter. Appears in listings and tool counts; every
/// execution fails with a dedicated error kind.
pub struct MockAdapter {
    id: String,
    name: String,
    category: Option<String>,
    tools: Vec<Tool>,
}

impl MockAdapter {
    pub fn new(descriptor: &AdapterDescriptor) -> Self {
        let count = descriptor.tool_count.unwrap_or(0);
        let tools = (1..=count)
            .map(|i| Tool {
                name: format!("{}-tool-{}", descriptor.id, i),
                description: format!("{} operation {} (registered, not yet executable)",
                    descriptor.display_name(), i),
                input_schema: Default::default(),
            })
            .collect();
        MockAdapter {
            id: descriptor.id.clone(),
            name: descriptor.display_name().to_string(),
            category: descriptor.category.clone(),
            tools,
        }
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn is_mock(&self) -> bool {
        true
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    async fn call_tool(
        &self,
        _name: &str,
        _args: Value,
        _ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        Err(GatewayError::AdapterNotExecutable { adapter: self.id.clone() })
    }
}
