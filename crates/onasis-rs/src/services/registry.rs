//! Adapter registry: the single point of adapter lookup and execution.
//!
//! Registration happens during warm-up; afterwards the registry is
//! read-mostly. A registered adapter is immutable from the registry's
//! perspective — replacing one means registering a new instance under the
//! same id.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::services::adapter::{Adapter, AdapterHealth, AdapterStatsSnapshot, MockAdapter};
use crate::models::catalog::AdapterDescriptor;

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Skip calling `initialize()`; the caller already did, or will.
    pub skip_initialize: bool,
}

/// Registry-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub adapters: usize,
    pub real: usize,
    pub mock: usize,
    pub tools: usize,
}

/// Per-adapter listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub mock: bool,
    pub tools: usize,
    pub stats: AdapterStatsSnapshot,
}

// How long a handler will wait on the warm-up gate before giving up.
const READY_WAIT: Duration = Duration::from_secs(10);

pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
    /// Registration order, for stable listings.
    order: RwLock<Vec<String>>,
    ready_tx: watch::Sender<bool>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        AdapterRegistry {
            adapters: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            ready_tx,
        }
    }

    /// Adds an adapter, initializing it unless skipped. A duplicate id
    /// replaces the previous instance with a warning.
    pub async fn register(
        &self,
        adapter: Arc<dyn Adapter>,
        opts: RegisterOptions,
    ) -> Result<(), GatewayError> {
        if !opts.skip_initialize {
            adapter.initialize().await?;
        }

        let id = adapter.id().to_string();
        let replaced = {
            let mut adapters = self.adapters.write().expect("registry lock poisoned");
            let mut order = self.order.write().expect("registry order lock poisoned");
            let replaced = adapters.insert(id.clone(), adapter).is_some();
            if !replaced {
                order.push(id.clone());
            }
            replaced
        };

        if replaced {
            warn!("Adapter {} re-registered, previous instance replaced", id);
        } else {
            info!("Adapter {} registered", id);
        }
        Ok(())
    }

    /// Adds a discovery-only adapter from its catalog descriptor.
    pub async fn register_mock(&self, descriptor: &AdapterDescriptor) -> Result<(), GatewayError> {
        self.register(Arc::new(MockAdapter::new(descriptor)), RegisterOptions::default()).await
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.read().expect("registry lock poisoned").get(id).cloned()
    }

    /// Executes `adapterId:toolName`.
    ///
    /// The id is split on the first `:` so tool names may themselves
    /// contain colons. Mocks fail before tool lookup: they are not
    /// executable even when the tool name exists.
    pub async fn call_tool(
        &self,
        tool_id: &str,
        input: Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let (adapter_id, tool_name) = tool_id
            .split_once(':')
            .ok_or_else(|| GatewayError::ToolNotFound { tool: tool_id.to_string() })?;

        let adapter = self
            .get(adapter_id)
            .ok_or_else(|| GatewayError::ToolNotFound { tool: tool_id.to_string() })?;

        if adapter.is_mock() {
            return Err(GatewayError::AdapterNotExecutable { adapter: adapter_id.to_string() });
        }

        adapter.call_tool(tool_name, input, ctx).await
    }

    /// All adapters in registration order.
    pub fn list_adapters(&self) -> Vec<AdapterSummary> {
        let adapters = self.adapters.read().expect("registry lock poisoned");
        let order = self.order.read().expect("registry order lock poisoned");
        order
            .iter()
            .filter_map(|id| adapters.get(id))
            .map(|a| AdapterSummary {
                id: a.id().to_string(),
                name: a.display_name().to_string(),
                version: a.version().to_string(),
                category: a.category().map(str::to_string),
                mock: a.is_mock(),
                tools: a.list_tools().len(),
                stats: a.stats(),
            })
            .collect()
    }

    /// Every tool as a `tools/list` definition, scoped `adapterId:toolName`.
    pub fn list_all_tools(&self) -> Vec<Value> {
        let adapters = self.adapters.read().expect("registry lock poisoned");
        let order = self.order.read().expect("registry order lock poisoned");
        order
            .iter()
            .filter_map(|id| adapters.get(id))
            .flat_map(|a| {
                let id = a.id().to_string();
                a.list_tools().into_iter().map(move |t| t.to_definition(&id))
            })
            .collect()
    }

    pub fn get_stats(&self) -> RegistryStats {
        let adapters = self.adapters.read().expect("registry lock poisoned");
        let mock = adapters.values().filter(|a| a.is_mock()).count();
        let tools = adapters.values().map(|a| a.list_tools().len()).sum();
        RegistryStats { adapters: adapters.len(), real: adapters.len() - mock, mock, tools }
    }

    /// Health probes across all adapters, in registration order.
    pub async fn aggregate_health(&self) -> Vec<AdapterHealth> {
        let adapters: Vec<Arc<dyn Adapter>> = {
            let map = self.adapters.read().expect("registry lock poisoned");
            let order = self.order.read().expect("registry order lock poisoned");
            order.iter().filter_map(|id| map.get(id).cloned()).collect()
        };

        let mut results = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            results.push(adapter.health_check().await);
        }
        results
    }

    /// Releases the warm-up gate. Called once by the composition root
    /// after every adapter's `initialize()` has completed.
    pub fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
        info!("Adapter registry ready: {} adapters", self.order.read().map(|o| o.len()).unwrap_or(0));
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Suspends the caller until warm-up completes.
    ///
    /// Handlers that enumerate or execute tools call this first, so a
    /// request arriving mid-startup waits and then sees the full catalog;
    /// a partial tool list is never observable.
    pub async fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.is_ready() {
            return Ok(());
        }
        let mut rx = self.ready_tx.subscribe();
        tokio::time::timeout(READY_WAIT, rx.wait_for(|ready| *ready))
            .await
            .map_err(|_| GatewayError::RegistryNotReady)?
            .map_err(|_| GatewayError::RegistryNotReady)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::Tool;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn id(&self) -> &str {
            "echo"
        }

        async fn initialize(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "say".into(),
                description: "Echoes back the input".into(),
                input_schema: Default::default(),
            }]
        }

        async fn call_tool(
            &self,
            name: &str,
            args: Value,
            _ctx: &RequestContext,
        ) -> Result<Value, GatewayError> {
            if name != "say" {
                return Err(GatewayError::ToolNotFound { tool: format!("echo:{}", name) });
            }
            Ok(args)
        }
    }

    #[tokio::test]
    async fn register_and_call() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter), RegisterOptions::default()).await.unwrap();

        let ctx = RequestContext::default();
        let result = registry.call_tool("echo:say", json!({"hello": true}), &ctx).await.unwrap();
        assert_eq!(result, json!({"hello": true}));
    }

    #[tokio::test]
    async fn unknown_adapter_and_tool_are_not_found() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter), RegisterOptions::default()).await.unwrap();
        let ctx = RequestContext::default();

        let err = registry.call_tool("ghost:say", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));

        let err = registry.call_tool("echo:missing", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));

        // No separator at all.
        let err = registry.call_tool("echo", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn mock_counts_in_stats_but_rejects_calls() {
        let registry = AdapterRegistry::new();
        let descriptor: AdapterDescriptor =
            serde_json::from_value(json!({ "id": "prembly", "type": "mock", "tool_count": 4 }))
                .unwrap();
        registry.register_mock(&descriptor).await.unwrap();

        let stats = registry.get_stats();
        assert_eq!(stats.adapters, 1);
        assert_eq!(stats.mock, 1);
        assert_eq!(stats.real, 0);
        assert_eq!(stats.tools, 4);

        let ctx = RequestContext::default();
        let err =
            registry.call_tool("prembly:prembly-tool-1", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::AdapterNotExecutable { .. }));
    }

    #[tokio::test]
    async fn duplicate_registration_replaces() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter), RegisterOptions::default()).await.unwrap();
        registry.register(Arc::new(EchoAdapter), RegisterOptions::default()).await.unwrap();
        assert_eq!(registry.get_stats().adapters, 1);
        assert_eq!(registry.list_adapters().len(), 1);
    }

    #[tokio::test]
    async fn ready_gate_releases_waiters() {
        let registry = Arc::new(AdapterRegistry::new());
        assert!(!registry.is_ready());

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.ensure_ready().await })
        };
        registry.mark_ready();
        waiter.await.unwrap().unwrap();
        assert!(registry.is_ready());
    }

    #[tokio::test]
    async fn scoped_tool_listing() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter), RegisterOptions::default()).await.unwrap();
        let tools = registry.list_all_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo:say");
    }
}
