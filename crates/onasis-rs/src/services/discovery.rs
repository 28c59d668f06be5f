//! Discovery layer: the five lazy-mode meta-tools.
//!
//! In lazy mode the JSON-RPC catalog collapses from every adapter tool
//! (~1,600 entries) to exactly five meta-tools that perform discovery and
//! indirection. This is the contract agent clients build against; the
//! full enumeration exists only for callers that opt into full mode.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::services::abstraction::AbstractionLayer;
use crate::services::registry::AdapterRegistry;

use serde_json::{json, Value};
use std::sync::Arc;

/// Names any meta-tool call must start with.
pub const META_TOOL_PREFIX: &str = "gateway-";

pub const INTENT: &str = "gateway-intent";
pub const LIST_CATEGORIES: &str = "gateway-list-categories";
pub const DESCRIBE: &str = "gateway-describe";
pub const EXECUTE: &str = "gateway-execute";
pub const HEALTH: &str = "gateway-health";

/// Guidance returned when a caller addresses a concrete tool in lazy mode.
pub const LAZY_GUIDANCE: &str = "This gateway runs in lazy discovery mode. Use gateway-intent to \
     find the right category and operation, then gateway-execute to run it.";

pub struct DiscoveryService {
    val: Arc<AbstractionLayer>,
    registry: Arc<AdapterRegistry>,
}

impl DiscoveryService {
    pub fn new(val: Arc<AbstractionLayer>, registry: Arc<AdapterRegistry>) -> Self {
        DiscoveryService { val, registry }
    }

    /// The complete lazy-mode tool list, in stable order.
    pub fn meta_tools() -> Vec<Value> {
        vec![
            json!({
                "name": INTENT,
                "description": "Rank gateway capabilities against a free-form description of what you want to do.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "description": { "type": "string", "description": "What you are trying to accomplish" }
                    },
                    "required": ["description"]
                }
            }),
            json!({
                "name": LIST_CATEGORIES,
                "description": "Enumerate capability categories with their operations and default vendors.",
                "inputSchema": { "type": "object", "properties": {} }
            }),
            json!({
                "name": DESCRIBE,
                "description": "Return the client schema and available vendors for one operation.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "category": { "type": "string" },
                        "operation": { "type": "string" }
                    },
                    "required": ["category", "operation"]
                }
            }),
            json!({
                "name": EXECUTE,
                "description": "Execute an abstracted call by category and operation.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "category": { "type": "string" },
                        "operation": { "type": "string" },
                        "input": { "type": "object" },
                        "vendor": { "type": "string", "description": "Pin a specific vendor" }
                    },
                    "required": ["category", "operation"]
                }
            }),
            json!({
                "name": HEALTH,
                "description": "Aggregate health of all registered adapters.",
                "inputSchema": { "type": "object", "properties": {} }
            }),
        ]
    }

    /// Dispatches one meta-tool call.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        match name {
            INTENT => {
                let description = args["description"].as_str().unwrap_or_default();
                if description.trim().is_empty() {
                    return Err(GatewayError::Validation {
                        message: "missing required field 'description'".into(),
                        field: Some("description".into()),
                    });
                }
                Ok(self.rank_intent(description))
            }
            LIST_CATEGORIES => Ok(self.val.list_categories()),
            DESCRIBE => {
                let category = required_str(args, "category")?;
                let operation = required_str(args, "operation")?;
                self.val.describe(category, operation)
            }
            EXECUTE => {
                let category = required_str(args, "category")?;
                let operation = required_str(args, "operation")?;
                let input = args.get("input").cloned().unwrap_or_else(|| json!({}));
                let vendor = args["vendor"].as_str();
                self.registry.ensure_ready().await?;
                self.val.execute_abstracted_call(category, operation, &input, vendor, ctx).await
            }
            HEALTH => {
                let health = self.registry.aggregate_health().await;
                let healthy = health.iter().all(|h| h.healthy);
                Ok(json!({
                    "healthy": healthy,
                    "adapters": health,
                    "stats": self.registry.get_stats(),
                }))
            }
            other => Err(GatewayError::ToolNotFound { tool: other.to_string() }),
        }
    }

    /// Lexical intent scoring: token overlap between the description and
    /// each category's name, description, and operation names. Simple by
    /// design; the contract is a ranked list with scores, not semantics.
    fn rank_intent(&self, description: &str) -> Value {
        let tokens = tokenize(description);
        let mut matches: Vec<Value> = Vec::new();

        for name in self.val.category_names() {
            let category = match self.val.category(name) {
                Some(c) => c,
                None => continue,
            };

            let mut category_words = tokenize(&category.name);
            category_words.extend(tokenize(&category.description));
            let category_score =
                tokens.iter().filter(|t| category_words.contains(t)).count() as f64;

            let mut best_operation: Option<(&str, f64)> = None;
            for operation in category.operations.keys() {
                let op_words = tokenize(operation);
                let op_score = tokens.iter().filter(|t| op_words.contains(t)).count() as f64;
                if op_score > best_operation.map(|(_, s)| s).unwrap_or(0.0) {
                    best_operation = Some((operation, op_score));
                }
            }

            let score = category_score + best_operation.map(|(_, s)| s * 2.0).unwrap_or(0.0);
            if score > 0.0 {
                matches.push(json!({
                    "category": category.name,
                    "operation": best_operation.map(|(op, _)| op),
                    "score": score,
                }));
            }
        }

        matches.sort_by(|a, b| {
            b["score"].as_f64().partial_cmp(&a["score"].as_f64()).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(5);

        json!({
            "matches": matches,
            "hint": if matches.is_empty() {
                Some("No category matched; call gateway-list-categories for the full set.")
            } else {
                None
            },
        })
    }
}

fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, GatewayError> {
    args[field].as_str().filter(|s| !s.is_empty()).ok_or_else(|| GatewayError::Validation {
        message: format!("missing required field '{}'", field),
        field: Some(field.to_string()),
    })
}

/// Lowercase word split across whitespace, punctuation, and camelCase
/// boundaries.
fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            current.extend(ch.to_lowercase());
        } else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::AdapterRegistry;
    use crate::services::vendors::{seed_categories, VendorSeedConfig};

    fn discovery() -> DiscoveryService {
        let registry = Arc::new(AdapterRegistry::new());
        registry.mark_ready();
        let val = Arc::new(AbstractionLayer::new(
            seed_categories(&VendorSeedConfig::default()),
            registry.clone(),
        ));
        DiscoveryService::new(val, registry)
    }

    #[test]
    fn exactly_five_meta_tools() {
        let tools = DiscoveryService::meta_tools();
        assert_eq!(tools.len(), 5);
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![INTENT, LIST_CATEGORIES, DESCRIBE, EXECUTE, HEALTH]
        );
        assert!(names.iter().all(|n| n.starts_with(META_TOOL_PREFIX)));
    }

    #[test]
    fn tokenize_splits_camel_case() {
        assert_eq!(tokenize("initializeTransaction"), vec!["initialize", "transaction"]);
        assert_eq!(tokenize("verify a payment!"), vec!["verify", "a", "payment"]);
    }

    #[tokio::test]
    async fn intent_ranks_payment_for_payment_language() {
        let discovery = discovery();
        let ctx = RequestContext::default();
        let result = discovery
            .dispatch(INTENT, &json!({"description": "initialize a payment transaction"}), &ctx)
            .await
            .unwrap();

        let matches = result["matches"].as_array().unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0]["category"], "payment");
        assert_eq!(matches[0]["operation"], "initializeTransaction");
        assert!(matches[0]["score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn describe_round_trips_vendor_mappings() {
        let discovery = discovery();
        let ctx = RequestContext::default();
        let described = discovery
            .dispatch(DESCRIBE, &json!({"category": "payment", "operation": "verifyTransaction"}), &ctx)
            .await
            .unwrap();

        let vendors = described["vendors"].as_array().unwrap();
        assert!(vendors.contains(&json!("paystack")));
        assert!(vendors.contains(&json!("flutterwave")));
    }

    #[tokio::test]
    async fn unknown_meta_tool_is_not_found() {
        let discovery = discovery();
        let ctx = RequestContext::default();
        let err = discovery.dispatch("gateway-destroy", &json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn intent_requires_a_description() {
        let discovery = discovery();
        let ctx = RequestContext::default();
        let err = discovery.dispatch(INTENT, &json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }
}
