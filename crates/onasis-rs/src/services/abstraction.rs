//! Vendor Abstraction Layer.
//!
//! Translates a vendor-neutral `(category, operation, input, preference)`
//! call into a concrete `adapterId:toolName` invocation: validate the
//! input against the category's client schema, pick a vendor, run the
//! vendor's transform, and hand the result to the adapter registry.
//!
//! The mapping table is seeded once at startup and treated as immutable
//! afterwards. Transforms are pure: configuration is captured at seed
//! time and no transform performs I/O.

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::tool::{InputSchema, PropertySchema};
use crate::services::registry::AdapterRegistry;

use chrono::Utc;
use log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Pure input rewrite from canonical shape to vendor payload.
pub type Transform = Arc<dyn Fn(&Value) -> Result<Value, GatewayError> + Send + Sync>;

/// How one vendor serves one operation.
#[derive(Clone)]
pub struct OperationMapping {
    /// Tool name within the vendor's adapter.
    pub tool: String,
    pub transform: Transform,
}

/// One vendor registered under a category.
#[derive(Clone)]
pub struct VendorEntry {
    /// Adapter id the vendor's tools live under.
    pub adapter: String,
    pub mappings: HashMap<String, OperationMapping>,
}

/// Canonical client contract for one operation.
#[derive(Clone)]
pub struct OperationSpec {
    pub description: String,
    pub schema: InputSchema,
}

/// A capability category (`payment`, `banking`, ...) served by one or
/// more vendors. The first vendor in insertion order is the default.
#[derive(Clone, Default)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub operations: HashMap<String, OperationSpec>,
    pub vendors: Vec<(String, VendorEntry)>,
}

impl Category {
    pub fn new(name: &str, description: &str) -> Self {
        Category {
            name: name.to_string(),
            description: description.to_string(),
            operations: HashMap::new(),
            vendors: Vec::new(),
        }
    }

    pub fn operation(mut self, name: &str, description: &str, schema: InputSchema) -> Self {
        self.operations
            .insert(name.to_string(), OperationSpec { description: description.to_string(), schema });
        self
    }

    /// Registers a vendor with its `(operation, tool, transform)` rows.
    /// Registration order is the selection policy.
    pub fn vendor(
        mut self,
        vendor_id: &str,
        adapter: &str,
        mappings: Vec<(&str, &str, Transform)>,
    ) -> Self {
        let entry = VendorEntry {
            adapter: adapter.to_string(),
            mappings: mappings
                .into_iter()
                .map(|(op, tool, transform)| {
                    (op.to_string(), OperationMapping { tool: tool.to_string(), transform })
                })
                .collect(),
        };
        self.vendors.push((vendor_id.to_string(), entry));
        self
    }

    fn vendor_entry(&self, vendor: &str) -> Option<&VendorEntry> {
        self.vendors.iter().find(|(id, _)| id == vendor).map(|(_, e)| e)
    }

    /// Vendors that actually serve the given operation.
    pub fn vendors_for(&self, operation: &str) -> Vec<&str> {
        self.vendors
            .iter()
            .filter(|(_, entry)| entry.mappings.contains_key(operation))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Validates `input` against `schema`, returning a validated copy.
///
/// The caller's value is never mutated; defaults are filled onto the
/// copy only. Validation covers required fields, primitive types, enums,
/// numeric bounds, array element types (with recursive object-item
/// required checks), and nested object shapes.
pub fn validate_input(schema: &InputSchema, input: &Value) -> Result<Value, GatewayError> {
    if !input.is_object() {
        return Err(GatewayError::Validation {
            message: "input must be a JSON object".to_string(),
            field: None,
        });
    }

    let mut copy = input.clone();

    for (field, prop) in &schema.properties {
        let present = input.get(field).map(|v| !v.is_null()).unwrap_or(false);

        if !present {
            if schema.required.iter().any(|r| r == field) {
                return Err(GatewayError::Validation {
                    message: format!("missing required field '{}'", field),
                    field: Some(field.clone()),
                });
            }
            if let Some(default) = &prop.default {
                copy[field.as_str()] = default.clone();
            } else if let Some(dynamic) = &prop.dynamic_default {
                copy[field.as_str()] = dynamic.materialize();
            }
            continue;
        }

        let value = &input[field.as_str()];
        validate_field(field, prop, value)?;
    }

    Ok(copy)
}

fn validate_field(field: &str, prop: &PropertySchema, value: &Value) -> Result<(), GatewayError> {
    if !prop.matches_type(value) {
        return Err(GatewayError::Validation {
            message: format!(
                "field '{}' must be of type {}",
                field,
                prop.schema_type.as_deref().unwrap_or("any")
            ),
            field: Some(field.to_string()),
        });
    }

    if let Some(allowed) = &prop.enum_values {
        if !allowed.contains(value) {
            return Err(GatewayError::Validation {
                message: format!("field '{}' must be one of the allowed values", field),
                field: Some(field.to_string()),
            });
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = prop.minimum {
            if n < min {
                return Err(GatewayError::Validation {
                    message: format!("field '{}' must be >= {}", field, min),
                    field: Some(field.to_string()),
                });
            }
        }
        if let Some(max) = prop.maximum {
            if n > max {
                return Err(GatewayError::Validation {
                    message: format!("field '{}' must be <= {}", field, max),
                    field: Some(field.to_string()),
                });
            }
        }
    }

    if let (Some(items), Some(elements)) = (&prop.items, value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            let label = format!("{}[{}]", field, index);
            validate_field(&label, items, element)?;
            // Object items additionally enforce their own required list.
            if let Some(map) = element.as_object() {
                for required in &items.required {
                    if !map.contains_key(required) {
                        return Err(GatewayError::Validation {
                            message: format!("'{}' is missing required field '{}'", label, required),
                            field: Some(label.clone()),
                        });
                    }
                }
            }
        }
    }

    if let Some(map) = value.as_object() {
        for required in &prop.required {
            if !map.contains_key(required) {
                return Err(GatewayError::Validation {
                    message: format!("field '{}' is missing required member '{}'", field, required),
                    field: Some(field.to_string()),
                });
            }
        }
        for (name, nested) in &prop.properties {
            if let Some(inner) = map.get(name) {
                validate_field(&format!("{}.{}", field, name), nested, inner)?;
            }
        }
    }

    Ok(())
}

/// The VAL itself: the seeded category table plus a late-bound registry
/// reference.
pub struct AbstractionLayer {
    categories: HashMap<String, Category>,
    order: Vec<String>,
    registry: Arc<AdapterRegistry>,
}

impl AbstractionLayer {
    pub fn new(categories: Vec<Category>, registry: Arc<AdapterRegistry>) -> Self {
        let order = categories.iter().map(|c| c.name.clone()).collect();
        let categories = categories.into_iter().map(|c| (c.name.clone(), c)).collect();
        AbstractionLayer { categories, order, registry }
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn category_names(&self) -> &[String] {
        &self.order
    }

    /// Adapters referenced by mappings that are not registered; must be
    /// empty after a healthy warm-up.
    pub fn unmapped_adapters(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .categories
            .values()
            .flat_map(|c| c.vendors.iter().map(|(_, entry)| entry.adapter.clone()))
            .filter(|adapter| self.registry.get(adapter).is_none())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// The eight-step abstracted call protocol.
    pub async fn execute_abstracted_call(
        &self,
        category: &str,
        operation: &str,
        input: &Value,
        vendor_preference: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let cat = self
            .categories
            .get(category)
            .ok_or_else(|| GatewayError::UnknownCategory { category: category.to_string() })?;

        let spec = cat.operations.get(operation).ok_or_else(|| GatewayError::UnknownOperation {
            category: category.to_string(),
            operation: operation.to_string(),
        })?;

        let validated = validate_input(&spec.schema, input)?;

        if cat.vendors.is_empty() {
            return Err(GatewayError::NoVendors { category: category.to_string() });
        }
        let vendor = match vendor_preference {
            Some(preferred) if cat.vendor_entry(preferred).is_some() => preferred,
            // Unknown preference falls back to the default rather than
            // failing: the caller asked for a capability, not a contract
            // with one vendor.
            _ => cat.vendors[0].0.as_str(),
        };
        let entry = cat.vendor_entry(vendor).expect("selected vendor exists");

        let mapping = entry.mappings.get(operation).ok_or_else(|| {
            GatewayError::OperationNotSupported {
                vendor: vendor.to_string(),
                operation: operation.to_string(),
            }
        })?;

        let payload = (mapping.transform)(&validated)?;
        debug!(
            "abstracted call {}/{} -> {}:{} (request {})",
            category, operation, entry.adapter, mapping.tool, ctx.request_id
        );

        let tool_id = format!("{}:{}", entry.adapter, mapping.tool);
        let data = self.registry.call_tool(&tool_id, payload, ctx).await?;

        Ok(json!({
            "success": true,
            "data": data,
            "metadata": {
                "category": category,
                "operation": operation,
                "vendor": vendor,
                "timestamp": Utc::now().to_rfc3339(),
                "abstracted": true,
            }
        }))
    }

    /// Schema and vendors for one operation, as served by
    /// `gateway-describe`.
    pub fn describe(&self, category: &str, operation: &str) -> Result<Value, GatewayError> {
        let cat = self
            .categories
            .get(category)
            .ok_or_else(|| GatewayError::UnknownCategory { category: category.to_string() })?;
        let spec = cat.operations.get(operation).ok_or_else(|| GatewayError::UnknownOperation {
            category: category.to_string(),
            operation: operation.to_string(),
        })?;

        Ok(json!({
            "category": category,
            "operation": operation,
            "description": spec.description,
            "schema": spec.schema,
            "vendors": cat.vendors_for(operation),
        }))
    }

    /// Category overview for `gateway-list-categories`.
    pub fn list_categories(&self) -> Value {
        let entries: Vec<Value> = self
            .order
            .iter()
            .filter_map(|name| self.categories.get(name))
            .map(|cat| {
                let mut operations: Vec<&str> =
                    cat.operations.keys().map(String::as_str).collect();
                operations.sort_unstable();
                json!({
                    "category": cat.name,
                    "description": cat.description,
                    "operations": operations,
                    "defaultVendor": cat.vendors.first().map(|(id, _)| id.as_str()),
                    "vendors": cat.vendors.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        json!({ "categories": entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::InputSchema;

    fn schema() -> InputSchema {
        InputSchema::object(
            vec![
                ("amount", PropertySchema::number()),
                ("email", PropertySchema::string()),
                ("currency", PropertySchema::string().with_default(json!("NGN"))),
            ],
            vec!["amount", "email"],
        )
    }

    #[test]
    fn validation_fills_defaults_without_mutating_input() {
        let input = json!({"amount": 5000, "email": "a@b.co"});
        let before = input.clone();

        let validated = validate_input(&schema(), &input).unwrap();
        assert_eq!(validated["currency"], "NGN");
        assert_eq!(input, before);
        assert!(input.get("currency").is_none());
    }

    #[test]
    fn validation_is_idempotent_over_defaults() {
        let input = json!({"amount": 5000, "email": "a@b.co"});
        let once = validate_input(&schema(), &input).unwrap();
        let twice = validate_input(&schema(), &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = validate_input(&schema(), &json!({"email": "a@b.co"})).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn type_mismatch_fails() {
        let err =
            validate_input(&schema(), &json!({"amount": "5000", "email": "a@b.co"})).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn enum_and_bounds_are_enforced() {
        let schema = InputSchema::object(
            vec![
                (
                    "kind",
                    PropertySchema {
                        schema_type: Some("string".into()),
                        enum_values: Some(vec![json!("bvn"), json!("nin")]),
                        ..Default::default()
                    },
                ),
                (
                    "count",
                    PropertySchema {
                        schema_type: Some("integer".into()),
                        minimum: Some(1.0),
                        maximum: Some(10.0),
                        ..Default::default()
                    },
                ),
            ],
            vec!["kind"],
        );

        assert!(validate_input(&schema, &json!({"kind": "bvn", "count": 5})).is_ok());
        assert!(validate_input(&schema, &json!({"kind": "passport"})).is_err());
        assert!(validate_input(&schema, &json!({"kind": "nin", "count": 0})).is_err());
        assert!(validate_input(&schema, &json!({"kind": "nin", "count": 11})).is_err());
    }

    #[test]
    fn array_items_are_validated_recursively() {
        let schema = InputSchema::object(
            vec![(
                "recipients",
                PropertySchema {
                    schema_type: Some("array".into()),
                    items: Some(Box::new(PropertySchema {
                        schema_type: Some("object".into()),
                        required: vec!["account".into()],
                        ..Default::default()
                    })),
                    ..Default::default()
                },
            )],
            vec!["recipients"],
        );

        assert!(validate_input(&schema, &json!({"recipients": [{"account": "1"}]})).is_ok());
        let err =
            validate_input(&schema, &json!({"recipients": [{"name": "no account"}]})).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
        let err = validate_input(&schema, &json!({"recipients": ["bare-string"]})).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn vendors_for_reflects_mappings() {
        let noop: Transform = Arc::new(|v| Ok(v.clone()));
        let category = Category::new("payment", "Payments")
            .operation("init", "Start", InputSchema::default())
            .operation("verify", "Check", InputSchema::default())
            .vendor("paystack", "paystack", vec![("init", "a", noop.clone()), ("verify", "b", noop.clone())])
            .vendor("flutterwave", "flutterwave", vec![("init", "c", noop)]);

        assert_eq!(category.vendors_for("init"), vec!["paystack", "flutterwave"]);
        assert_eq!(category.vendors_for("verify"), vec!["paystack"]);
    }
}
