use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A named operation exposed by an adapter.
///
/// Tools are the unit of execution across the gateway: the registry
/// addresses them as `${adapterId}:${toolName}`, the JSON-RPC surface
/// enumerates them in full mode, and the abstraction layer resolves
/// category operations down to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name within the owning adapter.
    pub name: String,

    /// Human-readable description, surfaced through discovery.
    #[serde(default)]
    pub description: String,

    /// Input contract for the tool's arguments.
    #[serde(default)]
    pub input_schema: InputSchema,
}

impl Tool {
    /// Registry key for this tool under the given adapter.
    pub fn scoped_id(&self, adapter_id: &str) -> String {
        format!("{}:{}", adapter_id, self.name)
    }

    /// Wire shape used by `tools/list` responses.
    pub fn to_definition(&self, adapter_id: &str) -> Value {
        serde_json::json!({
            "name": self.scoped_id(adapter_id),
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// The subset of JSON Schema the gateway understands.
///
/// Only `type`, `properties`, `required`, `enum`, `minimum`/`maximum`,
/// `items` and `default` are honored; anything else in a catalog schema
/// is preserved for display but not enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_object_type")]
    pub schema_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

fn default_object_type() -> String {
    "object".to_string()
}

/// Schema for a single declared field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,

    /// Nested object shape, validated recursively.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Filled onto a copy of the input when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Runtime-generated default, for fields like payment references
    /// whose default is minted per call. Code-seeded schemas only; never
    /// part of the wire shape.
    #[serde(skip)]
    pub dynamic_default: Option<DynamicDefault>,
}

/// Defaults that cannot be a static value.
#[derive(Debug, Clone)]
pub enum DynamicDefault {
    /// `<prefix><unix-millis>`, e.g. `ref_1700000000000`.
    Reference { prefix: String },
}

impl DynamicDefault {
    pub fn materialize(&self) -> Value {
        match self {
            DynamicDefault::Reference { prefix } => {
                Value::String(format!("{}{}", prefix, chrono::Utc::now().timestamp_millis()))
            }
        }
    }
}

impl PropertySchema {
    pub fn string() -> Self {
        PropertySchema { schema_type: Some("string".into()), ..Default::default() }
    }

    pub fn number() -> Self {
        PropertySchema { schema_type: Some("number".into()), ..Default::default() }
    }

    pub fn boolean() -> Self {
        PropertySchema { schema_type: Some("boolean".into()), ..Default::default() }
    }

    pub fn described(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Checks one value against this field's primitive type.
    pub fn matches_type(&self, value: &Value) -> bool {
        match self.schema_type.as_deref() {
            Some("string") => value.is_string(),
            Some("number") => value.is_number(),
            Some("integer") => value.is_i64() || value.is_u64(),
            Some("boolean") => value.is_boolean(),
            Some("array") => value.is_array(),
            Some("object") => value.is_object(),
            // Untyped fields accept anything.
            _ => true,
        }
    }
}

impl InputSchema {
    /// Convenience constructor for the declarative schemas seeded at startup.
    pub fn object(
        properties: Vec<(&str, PropertySchema)>,
        required: Vec<&str>,
    ) -> Self {
        InputSchema {
            schema_type: "object".into(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_id_uses_colon() {
        let tool = Tool {
            name: "initialize-transaction".into(),
            description: "Start a charge".into(),
            input_schema: InputSchema::default(),
        };
        assert_eq!(tool.scoped_id("paystack"), "paystack:initialize-transaction");
    }

    #[test]
    fn property_type_matching() {
        assert!(PropertySchema::string().matches_type(&json!("x")));
        assert!(!PropertySchema::string().matches_type(&json!(1)));
        assert!(PropertySchema::number().matches_type(&json!(1.5)));
        assert!(PropertySchema::default().matches_type(&json!({"any": true})));
    }

    #[test]
    fn schema_round_trips_through_serde() {
        let schema = InputSchema::object(
            vec![
                ("amount", PropertySchema::number()),
                ("email", PropertySchema::string()),
            ],
            vec!["amount", "email"],
        );
        let raw = serde_json::to_value(&schema).unwrap();
        assert_eq!(raw["type"], "object");
        assert_eq!(raw["required"], json!(["amount", "email"]));
        let back: InputSchema = serde_json::from_value(raw).unwrap();
        assert_eq!(back.properties.len(), 2);
    }
}
