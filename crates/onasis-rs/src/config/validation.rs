//! Catalog and settings validation with detailed error reporting.
//!
//! Validation runs once at startup, before any adapter is constructed.
//! Errors abort the boot; warnings are logged and boot continues.

use crate::models::catalog::{AdapterKind, AuthConfig, ServiceCatalog};
use crate::models::settings::Settings;
use log::{info, warn};
use std::collections::HashSet;

/// Result of configuration validation, categorized by severity.
///
/// # Examples
///
/// ```
/// use onasis_rs::config::validation::ValidationResult;
///
/// let mut result = ValidationResult::new();
/// result.add_error("Missing required field".to_string());
/// result.add_warning("Using default value".to_string());
///
/// assert!(!result.is_valid);
/// assert_eq!(result.errors.len(), 1);
/// assert_eq!(result.warnings.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Critical errors that prevent startup.
    pub errors: Vec<String>,
    /// Non-critical issues worth fixing.
    pub warnings: Vec<String>,
    /// Whether the configuration is usable (no errors).
    pub is_valid: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new(), warnings: Vec::new(), is_valid: true }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator for the startup configuration snapshot.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates settings plus catalog together and logs a summary.
    pub fn validate_comprehensive(settings: &Settings, catalog: &ServiceCatalog) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = settings.validate() {
            result.add_error(e);
        }
        result.merge(Self::validate_catalog(catalog));

        if result.is_valid {
            info!(
                "Configuration validated: {} adapters, {} warnings",
                catalog.adapters.len(),
                result.warnings.len()
            );
            for warning in &result.warnings {
                warn!("config: {}", warning);
            }
        }

        result
    }

    /// Catalog-level checks: identity, executability, auth declarations.
    pub fn validate_catalog(catalog: &ServiceCatalog) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for descriptor in &catalog.adapters {
            let id = descriptor.id.as_str();

            if id.is_empty() {
                result.add_error("Adapter with empty id in catalog".to_string());
                continue;
            }
            if id.contains(':') {
                // ':' is the registry separator between adapter and tool.
                result.add_error(format!("Adapter id '{}' must not contain ':'", id));
            }
            if !seen_ids.insert(id) {
                result.add_error(format!("Duplicate adapter id '{}' in catalog", id));
            }

            match descriptor.kind {
                AdapterKind::Real => {
                    if descriptor.base_url.is_none() {
                        result.add_error(format!("Real adapter '{}' is missing base_url", id));
                    } else if let Some(url) = &descriptor.base_url {
                        if !url.starts_with("http://") && !url.starts_with("https://") {
                            result.add_error(format!(
                                "Adapter '{}' base_url must include a scheme: {}",
                                id, url
                            ));
                        }
                    }
                    if descriptor.tools.is_empty() {
                        result.add_warning(format!(
                            "Real adapter '{}' declares no tools; it will register empty",
                            id
                        ));
                    }
                    let mut tool_names: HashSet<&str> = HashSet::new();
                    for tool in &descriptor.tools {
                        if !tool_names.insert(tool.name.as_str()) {
                            result.add_error(format!(
                                "Adapter '{}' declares duplicate tool '{}'",
                                id, tool.name
                            ));
                        }
                    }
                }
                AdapterKind::Mock => {
                    if descriptor.tool_count.is_none() {
                        result.add_warning(format!(
                            "Mock adapter '{}' has no tool_count; advertising 0 tools",
                            id
                        ));
                    }
                }
                AdapterKind::Supabase => {
                    if descriptor.descriptor_paths.is_empty() {
                        result.add_warning(format!(
                            "Supabase adapter '{}' has no descriptor paths; tool list will be empty until refreshed",
                            id
                        ));
                    }
                }
            }

            if let AuthConfig::Apikey { key, .. } = &descriptor.auth {
                if key.is_empty() {
                    result.add_error(format!("Adapter '{}' apikey auth has an empty key name", id));
                }
            }
        }

        for (name, service) in &catalog.api_services {
            if !service.base_url.starts_with("http://") && !service.base_url.starts_with("https://")
            {
                result.add_error(format!(
                    "API service '{}' base_url must include a scheme: {}",
                    name, service.base_url
                ));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog_from(raw: serde_json::Value) -> ServiceCatalog {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn duplicate_ids_are_errors() {
        let catalog = catalog_from(json!({
            "adapters": [
                { "id": "a", "type": "mock", "tool_count": 1 },
                { "id": "a", "type": "mock", "tool_count": 2 }
            ]
        }));
        let result = ConfigValidator::validate_catalog(&catalog);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("Duplicate adapter id")));
    }

    #[test]
    fn real_adapter_requires_base_url() {
        let catalog = catalog_from(json!({ "adapters": [{ "id": "x", "type": "real" }] }));
        let result = ConfigValidator::validate_catalog(&catalog);
        assert!(!result.is_valid);
    }

    #[test]
    fn colon_in_id_is_rejected() {
        let catalog = catalog_from(json!({
            "adapters": [{ "id": "bad:id", "type": "mock", "tool_count": 1 }]
        }));
        let result = ConfigValidator::validate_catalog(&catalog);
        assert!(!result.is_valid);
    }

    #[test]
    fn mock_without_tool_count_is_only_a_warning() {
        let catalog = catalog_from(json!({ "adapters": [{ "id": "m", "type": "mock" }] }));
        let result = ConfigValidator::validate_catalog(&catalog);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn duplicate_tool_names_within_adapter_rejected() {
        let catalog = catalog_from(json!({
            "adapters": [{
                "id": "p",
                "type": "real",
                "base_url": "https://api.example.com",
                "tools": [
                    { "name": "t", "path": "/a" },
                    { "name": "t", "path": "/b" }
                ]
            }]
        }));
        let result = ConfigValidator::validate_catalog(&catalog);
        assert!(!result.is_valid);
    }
}
