//! Catalog loading and validation against real files.

use onasis_rs::config::catalog::load_catalog;
use onasis_rs::config::validation::ConfigValidator;
use onasis_rs::models::catalog::{AdapterKind, AuthConfig};
use std::fs;

const FULL_CATALOG: &str = r#"{
  "adapters": [
    {
      "id": "paystack",
      "type": "real",
      "category": "payment",
      "base_url": "https://api.paystack.co",
      "auth": { "scheme": "bearer", "token_env": "PAYSTACK_SECRET_KEY" },
      "tools": [
        { "name": "initialize-transaction", "path": "/transaction/initialize" }
      ]
    },
    {
      "id": "bap",
      "type": "real",
      "base_url": "https://api.baas.example.com",
      "auth": {
        "scheme": "hmac",
        "user_env": "BAP_API_USER",
        "secret_env": "BAP_API_SECRET"
      },
      "tools": [
        { "name": "validate-account-number", "path": "/api/v1/accounts/validate" }
      ]
    },
    { "id": "prembly", "type": "mock", "tool_count": 12 },
    { "id": "disabled-one", "type": "mock", "tool_count": 1, "enabled": false },
    {
      "id": "lanonasis",
      "type": "supabase",
      "descriptor_paths": ["./services/lanonasis-functions.md"]
    }
  ],
  "api_services": {
    "wise": { "base_url": "https://api.transferwise.com", "description": "Transfers" }
  }
}"#;

#[test]
fn loads_and_validates_a_full_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adapters.json");
    fs::write(&path, FULL_CATALOG).unwrap();

    let catalog = load_catalog(path.to_str().unwrap(), "./missing").unwrap();
    assert_eq!(catalog.adapters.len(), 5);
    assert_eq!(catalog.enabled_adapters().count(), 4);
    assert_eq!(catalog.api_services.len(), 1);

    let bap = catalog.find("bap").unwrap();
    assert_eq!(bap.kind, AdapterKind::Real);
    assert!(matches!(bap.auth, AuthConfig::Hmac { .. }));

    let result = ConfigValidator::validate_catalog(&catalog);
    assert!(result.is_valid, "errors: {:?}", result.errors);
}

#[test]
fn directory_scan_collects_descriptors_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("b-ngrok.json"),
        r#"{"id": "ngrok-api", "type": "real", "base_url": "https://api.ngrok.com"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("a-paystack.json"),
        r#"{"id": "paystack", "type": "real", "base_url": "https://api.paystack.co"}"#,
    )
    .unwrap();

    let catalog = load_catalog("./does-not-exist.json", dir.path().to_str().unwrap()).unwrap();
    let ids: Vec<&str> = catalog.adapters.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["paystack", "ngrok-api"]);
}

#[test]
fn oversized_catalog_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adapters.json");
    // 11 MB of padding blows the size cap before JSON parsing runs.
    let huge = format!(r#"{{"adapters": [], "_pad": "{}"}}"#, "x".repeat(11 * 1024 * 1024));
    fs::write(&path, huge).unwrap();

    let err = load_catalog(path.to_str().unwrap(), "./missing").unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[test]
fn repo_catalog_passes_validation() {
    // The checked-in example catalog must stay valid.
    let catalog = load_catalog("../../adapters.json", "./missing").unwrap();
    let result = ConfigValidator::validate_catalog(&catalog);
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(catalog.find("paystack").is_some());
    assert!(catalog.find("lanonasis").is_some());
}
