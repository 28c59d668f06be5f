//! End-to-end tests for the vendor abstraction layer against a recording
//! registry: the full eight-step protocol, vendor selection, and the
//! boundary cases around it.

use async_trait::async_trait;
use onasis_rs::models::context::RequestContext;
use onasis_rs::models::error::GatewayError;
use onasis_rs::models::tool::Tool;
use onasis_rs::services::abstraction::AbstractionLayer;
use onasis_rs::services::adapter::Adapter;
use onasis_rs::services::registry::{AdapterRegistry, RegisterOptions};
use onasis_rs::services::vendors::{seed_categories, VendorSeedConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Test adapter that records every call and answers with a canned body.
struct RecordingAdapter {
    id: String,
    calls: Mutex<Vec<(String, Value)>>,
    call_count: AtomicU64,
    response: Value,
}

impl RecordingAdapter {
    fn new(id: &str, response: Value) -> Arc<Self> {
        Arc::new(RecordingAdapter {
            id: id.to_string(),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicU64::new(0),
            response,
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    fn list_tools(&self) -> Vec<Tool> {
        Vec::new()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        _ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((name.to_string(), args));
        Ok(self.response.clone())
    }
}

async fn layer_with(
    adapters: Vec<Arc<RecordingAdapter>>,
) -> (Arc<AbstractionLayer>, Arc<AdapterRegistry>) {
    let registry = Arc::new(AdapterRegistry::new());
    for adapter in adapters {
        let adapter: Arc<dyn Adapter> = adapter;
        registry.register(adapter, RegisterOptions::default()).await.unwrap();
    }
    registry.mark_ready();
    let config = VendorSeedConfig {
        paystack_callback_url: Some("https://pay.lanonasis.com/cb".into()),
    };
    let val = Arc::new(AbstractionLayer::new(seed_categories(&config), registry.clone()));
    (val, registry)
}

#[tokio::test]
async fn paystack_initialize_flows_through_the_full_protocol() {
    let paystack = RecordingAdapter::new(
        "paystack",
        json!({ "status": true, "data": { "authorization_url": "https://checkout.paystack.com/abc" } }),
    );
    let (val, _registry) = layer_with(vec![paystack.clone()]).await;

    let ctx = RequestContext::default();
    let envelope = val
        .execute_abstracted_call(
            "payment",
            "initializeTransaction",
            &json!({ "amount": 5000, "email": "a@b.co" }),
            None,
            &ctx,
        )
        .await
        .unwrap();

    // Envelope shape.
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["metadata"]["category"], "payment");
    assert_eq!(envelope["metadata"]["operation"], "initializeTransaction");
    assert_eq!(envelope["metadata"]["vendor"], "paystack");
    assert_eq!(envelope["metadata"]["abstracted"], true);
    assert_eq!(envelope["data"]["data"]["authorization_url"], "https://checkout.paystack.com/abc");

    // The registry saw the transformed vendor payload, defaults filled.
    let calls = paystack.calls();
    assert_eq!(calls.len(), 1);
    let (tool, payload) = &calls[0];
    assert_eq!(tool, "initialize-transaction");
    assert_eq!(payload["amount"], 5000);
    assert_eq!(payload["currency"], "NGN");
    assert_eq!(payload["callback_url"], "https://pay.lanonasis.com/cb");
    assert!(payload["reference"].as_str().unwrap().starts_with("ref_"));
}

#[tokio::test]
async fn unknown_operation_never_touches_the_registry() {
    let paystack = RecordingAdapter::new("paystack", json!({}));
    let (val, _registry) = layer_with(vec![paystack.clone()]).await;

    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call("payment", "refundEverything", &json!({}), None, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::UnknownOperation { .. }));
    assert_eq!(err.code(), "UNKNOWN_OPERATION");
    assert_eq!(err.status().as_u16(), 404);
    assert_eq!(paystack.call_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let (val, _registry) = layer_with(vec![]).await;
    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call("payments", "initializeTransaction", &json!({}), None, &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_CATEGORY");
    assert_eq!(err.status().as_u16(), 404);
}

#[tokio::test]
async fn vendor_preference_is_honored_when_registered() {
    let flutterwave = RecordingAdapter::new("flutterwave", json!({ "status": "success" }));
    let paystack = RecordingAdapter::new("paystack", json!({ "status": true }));
    let (val, _registry) = layer_with(vec![paystack.clone(), flutterwave.clone()]).await;

    let ctx = RequestContext::default();
    let envelope = val
        .execute_abstracted_call(
            "payment",
            "initializeTransaction",
            &json!({ "amount": 100, "email": "x@y.z", "reference": "ref_7" }),
            Some("flutterwave"),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(envelope["metadata"]["vendor"], "flutterwave");
    assert_eq!(paystack.call_count.load(Ordering::SeqCst), 0);

    let calls = flutterwave.calls();
    assert_eq!(calls[0].0, "init-payment");
    assert_eq!(calls[0].1["tx_ref"], "ref_7");
    assert_eq!(calls[0].1["customer"]["email"], "x@y.z");
}

#[tokio::test]
async fn unsupported_operation_for_pinned_vendor() {
    let flutterwave = RecordingAdapter::new("flutterwave", json!({}));
    let paystack = RecordingAdapter::new("paystack", json!({}));
    let (val, _registry) = layer_with(vec![paystack, flutterwave.clone()]).await;

    // listTransactions is mapped for paystack only.
    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call(
            "payment",
            "listTransactions",
            &json!({}),
            Some("flutterwave"),
            &ctx,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::OperationNotSupported { .. }));
    assert_eq!(err.status().as_u16(), 501);
    assert_eq!(flutterwave.call_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_vendor_list_fails_before_the_registry() {
    use onasis_rs::models::tool::InputSchema;
    use onasis_rs::services::abstraction::Category;

    let registry = Arc::new(AdapterRegistry::new());
    registry.mark_ready();
    let empty = Category::new("ghost", "No vendors yet").operation(
        "noop",
        "Nothing",
        InputSchema::default(),
    );
    let val = AbstractionLayer::new(vec![empty], registry);

    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call("ghost", "noop", &json!({}), None, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NoVendors { .. }));
    assert_eq!(err.status().as_u16(), 503);
}

#[tokio::test]
async fn validation_failure_surfaces_before_any_call() {
    let paystack = RecordingAdapter::new("paystack", json!({}));
    let (val, _registry) = layer_with(vec![paystack.clone()]).await;

    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call(
            "payment",
            "initializeTransaction",
            &json!({ "email": "a@b.co" }), // amount missing
            None,
            &ctx,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(err.status().as_u16(), 400);
    assert_eq!(paystack.call_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn caller_input_is_never_mutated() {
    let paystack = RecordingAdapter::new("paystack", json!({}));
    let (val, _registry) = layer_with(vec![paystack]).await;

    let input = json!({ "amount": 5000, "email": "a@b.co" });
    let before = input.clone();
    let ctx = RequestContext::default();
    let _ = val
        .execute_abstracted_call("payment", "initializeTransaction", &input, None, &ctx)
        .await
        .unwrap();

    assert_eq!(input, before);
}

#[tokio::test]
async fn describe_lists_vendors_iff_mapping_exists() {
    let (val, _registry) = layer_with(vec![]).await;

    // Round-trip law: describe(c, o).vendors includes v iff
    // vendors[v].mappings[o] exists.
    let described = val.describe("payment", "listTransactions").unwrap();
    let vendors = described["vendors"].as_array().unwrap();
    assert!(vendors.contains(&json!("paystack")));
    assert!(!vendors.contains(&json!("flutterwave")));

    let described = val.describe("payment", "initializeTransaction").unwrap();
    let vendors = described["vendors"].as_array().unwrap();
    assert!(vendors.contains(&json!("paystack")));
    assert!(vendors.contains(&json!("flutterwave")));
}

#[tokio::test]
async fn mock_adapter_rejects_execution_through_the_registry() {
    use onasis_rs::models::catalog::AdapterDescriptor;

    let registry = Arc::new(AdapterRegistry::new());
    let descriptor: AdapterDescriptor =
        serde_json::from_value(json!({ "id": "prembly", "type": "mock", "tool_count": 2 }))
            .unwrap();
    registry.register_mock(&descriptor).await.unwrap();
    registry.mark_ready();

    let val = Arc::new(AbstractionLayer::new(
        seed_categories(&VendorSeedConfig::default()),
        registry.clone(),
    ));

    let ctx = RequestContext::default();
    let err = val
        .execute_abstracted_call(
            "verification",
            "verifyIdentity",
            &json!({ "id_type": "bvn", "id_number": "12345678901" }),
            None,
            &ctx,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::AdapterNotExecutable { .. }));
    assert_eq!(err.status().as_u16(), 501);
}
