//! The seeded category table: client schemas, vendor mappings, and the
//! pure transforms between them.
//!
//! Seeding happens once at startup. Transforms close over configuration
//! captured here (e.g. the payment callback URL) and are deterministic
//! given their input; generated defaults such as payment references are
//! filled during validation, not inside transforms.

use crate::models::tool::{DynamicDefault, InputSchema, PropertySchema};
use crate::services::abstraction::{Category, Transform};
use serde_json::{json, Value};
use std::sync::Arc;

/// Configuration captured by transforms at seed time.
#[derive(Debug, Clone, Default)]
pub struct VendorSeedConfig {
    /// Callback URL stamped onto payment initialization payloads.
    pub paystack_callback_url: Option<String>,
}

impl VendorSeedConfig {
    pub fn from_env() -> Self {
        VendorSeedConfig {
            paystack_callback_url: std::env::var("PAYSTACK_CALLBACK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }
}

fn passthrough() -> Transform {
    Arc::new(|input: &Value| Ok(input.clone()))
}

fn reference_field() -> PropertySchema {
    PropertySchema {
        schema_type: Some("string".into()),
        description: Some("Caller-supplied idempotency reference".into()),
        dynamic_default: Some(DynamicDefault::Reference { prefix: "ref_".into() }),
        ..Default::default()
    }
}

/// Builds the full category set.
pub fn seed_categories(config: &VendorSeedConfig) -> Vec<Category> {
    vec![
        payment(config),
        banking(),
        verification(),
        infrastructure(),
        memory(),
        ai(),
        auth(),
        intelligence(),
        security(),
    ]
}

fn payment(config: &VendorSeedConfig) -> Category {
    let init_schema = InputSchema::object(
        vec![
            ("amount", PropertySchema::number().described("Charge amount in major units")),
            ("email", PropertySchema::string().described("Customer email")),
            ("currency", PropertySchema::string().with_default(json!("NGN"))),
            ("reference", reference_field()),
        ],
        vec!["amount", "email"],
    );
    let verify_schema = InputSchema::object(
        vec![("reference", PropertySchema::string().described("Transaction reference"))],
        vec!["reference"],
    );
    let list_schema = InputSchema::object(
        vec![(
            "per_page",
            PropertySchema {
                schema_type: Some("integer".into()),
                minimum: Some(1.0),
                maximum: Some(200.0),
                default: Some(json!(50)),
                ..Default::default()
            },
        )],
        vec![],
    );

    // Amount stays in major units end to end; unit conversion is the
    // vendor API's business, not the gateway's.
    let callback = config.paystack_callback_url.clone();
    let paystack_init: Transform = Arc::new(move |input: &Value| {
        let mut payload = json!({
            "email": input["email"],
            "amount": input["amount"],
            "currency": input["currency"],
            "reference": input["reference"],
        });
        if let Some(url) = &callback {
            payload["callback_url"] = json!(url);
        }
        Ok(payload)
    });
    let paystack_verify: Transform =
        Arc::new(|input: &Value| Ok(json!({ "reference": input["reference"] })));

    // Flutterwave speaks tx_ref; the canonical reference maps onto it.
    let flutterwave_init: Transform = Arc::new(|input: &Value| {
        Ok(json!({
            "tx_ref": input["reference"],
            "amount": input["amount"],
            "currency": input["currency"],
            "customer": { "email": input["email"] },
        }))
    });
    let flutterwave_verify: Transform =
        Arc::new(|input: &Value| Ok(json!({ "tx_ref": input["reference"] })));

    Category::new("payment", "Collect and verify customer payments across processors")
        .operation("initializeTransaction", "Start a payment session", init_schema)
        .operation("verifyTransaction", "Confirm the state of a payment", verify_schema)
        .operation("listTransactions", "Page through recent transactions", list_schema)
        .vendor(
            "paystack",
            "paystack",
            vec![
                ("initializeTransaction", "initialize-transaction", paystack_init),
                ("verifyTransaction", "verify-transaction", paystack_verify),
                ("listTransactions", "list-transactions", passthrough()),
            ],
        )
        .vendor(
            "flutterwave",
            "flutterwave",
            vec![
                ("initializeTransaction", "init-payment", flutterwave_init),
                ("verifyTransaction", "verify-payment", flutterwave_verify),
            ],
        )
}

fn banking() -> Category {
    let resolve_schema = InputSchema::object(
        vec![
            ("account_number", PropertySchema::string().described("NUBAN account number")),
            ("bank_code", PropertySchema::string().described("CBN bank code")),
        ],
        vec!["account_number", "bank_code"],
    );

    let bap_resolve: Transform = Arc::new(|input: &Value| {
        Ok(json!({
            "accountNumber": input["account_number"],
            "bankCode": input["bank_code"],
        }))
    });

    Category::new("banking", "Bank account resolution and institution directories")
        .operation("resolveAccount", "Resolve an account number to its holder", resolve_schema)
        .operation("listBanks", "List supported banks", InputSchema::default())
        .vendor(
            "bap",
            "bap",
            vec![
                // Canonical tool name; the alternate 'account-name-verify'
                // spelling is not registered.
                ("resolveAccount", "validate-account-number", bap_resolve),
                ("listBanks", "list-banks", passthrough()),
            ],
        )
}

fn verification() -> Category {
    let schema = InputSchema::object(
        vec![
            (
                "id_type",
                PropertySchema {
                    schema_type: Some("string".into()),
                    enum_values: Some(vec![json!("bvn"), json!("nin"), json!("passport")]),
                    ..Default::default()
                },
            ),
            ("id_number", PropertySchema::string()),
            ("country", PropertySchema::string().with_default(json!("NG"))),
        ],
        vec!["id_type", "id_number"],
    );

    let prembly_verify: Transform = Arc::new(|input: &Value| {
        Ok(json!({
            "type": input["id_type"],
            "number": input["id_number"],
            "country": input["country"],
        }))
    });

    Category::new("verification", "Identity document and number verification")
        .operation("verifyIdentity", "Verify a government identity record", schema)
        .vendor("prembly", "prembly", vec![("verifyIdentity", "verify-identity", prembly_verify)])
}

fn infrastructure() -> Category {
    let tunnel_schema = InputSchema::object(
        vec![
            (
                "port",
                PropertySchema {
                    schema_type: Some("integer".into()),
                    minimum: Some(1.0),
                    maximum: Some(65535.0),
                    ..Default::default()
                },
            ),
            (
                "proto",
                PropertySchema {
                    schema_type: Some("string".into()),
                    enum_values: Some(vec![json!("http"), json!("tcp"), json!("tls")]),
                    default: Some(json!("http")),
                    ..Default::default()
                },
            ),
            ("region", PropertySchema::string().with_default(json!("us"))),
        ],
        vec!["port"],
    );

    let ngrok_create: Transform = Arc::new(|input: &Value| {
        let port = input["port"].as_u64().unwrap_or(80);
        Ok(json!({
            "forwards_to": format!("http://localhost:{}", port),
            "proto": input["proto"],
            "region": input["region"],
        }))
    });

    Category::new("infrastructure", "Tunnels and developer infrastructure")
        .operation("createTunnel", "Expose a local port through a public tunnel", tunnel_schema)
        .operation("listTunnels", "List active tunnels", InputSchema::default())
        .vendor(
            "ngrok",
            "ngrok-api",
            vec![
                ("createTunnel", "create-tunnel", ngrok_create),
                ("listTunnels", "list-tunnels", passthrough()),
            ],
        )
}

fn memory() -> Category {
    let create_schema = InputSchema::object(
        vec![
            ("title", PropertySchema::string()),
            ("content", PropertySchema::string()),
            (
                "tags",
                PropertySchema {
                    schema_type: Some("array".into()),
                    items: Some(Box::new(PropertySchema::string())),
                    ..Default::default()
                },
            ),
        ],
        vec!["title", "content"],
    );
    let search_schema = InputSchema::object(
        vec![
            ("query", PropertySchema::string()),
            (
                "limit",
                PropertySchema {
                    schema_type: Some("integer".into()),
                    minimum: Some(1.0),
                    maximum: Some(100.0),
                    default: Some(json!(10)),
                    ..Default::default()
                },
            ),
        ],
        vec!["query"],
    );

    Category::new("memory", "Durable notes and semantic recall for agents")
        .operation("createMemory", "Store a memory entry", create_schema)
        .operation("searchMemories", "Search stored memories", search_schema)
        .vendor(
            "lanonasis",
            "lanonasis",
            vec![
                ("createMemory", "memory-create", passthrough()),
                ("searchMemories", "memory-search", passthrough()),
            ],
        )
}

fn ai() -> Category {
    let chat_schema = InputSchema::object(
        vec![
            ("message", PropertySchema::string()),
            ("model", PropertySchema::string()),
            (
                "temperature",
                PropertySchema {
                    schema_type: Some("number".into()),
                    minimum: Some(0.0),
                    maximum: Some(2.0),
                    ..Default::default()
                },
            ),
        ],
        vec!["message"],
    );

    Category::new("ai", "Conversational and generative AI routing")
        .operation("chat", "Send a chat message to the routed model", chat_schema)
        .vendor("lanonasis", "lanonasis", vec![("chat", "ai-chat", passthrough())])
}

fn auth() -> Category {
    let schema = InputSchema::object(
        vec![("token", PropertySchema::string().described("Bearer token to verify"))],
        vec!["token"],
    );

    Category::new("auth", "Token verification against the identity service")
        .operation("verifyToken", "Verify a bearer token", schema)
        .vendor("lanonasis", "lanonasis", vec![("verifyToken", "auth-verify", passthrough())])
}

fn intelligence() -> Category {
    let schema = InputSchema::object(
        vec![
            ("data", PropertySchema { schema_type: Some("object".into()), ..Default::default() }),
            (
                "analysis",
                PropertySchema {
                    schema_type: Some("string".into()),
                    enum_values: Some(vec![json!("summary"), json!("risk"), json!("trend")]),
                    default: Some(json!("summary")),
                    ..Default::default()
                },
            ),
        ],
        vec!["data"],
    );

    Category::new("intelligence", "Data analysis over business records")
        .operation("analyzeData", "Run an analysis pass over a record set", schema)
        .vendor("lanonasis", "lanonasis", vec![("analyzeData", "intel-analyze", passthrough())])
}

fn security() -> Category {
    let schema = InputSchema::object(
        vec![
            ("event", PropertySchema::string().described("What happened")),
            (
                "severity",
                PropertySchema {
                    schema_type: Some("string".into()),
                    enum_values: Some(vec![json!("info"), json!("warning"), json!("critical")]),
                    default: Some(json!("info")),
                    ..Default::default()
                },
            ),
        ],
        vec!["event"],
    );

    Category::new("security", "Security event capture and audit")
        .operation("auditEvent", "Record a security-relevant event", schema)
        .vendor("lanonasis", "lanonasis", vec![("auditEvent", "security-audit", passthrough())])
}
