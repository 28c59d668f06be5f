//! Onasis API Gateway Server
//!
//! Composition root for the gateway: loads configuration, constructs and
//! initializes adapters, seeds the vendor abstraction layer, and starts
//! the HTTP listener with the full middleware chain.

use onasis_rs::config::catalog::load_catalog;
use onasis_rs::config::settings::load_settings;
use onasis_rs::config::validation::ConfigValidator;
use onasis_rs::logs::logger::configure_logger;
use onasis_rs::middleware::cors::Cors;
use onasis_rs::middleware::rate_limit::ScopedRateLimit;
use onasis_rs::middleware::request_id::RequestIdentity;
use onasis_rs::middleware::security::security_headers;
use onasis_rs::models::catalog::{AdapterKind, ServiceCatalog};
use onasis_rs::models::settings::Settings;
use onasis_rs::routes::{api, health, manifest, metrics, proxy, rpc};
use onasis_rs::routes::metrics::MetricsCollector;
use onasis_rs::routes::proxy::ProxyState;
use onasis_rs::services::adapter::{Adapter, HttpAdapter};
use onasis_rs::services::auth_bridge::AuthBridge;
use onasis_rs::services::abstraction::AbstractionLayer;
use onasis_rs::services::discovery::DiscoveryService;
use onasis_rs::services::http_client::{AuthScheme, HttpClient};
use onasis_rs::services::registry::{AdapterRegistry, RegisterOptions};
use onasis_rs::services::supabase::SupabaseAdapter;
use onasis_rs::services::vendors::{seed_categories, VendorSeedConfig};

use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{App, HttpServer};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;

/// Builds one adapter from its catalog entry.
fn build_adapter(
    descriptor: &onasis_rs::models::catalog::AdapterDescriptor,
    settings: &Settings,
) -> Option<Arc<dyn Adapter>> {
    match descriptor.kind {
        AdapterKind::Mock => None, // registered through register_mock
        AdapterKind::Real => {
            let base_url = descriptor.base_url.clone()?;
            let auth = AuthScheme::from_config(&descriptor.id, &descriptor.auth);
            let client = HttpClient::new(
                descriptor.id.clone(),
                base_url,
                auth,
                settings.outbound_timeout_secs,
            );
            Some(Arc::new(HttpAdapter::new(descriptor.clone(), client)))
        }
        AdapterKind::Supabase => {
            let base_url = descriptor
                .base_url
                .clone()
                .or_else(|| settings.supabase_url.clone())?;
            let auth = match &settings.supabase_key {
                Some(key) => AuthScheme::ApiKey {
                    key: "apikey".to_string(),
                    value: key.clone(),
                    in_query: false,
                },
                None => AuthScheme::None,
            };
            let client = HttpClient::new(
                descriptor.id.clone(),
                base_url,
                auth,
                settings.outbound_timeout_secs,
            );
            Some(Arc::new(SupabaseAdapter::new(descriptor.clone(), client)))
        }
    }
}

/// Constructs every enabled adapter, runs their `initialize()` futures in
/// parallel, and registers them. The registry's readiness gate releases
/// only after all initialization has completed, so no handler can observe
/// a partial catalog.
async fn warm_up(
    registry: &Arc<AdapterRegistry>,
    catalog: &ServiceCatalog,
    settings: &Settings,
) {
    let mut real: Vec<Arc<dyn Adapter>> = Vec::new();
    for descriptor in catalog.enabled_adapters() {
        match descriptor.kind {
            AdapterKind::Mock => {
                if let Err(e) = registry.register_mock(descriptor).await {
                    warn!("Mock adapter {} failed to register: {}", descriptor.id, e);
                }
            }
            _ => match build_adapter(descriptor, settings) {
                Some(adapter) => real.push(adapter),
                None => warn!(
                    "Adapter {} skipped: missing base URL or configuration",
                    descriptor.id
                ),
            },
        }
    }

    let initializations = real.iter().map(|adapter| {
        let adapter = adapter.clone();
        async move {
            let id = adapter.id().to_string();
            (id, adapter.initialize().await)
        }
    });
    for (id, outcome) in futures::future::join_all(initializations).await {
        if let Err(e) = outcome {
            warn!("Adapter {} failed to initialize: {}", id, e);
        }
    }

    for adapter in real {
        if let Err(e) = registry
            .register(adapter, RegisterOptions { skip_initialize: true })
            .await
        {
            warn!("Adapter registration failed: {}", e);
        }
    }

    registry.mark_ready();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings: Settings = load_settings().expect("Failed to load settings");
    info!("Starting Onasis API Gateway v{}", env!("CARGO_PKG_VERSION"));

    let catalog =
        load_catalog(&settings.catalog_path, &settings.services_dir).expect("Failed to load catalog");

    let validation = ConfigValidator::validate_comprehensive(&settings, &catalog);
    if !validation.is_valid {
        error!("Configuration validation failed:");
        for e in &validation.errors {
            error!("  - {}", e);
        }
        std::process::exit(1);
    }

    // Adapter warm-up. Construction is parallelized but completion is
    // awaited before the listener answers tool listings.
    let registry = Arc::new(AdapterRegistry::new());
    warm_up(&registry, &catalog, &settings).await;
    let stats = registry.get_stats();
    info!(
        "Registry warmed up: {} adapters ({} real, {} mock), {} tools, mode={}",
        stats.adapters,
        stats.real,
        stats.mock,
        stats.tools,
        settings.mode.as_str()
    );

    // Vendor abstraction layer with the late-bound registry reference.
    let val = Arc::new(AbstractionLayer::new(
        seed_categories(&VendorSeedConfig::from_env()),
        registry.clone(),
    ));
    for missing in val.unmapped_adapters() {
        warn!("Vendor mapping references unregistered adapter '{}'", missing);
    }

    let discovery = Arc::new(DiscoveryService::new(val.clone(), registry.clone()));
    let auth_bridge = Arc::new(AuthBridge::new(
        settings.auth_service_url.clone(),
        settings.auth_timeout_secs,
        settings.monitor_token.clone(),
    ));
    let metrics_collector = MetricsCollector::default();
    let proxy_state = ProxyState::default();

    let rate_limit = ScopedRateLimit::new(settings.api_rate_limit, settings.mcp_rate_limit);
    let cors = Cors::new(settings.origins.clone());

    // Coarse per-second flood guard underneath the scoped windows.
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(100)
        .burst_size(200)
        .finish()
        .unwrap();

    let host = settings.host.clone();
    let port = settings.port;
    info!("Starting server on {}:{}", host, port);

    let app_settings = settings.clone();
    let app_catalog = catalog.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(actix_web::web::Data::new(registry.clone()))
            .app_data(actix_web::web::Data::new(val.clone()))
            .app_data(actix_web::web::Data::new(discovery.clone()))
            .app_data(actix_web::web::Data::new(auth_bridge.clone()))
            .app_data(actix_web::web::Data::new(app_settings.clone()))
            .app_data(actix_web::web::Data::new(app_catalog.clone()))
            .app_data(actix_web::web::Data::new(metrics_collector.clone()))
            .app_data(actix_web::web::Data::new(proxy_state.clone()))
            .wrap(Governor::new(&governor_conf))
            .wrap(actix_web::middleware::Compress::default())
            .wrap(security_headers())
            .wrap(rate_limit.clone())
            .wrap(cors.clone())
            .wrap(RequestIdentity)
            .configure(manifest::configure_manifest)
            .configure(health::configure_health)
            .configure(metrics::configure_metrics)
            .configure(rpc::configure_rpc)
            .configure(proxy::configure_proxy)
            .configure(api::configure_api)
    })
    .bind((host.as_str(), port))?
    .run();

    info!("Server started successfully");

    // Graceful shutdown handling
    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {}", e),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
