use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ace_core::blob::{BlobStore, DiskBlobStore};
use ace_core::cache::InMemoryResultCache;
use ace_core::config::Config;
use ace_core::core::{AceCore, AceCoreBuilder};
use ace_core::events::InMemoryEventBus;
use ace_core::http;
use ace_core::lock::InMemoryLockManager;
use ace_core::processor::ProcessorConfig;
use ace_core::queue::WorkQueues;
use ace_core::registry::InMemoryModuleRegistry;
use ace_core::trackers::{InMemoryAlertSink, InMemoryAnalysisRequestTracker, InMemoryRootTracker};
use ace_core::utils::ScheduledExecutor;

#[derive(OpenApi)]
#[openapi(
    paths(
        http::handlers::analysis::submit_root,
        http::handlers::analysis::get_root,
        http::handlers::analysis::post_result,
        http::handlers::modules::register_module,
        http::handlers::modules::get_module,
        http::handlers::work::get_next_request,
        http::handlers::work::ack_work,
        http::handlers::blobs::upload_blob,
        http::handlers::blobs::download_blob,
        http::handlers::events::poll_events,
        http::handlers::health::health_check,
        http::handlers::health::ready_check,
    ),
    components(
        schemas(
            ace_core::model::RootAnalysis,
            ace_core::model::Observable,
            ace_core::model::Analysis,
            ace_core::model::AnalysisStatus,
            ace_core::model::ObservableKey,
            ace_core::model::BlobHandle,
            ace_core::model::AnalysisModuleType,
            ace_core::model::AnalysisRequest,
            ace_core::model::AnalysisResult,
            ace_core::model::RequestState,
            ace_core::events::Event,
            http::wire::SubmitRootRequest,
            http::wire::PostResultRequest,
            http::wire::RegisterModuleRequest,
            http::wire::RootResponse,
            http::wire::WorkResponse,
            http::wire::BlobUploadResponse,
            http::handlers::modules::RegisterModuleResponse,
        )
    ),
    tags(
        (name = "Analysis", description = "Root submission and analysis-result posting (§4.2)"),
        (name = "Modules", description = "Analysis module type registration (§4.3)"),
        (name = "Work", description = "Per-module work queue leasing (§4.4)"),
        (name = "Blobs", description = "Content-addressed blob store (§4.8)"),
        (name = "Events", description = "Topic-based event bus (§4.7)"),
        (name = "System", description = "Liveness and readiness"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

/// Periodic lease/cache-TTL/root-TTL sweep (`SPEC_FULL.md` §5), run through
/// the teacher's `ScheduledExecutor`/`ScheduledTask` pattern.
struct SweepTask {
    core: Arc<AceCore>,
}

impl ace_core::utils::ScheduledTask for SweepTask {
    fn run(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move {
            self.core.sweep().await;
            Ok(())
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("aced.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("ACE Core starting up");
    tracing::info!("Configuration loaded successfully");

    let blob_store: Arc<dyn BlobStore> = Arc::new(DiskBlobStore::new(config.storage.root.clone()));

    let core = Arc::new(
        AceCoreBuilder {
            registry: Arc::new(InMemoryModuleRegistry::new()),
            queues: Arc::new(WorkQueues::new()),
            locks: Arc::new(InMemoryLockManager::new()),
            cache: Arc::new(InMemoryResultCache::new()),
            events: Arc::new(InMemoryEventBus::new()),
            roots: Arc::new(InMemoryRootTracker::new()),
            requests: Arc::new(InMemoryAnalysisRequestTracker::new()),
            alerts: Arc::new(InMemoryAlertSink::new()),
            blobs: blob_store,
            processor_config: ProcessorConfig {
                lock_wait: Duration::from_secs(config.locking.default_wait_secs),
                lock_lease: Duration::from_secs(config.locking.default_lease_secs),
                visibility_timeout: Duration::from_secs(config.queue.default_visibility_timeout_secs),
            },
            visibility_timeout: Duration::from_secs(config.queue.default_visibility_timeout_secs),
            root_ttl: config.roots.ttl_secs.map(|secs| chrono::Duration::seconds(secs as i64)),
        }
        .build(),
    );

    let sweep_interval = Duration::from_secs(30);
    let executor = ScheduledExecutor::new("lease-and-ttl-sweep", sweep_interval);
    let sweep_task = SweepTask { core: Arc::clone(&core) };
    tokio::spawn(async move {
        executor.start(sweep_task).await;
    });
    tracing::info!(interval_secs = sweep_interval.as_secs(), "lease/cache/root sweeper started");

    let app = build_app(core, config.auth.api_key.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("ACE Core is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app(core: Arc<AceCore>, api_key: String) -> axum::Router {
    let app = http::build(core, api_key);
    let app = app.merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    app.layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
