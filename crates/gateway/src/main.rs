//! PaperHound API Gateway
//!
//! Request surface for workflow callers:
//! - keyword search and citation network expansion
//! - PDF resolution, text extraction and analysis
//! - per-topic knowledge state
//! - observability (logging, metrics, request tracing)

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use paperhound_common::{
    analysis::{create_analyzer, AnalysisStore, TextAnalyzer},
    config::{AppConfig, ObservabilityConfig},
    errors::{AppError, Result},
    metrics, PaperSource, SemanticScholarClient,
};
use paperhound_knowledge::{ClassificationRules, KnowledgeStore, StateThresholds};
use paperhound_resolver::PdfResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{Semaphore, SemaphorePermit};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub scholar: Arc<dyn PaperSource>,
    pub scholar_api_key: bool,
    pub resolver: Arc<PdfResolver>,
    pub knowledge: Arc<KnowledgeStore>,
    pub summaries: Arc<AnalysisStore>,
    pub analyzer: Option<Arc<dyn TextAnalyzer>>,
    /// Bounds PDF resolutions running at once across all requests
    pub resolution_permits: Arc<Semaphore>,
}

impl AppState {
    pub async fn resolution_permit(&self) -> Result<SemaphorePermit<'_>> {
        self.resolution_permits
            .acquire()
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Resolution pool closed: {}", e),
            })
    }

    /// Several permits at once for a batch, capped at the pool size.
    pub async fn resolution_permits_for(&self, count: usize) -> Result<SemaphorePermit<'_>> {
        let count = count.clamp(1, self.config.server.max_concurrent_resolutions.max(1));
        self.resolution_permits
            .acquire_many(count as u32)
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Resolution pool closed: {}", e),
            })
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);
    info!("Starting PaperHound API Gateway v{}", paperhound_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("resolution_duration_seconds".to_string()),
                metrics::RESOLUTION_BUCKETS,
            )?
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }
    metrics::register_metrics();

    let state = build_state(config.clone()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize application state");
        e
    })?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wire live collaborators from configuration
async fn build_state(config: Arc<AppConfig>) -> Result<AppState> {
    let scholar = SemanticScholarClient::new(&config.scholar, &config.providers.user_agent)?;
    let scholar_api_key = scholar.has_api_key();
    if scholar_api_key {
        info!("Semantic Scholar API key loaded");
    } else {
        tracing::warn!("No Semantic Scholar API key, using the shared rate limit");
    }

    let resolver = PdfResolver::from_config(&config)?;
    let knowledge = KnowledgeStore::open(
        config.storage.knowledge_file.clone(),
        StateThresholds::from(&config.knowledge),
        ClassificationRules::from(&config.classification),
    )
    .await?;
    let summaries = AnalysisStore::new(config.storage.summaries_dir.clone());
    let analyzer = create_analyzer(&config.analysis)?;
    if let Some(analyzer) = &analyzer {
        info!(analyzer = analyzer.name(), "Text analysis enabled");
    }

    Ok(AppState {
        resolution_permits: Arc::new(Semaphore::new(config.server.max_concurrent_resolutions.max(1))),
        config,
        scholar: Arc::new(scholar),
        scholar_api_key,
        resolver: Arc::new(resolver),
        knowledge: Arc::new(knowledge),
        summaries: Arc::new(summaries),
        analyzer,
    })
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Search endpoints
        .route("/search/papers", post(handlers::search::search_papers))
        .route("/search/papers/{id}", get(handlers::search::get_paper))
        .route("/search/citation-network", post(handlers::search::citation_network))

        // Paper endpoints
        .route("/papers/summary", post(handlers::papers::save_summary))
        .route("/papers/{id}/find-pdf", get(handlers::papers::find_pdf))
        .route("/papers/{id}/try/{provider}", get(handlers::papers::try_provider))
        .route("/papers/{id}/pdf-text", get(handlers::papers::pdf_text))
        .route("/papers/{id}/analyze", post(handlers::papers::analyze))
        .route("/papers/{id}/summary", get(handlers::papers::get_summary))

        // Knowledge endpoints
        .route(
            "/knowledge/topics",
            get(handlers::knowledge::list_topics).post(handlers::knowledge::create_topic),
        )
        .route("/knowledge/topics/papers", post(handlers::knowledge::add_papers))
        .route("/knowledge/topics/mark-read", post(handlers::knowledge::mark_read))
        .route("/knowledge/topics/{name}", get(handlers::knowledge::get_topic))
        .route("/knowledge/topics/{name}/unread", get(handlers::knowledge::unread_papers))
        .route("/knowledge/classify-and-add", post(handlers::knowledge::classify_and_add));

    // Compose the app
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
