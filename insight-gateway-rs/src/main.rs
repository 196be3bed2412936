// insight-gateway-rs/src/main.rs
// Telemetry Insight Gateway - HTTP entry point
// Port 8080 by default (GATEWAY_SERVICE_PORT / GATEWAY_SERVICE_ADDR)

use std::sync::Arc;

use anyhow::Context;
use config_rs::ServiceConfig;
use insight_gateway::{build_router, AppState};
use oracle_sdk::config::{CompositeConfigProvider, EnvConfigProvider, MemoryConfigProvider};
use oracle_sdk::openai::OpenAIClient;
use oracle_sdk::{OracleConfig, ReasoningOracle};
use query_router::{QueryEngine, RouterConfig};
use structured_store::{PostgresStore, StoreConfig};
use telemetry_pipeline::{create_repository, PipelineConfig, RepositoryBackend, TelemetryPipeline};

/// `INSIGHT_*` variables first, then unprefixed ones such as `DATABASE_URL`,
/// then the store's own connection URL so telemetry lands in the database
/// the query tools read
fn config_provider(store: &StoreConfig) -> CompositeConfigProvider {
    let mut fallback = MemoryConfigProvider::new();
    fallback.set("database_url", &store.database_url);

    let mut provider = CompositeConfigProvider::new();
    provider.add_provider(EnvConfigProvider::new().with_prefix("INSIGHT"));
    provider.add_provider(EnvConfigProvider::new());
    provider.add_provider(fallback);
    provider
}

fn build_oracle(provider: &CompositeConfigProvider) -> Option<Arc<dyn ReasoningOracle>> {
    let client = OracleConfig::from_provider(provider).and_then(OpenAIClient::new_with_config);
    match client {
        Ok(client) => {
            log::info!(
                "Reasoning oracle configured: model {} at {}",
                client.config().model,
                client.config().base_url
            );
            Some(Arc::new(client))
        }
        Err(err) => {
            log::warn!("Reasoning oracle unavailable: {}", err);
            log::warn!("Complex questions get guidance and anomalies use deterministic analysis");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config_rs::load_dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let service_config = ServiceConfig::new("gateway");

    let mut store_config = StoreConfig::from_env();
    if let Some(url) = config_rs::database_url() {
        store_config.database_url = url;
    }
    let provider = config_provider(&store_config);
    let store = PostgresStore::connect(&store_config)
        .await
        .context("failed to connect the structured store")?;
    let store = Arc::new(store);

    let oracle = build_oracle(&provider);

    let router_config = RouterConfig::from_provider(&provider);
    log::info!(
        "Query engine: mode {}, format {:?}",
        router_config.mode,
        router_config.format
    );
    let engine = QueryEngine::new(store.clone(), oracle.clone(), router_config);

    let pipeline_config = PipelineConfig::from_provider(&provider);
    let backend = match &pipeline_config.repository {
        RepositoryBackend::Memory => "in-memory",
        RepositoryBackend::Postgres { .. } => "postgres",
    };
    log::info!("Telemetry repository: {}", backend);
    let repository = create_repository(&pipeline_config.repository)
        .await
        .context("failed to initialize the telemetry repository")?;
    let pipeline = TelemetryPipeline::new(repository, oracle, &pipeline_config);

    let state = AppState {
        engine: Arc::new(engine),
        pipeline: Arc::new(pipeline),
        store,
    };

    let app = build_router(state);

    let addr = service_config.get_bind_address(8080);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    log::info!("Telemetry Insight Gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
