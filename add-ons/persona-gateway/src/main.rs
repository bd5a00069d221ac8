//! Binary entry point: load configuration, open storage, wire the broker,
//! lock, and LLM gateway, spawn the worker pool, and serve the HTTP API.
//!
//! All actual logic lives in the library crate (`lib.rs`) so that
//! integration tests under `tests/` can exercise the same dispatch/worker/
//! http wiring this binary assembles.

use std::sync::Arc;

use persona_core::broker::InProcessBroker;
use persona_core::lock::SledLock;
use persona_core::repository::SledStore;
use persona_llm::provider::HttpLlmProvider;
use persona_llm::retry::RetryPolicy;
use persona_llm::LlmGateway;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use persona_gateway::config::GatewayConfig;
use persona_gateway::termination::TerminationDetector;
use persona_gateway::worker::{FeedbackWorker, PersonaWorker};
use persona_gateway::http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[persona-gateway] .env not loaded: {e} (using system environment)");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;

    let store = Arc::new(SledStore::open_path(&config.sled_data_dir)?);
    let broker = InProcessBroker::new(persona_core::broker::DEFAULT_QUEUE_CAPACITY);
    let lock = Arc::new(SledLock::new(&store.db())?);

    let provider = Arc::new(HttpLlmProvider::new(
        config.llm_provider,
        config.llm_base_url_override.clone(),
        config.llm_bearer.clone(),
        config.llm_per_call_timeout,
    ));
    let retry_policy = RetryPolicy {
        base_delay: config.retry_base_delay,
        ..RetryPolicy::default()
    };
    let llm = Arc::new(LlmGateway::new(provider, retry_policy, config.llm_model.clone()));

    let termination = Arc::new(TerminationDetector::new(
        lock,
        store.clone(),
        store.clone(),
        llm.clone(),
        config.lock_lease,
        config.lock_wait,
    ));

    for _ in 0..config.worker_concurrency {
        let worker = Arc::new(PersonaWorker::new(store.clone(), broker.clone(), llm.clone()));
        tokio::spawn(async move { worker.run().await });
    }
    for _ in 0..config.worker_concurrency {
        let worker = Arc::new(FeedbackWorker::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            broker.clone(),
            llm.clone(),
            termination.clone(),
        ));
        tokio::spawn(async move { worker.run().await });
    }

    let state = http::build_state(store, broker, config.llm_model.clone(), config.idempotency_window);
    let app = http::router(state);

    let addr: std::net::SocketAddr = config.bind_addr.parse()?;
    tracing::info!("persona-gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining in-flight requests");
        }
    }

    Ok(())
}
