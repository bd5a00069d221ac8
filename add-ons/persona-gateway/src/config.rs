//! Gateway configuration loaded from the environment (§6 "all supplied via
//! environment variables and validated at startup; missing or placeholder
//! values fail startup").

use std::time::Duration;

use anyhow::{bail, Context, Result};
use persona_llm::Provider;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub sled_data_dir: String,
    pub llm_provider: Provider,
    pub llm_base_url_override: Option<String>,
    pub llm_bearer: String,
    pub llm_model: String,
    pub llm_per_call_timeout: Duration,
    pub retry_base_delay: Duration,
    pub lock_lease: Duration,
    pub lock_wait: Duration,
    pub worker_concurrency: usize,
    pub idempotency_window: Duration,
}

const PLACEHOLDER_VALUES: [&str; 4] = ["changeme", "placeholder", "todo", "your-api-key-here"];

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} is not set"))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{name} is set but empty");
    }
    if PLACEHOLDER_VALUES.contains(&trimmed.to_lowercase().as_str()) {
        bail!("{name} is still a placeholder value; set a real credential");
    }
    Ok(trimmed.to_string())
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_duration_secs(name: &str, default_secs: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

impl GatewayConfig {
    /// Loads and eagerly validates every setting. Returns an error describing
    /// exactly what's missing rather than failing later at first use.
    pub fn from_env() -> Result<Self> {
        let provider_name = required_env("LLM_PROVIDER")?;
        let llm_provider = Provider::parse(&provider_name)
            .with_context(|| format!("LLM_PROVIDER \"{provider_name}\" is not one of openrouter, agentrouter"))?;
        let llm_bearer = required_env("LLM_BEARER_TOKEN")?;
        let llm_model = required_env("LLM_MODEL")?;

        Ok(Self {
            bind_addr: env_or("GATEWAY_BIND_ADDR", "127.0.0.1:8080"),
            sled_data_dir: env_or("SLED_DATA_DIR", "./data/persona-gateway"),
            llm_provider,
            llm_base_url_override: std::env::var("LLM_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            llm_bearer,
            llm_model,
            llm_per_call_timeout: env_duration_secs("LLM_CALL_TIMEOUT_SECONDS", 30),
            retry_base_delay: Duration::from_millis(env_usize("LLM_RETRY_BASE_DELAY_MS", 1000) as u64),
            lock_lease: env_duration_secs("TERMINATION_LOCK_LEASE_SECONDS", 60),
            lock_wait: env_duration_secs("TERMINATION_LOCK_WAIT_SECONDS", 10),
            worker_concurrency: env_usize("WORKER_CONCURRENCY", 5).clamp(3, 10),
            idempotency_window: env_duration_secs("IDEMPOTENCY_WINDOW_SECONDS", 300),
        })
    }
}
