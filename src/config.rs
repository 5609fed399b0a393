use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub collection: CollectionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string, or "memory" for the in-process store.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
}

/// Generative text service (OpenAI-compatible chat completions endpoint).
/// An empty or "mock" api_key means no model is configured and every consumer
/// uses its deterministic fallback.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != "mock"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    pub default_query: String,
    pub default_horizon: String,
    /// Per-provider result cap.
    pub provider_limit: usize,
    /// Queries shorter than this get the fixed qualifier appended.
    pub short_query_len: usize,
    pub query_qualifier: String,
}

impl AppConfig {
    pub fn build() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Defaults first
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.rust_log", "info,paperharvest=debug")?
            .set_default("database.url", "memory")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 30)?
            .set_default("llm.api_url", "https://api.groq.com/openai/v1/chat/completions")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "llama-3.3-70b-versatile")?
            .set_default("llm.temperature", 0.3)?
            .set_default("llm.max_tokens", 1000)?
            .set_default("collection.default_query", "AI in banking")?
            .set_default("collection.default_horizon", "week")?
            .set_default("collection.provider_limit", 10)?
            .set_default("collection.short_query_len", 5)?
            .set_default("collection.query_qualifier", "banking AI")?
            // Env overrides, e.g. `APP_SERVER__PORT=8080`
            .add_source(Environment::default().separator("__").prefix("APP"));

        builder.build()?.try_deserialize()
    }
}
