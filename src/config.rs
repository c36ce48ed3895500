use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub analysis_concurrency: usize,
    pub context_excerpt_chars: usize,
    pub source_timeout: Duration,
    pub wikipedia_base_url: String,
    pub report_output_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub otel_enabled: bool,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env` passes
    /// the process environment; tests pass a fixed map.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let log_file = var("LOG_FILE", "ai_agent.log");

        Ok(Self {
            environment: var("RESEARCH_ENVIRONMENT", "development"),
            llm_provider: var("LLM_PROVIDER", "google").to_lowercase(),
            llm_model: var("LLM_MODEL", "gemini-2.0-flash"),
            ollama_base_url: var("OLLAMA_BASE_URL", "http://localhost:11434"),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()),
            google_api_key: lookup("GOOGLE_API_KEY").filter(|k| !k.is_empty()),
            default_temperature: parse_var("DEFAULT_TEMPERATURE", &var("DEFAULT_TEMPERATURE", "0.3"))?,
            default_max_tokens: parse_var("DEFAULT_MAX_TOKENS", &var("DEFAULT_MAX_TOKENS", "2048"))?,
            analysis_concurrency: parse_var::<usize>(
                "ANALYSIS_CONCURRENCY",
                &var("ANALYSIS_CONCURRENCY", "5"),
            )?
            .max(1),
            context_excerpt_chars: parse_var(
                "CONTEXT_EXCERPT_CHARS",
                &var("CONTEXT_EXCERPT_CHARS", "500"),
            )?,
            source_timeout: Duration::from_secs(parse_var(
                "SOURCE_TIMEOUT_SECS",
                &var("SOURCE_TIMEOUT_SECS", "10"),
            )?),
            wikipedia_base_url: var("WIKIPEDIA_BASE_URL", "https://en.wikipedia.org"),
            report_output_dir: PathBuf::from(var("REPORT_OUTPUT_DIR", ".")),
            // An empty LOG_FILE disables the file layer.
            log_file: (!log_file.is_empty()).then(|| PathBuf::from(log_file)),
            otel_enabled: parse_var("OTEL_ENABLED", &var("OTEL_ENABLED", "false"))?,
            otel_service_name: var("OTEL_SERVICE_NAME", "ai-research-agent"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Returns the credential the selected provider needs. Ollama runs locally
    /// and needs none.
    pub fn api_key_for_provider(&self) -> AppResult<Option<&str>> {
        let (key, name) = match self.llm_provider.as_str() {
            "ollama" => return Ok(None),
            "openai" => (self.openai_api_key.as_deref(), "OPENAI_API_KEY"),
            "anthropic" => (self.anthropic_api_key.as_deref(), "ANTHROPIC_API_KEY"),
            "google" => (self.google_api_key.as_deref(), "GOOGLE_API_KEY"),
            other => {
                return Err(AppError::Config(format!("unknown LLM_PROVIDER '{other}'")));
            }
        };

        key.map(Some).ok_or_else(|| {
            AppError::Config(format!(
                "{name} not found. Set it as environment variable."
            ))
        })
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be a valid value, got '{raw}'")))
}
