pub mod anthropic;
pub mod client;
pub mod openai;
pub mod pricing;

use std::sync::Arc;

pub use client::LlmClient;

use crate::config::Config;
use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub finish_reason: String,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
}

/// Builds the provider selected by `LLM_PROVIDER`, failing when its credential
/// is missing.
pub fn build_provider(config: &Config) -> AppResult<Arc<dyn Provider>> {
    let api_key = config.api_key_for_provider()?.unwrap_or_default();

    let provider: Arc<dyn Provider> = match config.llm_provider.as_str() {
        "anthropic" => Arc::new(anthropic::AnthropicProvider::new(api_key)),
        "openai" => Arc::new(openai::OpenAIProvider::new(api_key)),
        "ollama" => Arc::new(openai::OpenAIProvider::new_ollama(&config.ollama_base_url)),
        _ => Arc::new(openai::OpenAIProvider::new_google(api_key)),
    };

    Ok(provider)
}
