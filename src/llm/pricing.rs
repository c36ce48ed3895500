use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

const BUNDLED_PRICING: &str = include_str!("../../data/pricing.json");

/// USD per million tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct PriceEntry {
    #[allow(dead_code)]
    pub provider: String,
    pub input: f64,
    pub output: f64,
}

#[derive(Deserialize)]
struct PricingFile {
    models: HashMap<String, PriceEntry>,
}

pub static PRICING: LazyLock<HashMap<String, PriceEntry>> = LazyLock::new(|| {
    if let Ok(path) = std::env::var("PRICING_JSON_PATH")
        && !path.is_empty()
    {
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|data| parse_pricing(&data))
        {
            Ok(models) if !models.is_empty() => return models,
            Ok(_) => tracing::warn!(%path, "pricing file has no models, using bundled table"),
            Err(e) => tracing::warn!(%path, error = %e, "failed to load pricing file, using bundled table"),
        }
    }

    parse_pricing(BUNDLED_PRICING).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "bundled pricing table is invalid, costs will be $0.00");
        HashMap::new()
    })
});

fn parse_pricing(data: &str) -> anyhow::Result<HashMap<String, PriceEntry>> {
    Ok(serde_json::from_str::<PricingFile>(data)?.models)
}

pub fn calculate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    match PRICING.get(model) {
        Some(entry) => {
            (f64::from(input_tokens) * entry.input / 1_000_000.0)
                + (f64::from(output_tokens) * entry.output / 1_000_000.0)
        }
        None => 0.0,
    }
}

pub static PROVIDER_SERVERS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    HashMap::from([
        ("openai", "api.openai.com"),
        ("anthropic", "api.anthropic.com"),
        ("google", "generativelanguage.googleapis.com"),
        ("ollama", "localhost"),
    ])
});

pub static PROVIDER_PORTS: LazyLock<HashMap<&str, i64>> = LazyLock::new(|| {
    HashMap::from([
        ("openai", 443_i64),
        ("anthropic", 443),
        ("google", 443),
        ("ollama", 11434),
    ])
});
