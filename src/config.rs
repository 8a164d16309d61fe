use clap::Parser;

use crate::conversion::{parse_model_overrides, ModelMap};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_API_KEY: &str = "xibalba-backend-filter-key";
pub const DEFAULT_BACKEND_MODEL: &str = "qwen2.5-coder:7b";

/// Bridge configuration. Every flag can also be supplied through the environment
/// (after `.env` files have been loaded).
#[derive(Debug, Clone, Parser)]
#[command(name = "ollama-bridge", version, about = "Serve OpenAI chat completions from a local Ollama backend")]
pub struct BridgeConfig {
    /// Base URL of the Ollama backend.
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Shared secret advertised to clients. Not enforced.
    #[arg(long, env = "CURSOR_FILTER_KEY", default_value = DEFAULT_API_KEY, hide_env_values = true)]
    pub api_key: String,

    /// Backend model used for unmapped caller models.
    #[arg(long, env = "DEFAULT_OLLAMA_MODEL", default_value = DEFAULT_BACKEND_MODEL)]
    pub default_model: String,

    /// Address the HTTP server listens on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Extra model aliases, e.g. "gpt-4o=llama3:8b;o1=deepseek-r1:14b".
    #[arg(long, env = "BRIDGE_MODEL_MAP")]
    pub model_map: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            default_model: DEFAULT_BACKEND_MODEL.to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            model_map: None,
        }
    }
}

impl BridgeConfig {
    pub fn model_map(&self) -> ModelMap {
        let overrides = self
            .model_map
            .as_deref()
            .map(parse_model_overrides)
            .unwrap_or_default();
        ModelMap::new(self.default_model.clone()).with_overrides(overrides)
    }

    /// API key with everything past the first four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let visible: String = self.api_key.chars().take(4).collect();
        let hidden = self.api_key.chars().count().saturating_sub(4);
        format!("{}{}", visible, "*".repeat(hidden))
    }

    /// Port part of the bind address, for display.
    pub fn port(&self) -> &str {
        self.bind_addr
            .rsplit_once(':')
            .map(|(_, port)| port)
            .unwrap_or(self.bind_addr.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cfg = BridgeConfig::try_parse_from([
            "ollama-bridge",
            "--ollama-url",
            "http://gpu-box:11434",
            "--default-model",
            "llama3:8b",
            "--model-map",
            "gpt-4o=mistral:7b",
            "--bind-addr",
            "127.0.0.1:9000",
        ])
        .unwrap();
        assert_eq!(cfg.ollama_url, "http://gpu-box:11434");
        assert_eq!(cfg.port(), "9000");
        let map = cfg.model_map();
        assert_eq!(map.resolve("gpt-4o"), "mistral:7b");
        assert_eq!(map.resolve("unknown"), "llama3:8b");
        assert_eq!(map.default_model(), "llama3:8b");
    }

    #[test]
    fn masks_api_key() {
        let cfg = BridgeConfig {
            api_key: "secret-key".into(),
            ..Default::default()
        };
        assert_eq!(cfg.masked_api_key(), "secr******");
        let short = BridgeConfig {
            api_key: "ab".into(),
            ..Default::default()
        };
        assert_eq!(short.masked_api_key(), "ab");
    }
}
