use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocuChatError, Result};

/// Top-level configuration for the DocuChat server.
///
/// Loaded from `~/.docuchat/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocuChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Default for DocuChatConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            gateway: GatewayConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl DocuChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocuChatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocuChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.docuchat/data".to_string(),
            log_level: "info".to_string(),
            port: 5000,
        }
    }
}

/// Language-model gateway (Ollama) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model used when a chat request names none.
    pub default_model: String,
    /// Timeout for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout for streaming generation. Generation can be slow, so
    /// this is on the order of minutes.
    pub read_timeout_secs: u64,
    /// Overall timeout for short auxiliary requests such as listing models.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama2".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 300,
            request_timeout_secs: 10,
        }
    }
}

/// Chat behavior settings.
///
/// The thresholds are configuration so they stay visible and testable.
/// Changing them changes observable chat behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of recent messages included in the prompt as history.
    pub history_window: usize,
    /// Documents whose trimmed content is shorter than this are refused.
    pub min_content_chars: usize,
    /// Responses at or below this length are never checked for references.
    pub reference_min_chars: usize,
    /// Responses at or below this length never receive a grounding warning.
    pub warn_min_chars: usize,
    /// Content budget (in characters) for summary generation prompts.
    pub summary_content_budget: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            min_content_chars: 10,
            reference_min_chars: 50,
            warn_min_chars: 20,
            summary_content_budget: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DocuChatConfig::default();
        assert_eq!(config.general.port, 5000);
        assert_eq!(config.gateway.base_url, "http://localhost:11434");
        assert_eq!(config.gateway.default_model, "llama2");
        assert_eq!(config.chat.history_window, 6);
        assert_eq!(config.chat.min_content_chars, 10);
        assert_eq!(config.chat.reference_min_chars, 50);
        assert_eq!(config.chat.warn_min_chars, 20);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = DocuChatConfig::default();
        config.general.port = 8080;
        config.gateway.default_model = "mistral".to_string();
        config.save(&path).unwrap();

        let loaded = DocuChatConfig::load(&path).unwrap();
        assert_eq!(loaded.general.port, 8080);
        assert_eq!(loaded.gateway.default_model, "mistral");
        // Untouched sections keep defaults.
        assert_eq!(loaded.chat.history_window, 6);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(DocuChatConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = DocuChatConfig::load_or_default(&path);
        assert_eq!(config.general.port, 5000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[gateway]\ndefault_model = \"phi3\"\n").unwrap();

        let config = DocuChatConfig::load(&path).unwrap();
        assert_eq!(config.gateway.default_model, "phi3");
        assert_eq!(config.gateway.base_url, "http://localhost:11434");
        assert_eq!(config.general.port, 5000);
    }

    #[test]
    fn test_invalid_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "general = [[[").unwrap();
        assert!(DocuChatConfig::load(&path).is_err());
    }
}
