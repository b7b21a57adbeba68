use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cottage::{CapacityMap, CottageInfo, CottageRegistry};
use crate::error::Result;

/// Top-level configuration for the concierge.
///
/// Loaded from `~/.concierge/config.toml` by default. Each section
/// corresponds to one stage of the decision pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConciergeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub capacity: CapacityMap,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Replaces the built-in cottage inventory when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cottages: Option<Vec<CottageInfo>>,
}

impl ConciergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConciergeConfig = toml::from_str(&content)?;
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
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Build the cottage registry described by this configuration.
    pub fn registry(&self) -> Result<CottageRegistry> {
        let capacity = CapacityMap::new(self.capacity.base_capacity, self.capacity.max_capacity);
        match &self.cottages {
            Some(records) => CottageRegistry::from_records(records.clone(), capacity),
            None => Ok(CottageRegistry::builtin(capacity)),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// JSON file of passages served by the built-in retriever.
    pub knowledge_path: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            knowledge_path: None,
        }
    }
}

/// Conversation handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    /// Exchanges kept per session; `None` keeps everything.
    pub history_capacity: Option<usize>,
    /// Maximum utterance length in characters.
    pub max_message_length: usize,
    /// Idle minutes before a session is discarded.
    pub session_timeout_minutes: u32,
    /// Passages requested from the retriever per turn.
    pub top_k: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_capacity: Some(5),
            max_message_length: 2000,
            session_timeout_minutes: 30,
            top_k: 5,
        }
    }
}

/// Generation backend call limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Per-call timeout for classification, scoring and refinement.
    pub timeout_ms: u64,
    pub classification_max_tokens: usize,
    /// Budget for rewriting a refined follow-up into a standalone question.
    pub rewrite_max_tokens: usize,
    pub generation_max_tokens: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            classification_max_tokens: 8,
            rewrite_max_tokens: 48,
            generation_max_tokens: 512,
        }
    }
}

/// Refinement detection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Longest utterance checked with the keyword rules.
    pub max_words: usize,
    /// Longest utterance checked with the anchored-phrase rule.
    pub anchored_max_words: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_words: 5,
            anchored_max_words: 8,
        }
    }
}

/// Confidence scoring and fallback thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Fallback triggers when both scores fall below this value.
    pub fallback_threshold: f32,
    /// Similarity assumed when the retriever reports no scores.
    pub neutral_similarity: f32,
    /// Document count that earns the full count component.
    pub target_doc_count: usize,
    /// Keyword count above which a backend relevance judgement is blended in.
    pub backend_blend_min_keywords: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.3,
            neutral_similarity: 0.5,
            target_doc_count: 5,
            backend_blend_min_keywords: 3,
        }
    }
}

/// Tariff used for deterministic price estimates.
///
/// Rates are per cottage per night. Without rates the pricing analysis
/// explains the policy but never quotes a total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub currency: String,
    pub weekday_rate: Option<u32>,
    pub weekend_rate: Option<u32>,
    /// Charge per guest per night above base capacity.
    pub extra_guest_rate: Option<u32>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            weekday_rate: None,
            weekend_rate: None,
            extra_guest_rate: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConciergeError;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ConciergeConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.chat.enabled);
        assert_eq!(config.chat.history_capacity, Some(5));
        assert_eq!(config.backend.timeout_ms, 2000);
        assert_eq!(config.backend.rewrite_max_tokens, 48);
        assert_eq!(config.capacity.base_capacity, 6);
        assert_eq!(config.capacity.max_capacity, 9);
        assert_eq!(config.refinement.max_words, 5);
        assert_eq!(config.confidence.fallback_threshold, 0.3);
        assert!(config.pricing.weekday_rate.is_none());
        assert!(config.cottages.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
knowledge_path = "/srv/knowledge.json"

[chat]
history_capacity = 3
top_k = 8

[backend]
timeout_ms = 500

[pricing]
currency = "USD"
weekday_rate = 120
weekend_rate = 150
extra_guest_rate = 20
"#;
        let file = create_temp_config(content);
        let config = ConciergeConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(
            config.general.knowledge_path.as_deref(),
            Some("/srv/knowledge.json")
        );
        assert_eq!(config.chat.history_capacity, Some(3));
        assert_eq!(config.chat.top_k, 8);
        assert!(config.chat.enabled);
        assert_eq!(config.backend.timeout_ms, 500);
        assert_eq!(config.pricing.weekend_rate, Some(150));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = ConciergeConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.chat.max_message_length, 2000);
        assert_eq!(config.confidence.target_doc_count, 5);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[chat\nenabled = ");
        let err = ConciergeConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConciergeError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConciergeConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConciergeConfig::default();
        config.pricing.weekday_rate = Some(4500);
        config.save(&path).unwrap();

        let reloaded = ConciergeConfig::load(&path).unwrap();
        assert_eq!(reloaded.pricing.weekday_rate, Some(4500));
        assert_eq!(reloaded.chat.top_k, config.chat.top_k);
    }

    #[test]
    fn test_registry_builtin_by_default() {
        let registry = ConciergeConfig::default().registry().unwrap();
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn test_registry_from_configured_cottages() {
        let content = r#"
[capacity]
base_capacity = 4
max_capacity = 12

[[cottages]]
number = "1"
bedrooms = 3
base_capacity = 6
max_capacity = 10
description = "Riverside"
recommended = true
"#;
        let file = create_temp_config(content);
        let config = ConciergeConfig::load(file.path()).unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 1);
        let one = registry.get("1").unwrap();
        assert_eq!(one.max_capacity, 9);
        assert_eq!(registry.capacity().base_capacity, 4);
        assert_eq!(registry.inventory().recommended, vec!["Cottage 1"]);
    }
}
