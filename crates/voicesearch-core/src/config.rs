use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoiceSearchError};
use crate::types::{LanguageModel, RecognitionOptions};

/// Top-level configuration for the voice search plugin host.
///
/// Loaded from `~/.voicesearch/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceSearchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl VoiceSearchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoiceSearchConfig = toml::from_str(&content)?;
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
            toml::to_string_pretty(self).map_err(|e| VoiceSearchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Request channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel name the plugin registers its method handler on.
    pub name: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "voice_search".to_string(),
        }
    }
}

/// Fixed options passed to the recognizer on every session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub language_model: LanguageModel,
    /// Locale tag; leave unset to use the platform default locale.
    pub locale: Option<String>,
    pub max_results: u32,
    pub prompt: String,
    pub partial_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        let options = RecognitionOptions::default();
        Self {
            language_model: options.language_model,
            locale: options.locale,
            max_results: options.max_results,
            prompt: options.prompt,
            partial_results: options.partial_results,
        }
    }
}

impl RecognitionConfig {
    /// Build the recognizer options. `max_results` is clamped to at least 1.
    pub fn options(&self) -> RecognitionOptions {
        RecognitionOptions {
            language_model: self.language_model,
            locale: self.locale.clone().filter(|l| !l.trim().is_empty()),
            max_results: self.max_results.max(1),
            prompt: self.prompt.clone(),
            partial_results: self.partial_results,
        }
    }
}

/// Behaviour of the simulated recognizer used by the standalone binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Whether the simulated recognizer reports itself available.
    pub available: bool,
    /// Whether the simulated microphone permission is granted.
    pub permission_granted: bool,
    /// Text delivered when a session completes.
    pub transcript: String,
    /// When set, sessions fail with this platform error code instead.
    pub error_code: Option<i32>,
    /// Delay between start and the terminal event.
    pub latency_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            available: true,
            permission_granted: true,
            transcript: "turn left".to_string(),
            error_code: None,
            latency_ms: 1500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = VoiceSearchConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.channel.name, "voice_search");
        assert_eq!(config.recognition.language_model, LanguageModel::FreeForm);
        assert!(config.recognition.locale.is_none());
        assert_eq!(config.recognition.max_results, 1);
        assert_eq!(config.recognition.prompt, "Speak now...");
        assert!(config.simulator.available);
        assert!(config.simulator.permission_granted);
        assert_eq!(config.simulator.transcript, "turn left");
        assert!(config.simulator.error_code.is_none());
        assert_eq!(config.simulator.latency_ms, 1500);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[channel]
name = "dictation"

[recognition]
language_model = "web_search"
locale = "de-DE"
max_results = 3
prompt = "Sprich jetzt..."
partial_results = true

[simulator]
available = false
permission_granted = false
transcript = "hello"
error_code = 7
latency_ms = 10
"#;
        let file = create_temp_config(content);
        let config = VoiceSearchConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.channel.name, "dictation");
        assert_eq!(config.recognition.language_model, LanguageModel::WebSearch);
        assert_eq!(config.recognition.locale.as_deref(), Some("de-DE"));
        assert_eq!(config.recognition.max_results, 3);
        assert_eq!(config.recognition.prompt, "Sprich jetzt...");
        assert!(config.recognition.partial_results);
        assert!(!config.simulator.available);
        assert!(!config.simulator.permission_granted);
        assert_eq!(config.simulator.error_code, Some(7));
        assert_eq!(config.simulator.latency_ms, 10);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[simulator]
transcript = "go north"
"#;
        let file = create_temp_config(content);
        let config = VoiceSearchConfig::load(file.path()).unwrap();
        assert_eq!(config.simulator.transcript, "go north");
        assert!(config.simulator.available);
        assert_eq!(config.channel.name, "voice_search");
        assert_eq!(config.recognition.prompt, "Speak now...");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = VoiceSearchConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.recognition.max_results, 1);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = VoiceSearchConfig::load(file.path());
        assert!(matches!(result, Err(VoiceSearchError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = VoiceSearchConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.channel.name, "voice_search");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = VoiceSearchConfig::default();
        config.simulator.transcript = "saved".to_string();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = VoiceSearchConfig::load(&path).unwrap();
        assert_eq!(reloaded.simulator.transcript, "saved");
        assert_eq!(reloaded.recognition.prompt, config.recognition.prompt);
    }

    #[test]
    fn test_recognition_options_clamp_and_blank_locale() {
        let recognition = RecognitionConfig {
            max_results: 0,
            locale: Some("  ".to_string()),
            ..RecognitionConfig::default()
        };
        let options = recognition.options();
        assert_eq!(options.max_results, 1);
        assert!(options.locale.is_none());
    }

    #[test]
    fn test_recognition_options_match_defaults() {
        assert_eq!(
            RecognitionConfig::default().options(),
            RecognitionOptions::default()
        );
    }
}
