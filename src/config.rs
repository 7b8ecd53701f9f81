//! Sniffer configuration
//!
//! Loaded from JSON, TOML or YAML depending on the file extension, and
//! validated before use.

use crate::artifact::OutputFormat;
use crate::eapol::KEY_DATA_CAPACITY;
use crate::filter::{CaptureMode, TargetSelector};
use crate::{Result, SnifferError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wlan_capture::MacAddr;

/// Main sniffer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnifferConfig {
    /// General settings
    pub general: GeneralConfig,
    /// What to capture
    pub capture: CaptureConfig,
    /// Where artifacts go
    pub output: OutputConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Instance name, shown in logs
    pub name: String,
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Radio channel (1-14)
    pub channel: u8,
    /// Target to arm at startup
    pub target_bssid: Option<String>,
    /// "pmkid" or "mic"
    pub mode: Option<String>,
    /// Largest message 2 key data kept, in bytes
    pub max_key_data: usize,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// serial, json or hashcat
    pub format: String,
    /// ESSID used for hashcat lines
    pub essid: Option<String>,
    /// Artifacts buffered between the frame path and the writer
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Configuration validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub valid: bool,
    /// Validation errors
    pub errors: Vec<String>,
    /// Validation warnings
    pub warnings: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "eapol-sniffer".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            target_bssid: None,
            mode: None,
            max_key_data: KEY_DATA_CAPACITY,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "serial".to_string(),
            essid: None,
            channel_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SnifferConfig {
    /// Target to arm at startup, when both BSSID and mode are configured
    pub fn target(&self) -> Result<Option<TargetSelector>> {
        let (bssid, mode) = match (&self.capture.target_bssid, &self.capture.mode) {
            (Some(bssid), Some(mode)) => (bssid, mode),
            (None, None) => return Ok(None),
            _ => {
                return Err(SnifferError::Config(
                    "target_bssid and mode must be set together".to_string(),
                ))
            }
        };
        let bssid: MacAddr = bssid.parse()?;
        let mode: CaptureMode = mode.parse()?;
        Ok(Some(TargetSelector::new(bssid, mode)))
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        self.output.format.parse()
    }
}

/// Configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    /// Current configuration
    config: SnifferConfig,
    /// Path to configuration file
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        Self::with_config(SnifferConfig::default())
    }

    /// Create configuration manager with config
    pub fn with_config(config: SnifferConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SnifferError::Config(format!("Failed to read config file: {}", e)))?;

        let config: SnifferConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| SnifferError::Config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| SnifferError::Config(format!("Failed to parse TOML config: {}", e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| SnifferError::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => return Err(SnifferError::Config("Unsupported config file format".to_string())),
        };

        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => self.to_json()?,
            Some("toml") => self.to_toml()?,
            Some("yaml") | Some("yml") => self.to_yaml()?,
            _ => return Err(SnifferError::Config("Unsupported config file format".to_string())),
        };

        fs::write(path, content)
            .map_err(|e| SnifferError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get current configuration
    pub fn get_config(&self) -> &SnifferConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, new_config: SnifferConfig) -> Result<()> {
        let validation = self.validate_config(&new_config)?;
        if !validation.valid {
            return Err(SnifferError::Config(format!(
                "Configuration validation failed: {}",
                validation.errors.join(", ")
            )));
        }
        self.config = new_config;
        Ok(())
    }

    /// Validate configuration
    pub fn validate_config(&self, config: &SnifferConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        if config.general.name.is_empty() {
            result.errors.push("Name cannot be empty".to_string());
        }

        if !(1..=14).contains(&config.capture.channel) {
            result.errors.push(format!("Channel {} outside 1-14", config.capture.channel));
        }

        if let Err(e) = config.target() {
            result.errors.push(e.to_string());
        }

        if config.capture.max_key_data == 0 {
            result.warnings.push("max_key_data is 0, every message 2 with key data is dropped".to_string());
        }
        if config.capture.max_key_data > KEY_DATA_CAPACITY {
            result.warnings.push(format!(
                "max_key_data {} capped at {}",
                config.capture.max_key_data, KEY_DATA_CAPACITY
            ));
        }

        match config.output_format() {
            Ok(OutputFormat::Hashcat) if config.output.essid.is_none() => {
                result.warnings.push("Hashcat output without essid, ESSID field left empty".to_string());
            }
            Ok(_) => {}
            Err(e) => result.errors.push(e.to_string()),
        }

        if config.output.channel_capacity == 0 {
            result.errors.push("Output channel capacity cannot be 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            result.errors.push(format!(
                "Invalid log level '{}', must be one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ));
        }

        result.valid = result.errors.is_empty();

        Ok(result)
    }

    /// Reload configuration from file
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| SnifferError::Config("No config file path set".to_string()))?;
        let new_manager = Self::load_from_file(path)?;
        self.update_config(new_manager.config)
    }

    /// Get configuration as JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.config)
            .map_err(|e| SnifferError::Config(format!("Failed to serialize config to JSON: {}", e)))
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| SnifferError::Config(format!("Failed to serialize config to TOML: {}", e)))
    }

    /// Get configuration as YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.config)
            .map_err(|e| SnifferError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffer_config_default() {
        let config = SnifferConfig::default();
        assert_eq!(config.general.name, "eapol-sniffer");
        assert_eq!(config.capture.channel, 1);
        assert_eq!(config.capture.max_key_data, KEY_DATA_CAPACITY);
        assert_eq!(config.output_format().unwrap(), OutputFormat::Serial);
        assert!(config.target().unwrap().is_none());
    }

    #[test]
    fn test_config_validation() {
        let manager = ConfigManager::new();
        let result = manager.validate_config(&SnifferConfig::default()).unwrap();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_config_validation_errors() {
        let manager = ConfigManager::new();
        let mut config = SnifferConfig::default();
        config.capture.channel = 0;
        config.capture.target_bssid = Some("AA:BB:CC:DD:EE:FF".to_string());
        config.logging.level = "loud".to_string();

        let result = manager.validate_config(&config).unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_target_from_config() {
        let mut config = SnifferConfig::default();
        config.capture.target_bssid = Some("aa-bb-cc-dd-ee-ff".to_string());
        config.capture.mode = Some("pmkid".to_string());

        let target = config.target().unwrap().unwrap();
        assert_eq!(target.bssid, MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(target.mode, CaptureMode::Pmkid);

        config.capture.mode = Some("none".to_string());
        assert!(config.target().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SnifferConfig = toml::from_str("[capture]\nchannel = 6\n").unwrap();
        assert_eq!(config.capture.channel, 6);
        assert_eq!(config.output.channel_capacity, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let manager = ConfigManager::new();

        let json = manager.to_json().unwrap();
        assert!(json.contains("eapol-sniffer"));

        let toml = manager.to_toml().unwrap();
        assert!(toml.contains("eapol-sniffer"));

        let yaml = manager.to_yaml().unwrap();
        assert!(yaml.contains("eapol-sniffer"));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("eapol-sniffer-test-{}.yaml", std::process::id()));
        let mut config = SnifferConfig::default();
        config.capture.channel = 11;
        ConfigManager::with_config(config.clone()).save_to_file(&path).unwrap();

        let mut manager = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(manager.get_config(), &config);
        assert_eq!(manager.config_path(), Some(path.as_path()));
        manager.reload().unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(ConfigManager::load_from_file("config.ini").is_err());
    }
}
