//! TOML-based configuration for bimigrate.
//!
//! Supports a config file (bimigrate.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [translation]
//! enabled = true
//! base_url = "${TRANSLATOR_URL}"
//! request_timeout_secs = 30
//! max_retries = 2
//! entities = [["&lt;", "<"], ["&gt;", ">"], ["&amp;", "&"]]
//!
//! [format]
//! base_indent = 4
//! step = 4
//!
//! [fallback]
//! include_defaults = true
//!
//! [[fallback.sources]]
//! kind = "snowflake"
//! template = 'Snowflake.Databases("{server}", "{warehouse}")'
//! conditions = [{ field = "class_type", op = "equals", value = "snowflake" }]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fallback::{default_rules, SourceRule};
use crate::format::FormatOptions;
use crate::translate::protocol::paths;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "BIMIGRATE_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Translation service configuration.
    pub translation: TranslationSettings,

    /// Indentation of generated code.
    pub format: FormatOptions,

    /// Fallback templates.
    pub fallback: FallbackSettings,
}

/// Translation service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Use the translation service at all.
    pub enabled: bool,

    /// Service root URL (supports ${ENV_VAR} expansion).
    pub base_url: String,

    pub health_path: String,
    pub convert_path: String,
    pub m_code_path: String,

    /// Timeout of the one-off availability probe.
    pub probe_timeout_secs: u64,

    /// Timeout of each translation request.
    pub request_timeout_secs: u64,

    /// Retries after a failed attempt (transport errors, 5xx, 429).
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further retry.
    pub retry_backoff_ms: u64,

    /// Entity replacements applied in order to translated text.
    pub entities: Vec<(String, String)>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8000".to_string(),
            health_path: paths::HEALTH.to_string(),
            convert_path: paths::CONVERT.to_string(),
            m_code_path: paths::M_CODE.to_string(),
            probe_timeout_secs: 5,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            entities: [
                ("&lt;", "<"),
                ("&gt;", ">"),
                ("&quot;", "\""),
                ("&apos;", "'"),
                ("&amp;", "&"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
        }
    }
}

impl TranslationSettings {
    /// Get the base URL with environment variables expanded.
    pub fn resolved_base_url(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.base_url)
    }
}

/// Fallback template configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Append the built-in rules after the configured ones.
    pub include_defaults: bool,

    /// Configured rules, tried in order before the built-ins.
    pub sources: Vec<SourceRule>,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            include_defaults: true,
            sources: Vec::new(),
        }
    }
}

impl FallbackSettings {
    /// Effective rule list in evaluation order.
    pub fn rules(&self) -> Vec<SourceRule> {
        let mut rules = self.sources.clone();
        if self.include_defaults {
            rules.extend(default_rules());
        }
        rules
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `BIMIGRATE_CONFIG`
    /// 2. `./bimigrate.toml`
    /// 3. `~/.config/bimigrate/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("bimigrate.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bimigrate").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.translation.enabled && self.translation.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "translation.base_url is empty while translation is enabled".to_string(),
            ));
        }
        if self.translation.request_timeout_secs == 0 {
            return Err(SettingsError::InvalidConfig(
                "translation.request_timeout_secs must be positive".to_string(),
            ));
        }
        for (i, rule) in self.fallback.sources.iter().enumerate() {
            if rule.kind.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!(
                    "fallback.sources[{i}] has an empty kind"
                )));
            }
            if rule.template.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!(
                    "fallback source '{}' has an empty template",
                    rule.kind
                )));
            }
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut var_name = String::new();
        if braced {
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
