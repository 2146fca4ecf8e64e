//! Configuration module for bimigrate.
//!
//! Handles the translation service, fallback templates, formatting, and
//! environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, FallbackSettings, Settings, SettingsError, TranslationSettings,
    CONFIG_ENV_VAR,
};
