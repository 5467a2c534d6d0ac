//! Application configuration.
//!
//! Settings come from `<config_dir>/hf4a-rulebook/config.toml`, overridden by
//! `RULEBOOK_*` environment variables (`__` separates nested keys).

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{
    library::RuleSource,
    models::{ModuleId, SessionConfig},
    save::PresetManager,
};

/// Directory under the user's config directory holding `config.toml`.
pub const CONFIG_DIR: &str = "hf4a-rulebook";

const DEFAULT_CONFIG: &str = r#"# Rule database file or directory. Leave unset to use the built-in rules.
# database = "/path/to/rules.json"

# Where session presets are stored.
# presets_dir = "/path/to/presets"

# Scenario and variant names offered alongside those found in the rules.
scenarios = ["Standard Game"]
variants = ["Quick Start"]

[module_names]
0 = "Politics"

# Selection applied at start-up.
[default_session]
modules = []
scenario = ""
variants = []
"#;

/// User-facing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Rule database file or directory; `None` uses the built-in rules.
    pub database: Option<PathBuf>,
    /// Override for the preset directory.
    pub presets_dir: Option<PathBuf>,
    /// Extra scenario names offered in the session picker.
    pub scenarios: Vec<String>,
    /// Extra variant names offered in the session picker.
    pub variants: Vec<String>,
    /// Display names keyed by module id.
    pub module_names: BTreeMap<String, String>,
    /// Selection applied at start-up.
    pub default_session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            presets_dir: None,
            scenarios: vec!["Standard Game".to_string()],
            variants: vec!["Quick Start".to_string()],
            module_names: BTreeMap::from([("0".to_string(), "Politics".to_string())]),
            default_session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("RULEBOOK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Rule source selected by this configuration.
    pub fn rule_source(&self) -> RuleSource {
        RuleSource::from_option(self.database.clone())
    }

    /// Preset manager for the configured directory.
    pub fn preset_manager(&self) -> PresetManager {
        let root = self
            .presets_dir
            .clone()
            .unwrap_or_else(PresetManager::default_root);
        PresetManager::new(root)
    }

    /// Display label for a module.
    pub fn module_label(&self, module: ModuleId) -> String {
        match self.module_names.get(&module.to_string()) {
            Some(name) => format!("Module {module} · {name}"),
            None => format!("Module {module}"),
        }
    }

    /// One-line session summary using configured module names.
    pub fn session_summary(&self, session: &SessionConfig) -> String {
        session.summary_with(|module| self.module_label(module))
    }

    /// Module ids named in the configuration.
    pub fn named_modules(&self) -> Vec<ModuleId> {
        self.module_names
            .keys()
            .filter_map(|key| key.trim().parse().ok())
            .collect()
    }
}

/// Path of the user's config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Write the commented default config if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    ensure_default_config_at(&path)?;
    Ok(path)
}

/// Write the commented default config to `path` if it does not exist.
pub fn ensure_default_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}
