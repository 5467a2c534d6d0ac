//! Session preset persistence.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::SessionConfig;

/// Directory under the user's config directory used for presets.
pub const DEFAULT_PRESET_DIR: &str = "hf4a-rulebook/presets";

/// Metadata describing a persisted preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEntry {
    /// Absolute path to the preset file on disk.
    pub path: PathBuf,
    /// Human readable preset name.
    pub name: String,
    /// Timestamp when the preset was last written.
    pub updated_at: DateTime<Utc>,
}

/// Serialized representation of a preset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetPayload {
    name: String,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    session: SessionConfig,
}

impl PresetPayload {
    fn new(name: Option<&str>, session: SessionConfig) -> Self {
        let display_name = name
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
            .unwrap_or_else(|| default_preset_name(&session));
        Self {
            name: display_name,
            saved_at: Utc::now(),
            session,
        }
    }

    /// Preset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the stored selection.
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Consume the payload and return the stored selection.
    pub fn into_session(self) -> SessionConfig {
        self.session
    }

    fn entry(&self, path: PathBuf) -> PresetEntry {
        PresetEntry {
            path,
            name: self.name.clone(),
            updated_at: self.saved_at,
        }
    }
}

/// Name used when the user does not supply one.
pub fn default_preset_name(session: &SessionConfig) -> String {
    format!("Session ({})", session.summary())
}

/// Manager responsible for loading and writing preset files.
pub struct PresetManager {
    root: PathBuf,
}

impl PresetManager {
    /// Create a new manager rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_PRESET_DIR)
    }

    /// Directory presets are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return all known presets sorted by timestamp (most recent first).
    pub fn entries(&self) -> Result<Vec<PresetEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to read preset directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.read_payload(entry.path()) {
                Ok(payload) => entries.push(payload.entry(entry.path())),
                Err(err) => {
                    warn!("Failed to read preset {:?}: {err:#}", entry.path());
                }
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }

    /// Save a selection under `name` and return the resulting entry.
    pub fn create(&self, name: Option<&str>, session: &SessionConfig) -> Result<PresetEntry> {
        let payload = PresetPayload::new(name, session.clone());
        let file_name = format!(
            "{}_{}.json",
            sanitize_component(&payload.name),
            payload.saved_at.format("%Y%m%d%H%M%S%3f")
        );
        let path = self.root.join(file_name);
        self.write_payload(&path, &payload)?;
        Ok(payload.entry(path))
    }

    /// Overwrite an existing preset with a new selection.
    pub fn update(&self, entry: &PresetEntry, session: &SessionConfig) -> Result<PresetEntry> {
        let mut payload = self.read_payload(&entry.path)?;
        payload.session = session.clone();
        payload.saved_at = Utc::now();
        self.write_payload(&entry.path, &payload)?;
        Ok(payload.entry(entry.path.clone()))
    }

    /// Load payload for the provided entry.
    pub fn load(&self, entry: &PresetEntry) -> Result<PresetPayload> {
        self.read_payload(&entry.path)
    }

    /// Load most recent preset entry, if any.
    pub fn latest(&self) -> Result<Option<PresetEntry>> {
        let entries = self.entries()?;
        Ok(entries.into_iter().next())
    }

    /// Remove a preset from disk.
    pub fn delete(&self, entry: &PresetEntry) -> Result<()> {
        fs::remove_file(&entry.path)
            .with_context(|| format!("failed to delete {}", entry.path.display()))
    }

    fn write_payload(&self, path: &Path, payload: &PresetPayload) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialised = serde_json::to_vec_pretty(payload)?;
        fs::write(path, serialised).with_context(|| format!("failed to write {}", path.display()))
    }

    fn read_payload(&self, path: impl AsRef<Path>) -> Result<PresetPayload> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let payload = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(payload)
    }
}

fn sanitize_component(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
            result.push(ch);
        }
    }
    if result.is_empty() {
        "preset".to_string()
    } else {
        result
    }
}
