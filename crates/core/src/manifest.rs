//! On-disk rule database documents.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Rule;

/// Metadata describing a rule database.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RulebookMeta {
    /// Title of the game or rulebook the rules come from.
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form edition or coverage note.
    #[serde(default)]
    pub edition: Option<String>,
    /// Timestamp of the last content change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RulebookMeta {
    /// Returns a user-facing label combining title and edition.
    pub fn display_name(&self) -> String {
        let title = self.title.as_deref().unwrap_or("Untitled rulebook");
        match self.edition.as_deref() {
            Some(edition) if !edition.is_empty() => format!("{} · {}", title, edition),
            _ => title.to_string(),
        }
    }
}

/// A rule database file: metadata plus rules in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulebookDocument {
    /// Document metadata.
    #[serde(default)]
    pub meta: RulebookMeta,
    /// Rules in declaration order.
    pub rules: Vec<Rule>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Full(RulebookDocument),
    Bare(Vec<Rule>),
}

impl RulebookDocument {
    /// Parse a document, accepting either the full form or a bare rule array.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let raw: RawDocument =
            serde_json::from_str(contents).context("failed to parse rule database")?;
        Ok(match raw {
            RawDocument::Full(document) => document,
            RawDocument::Bare(rules) => RulebookDocument {
                meta: RulebookMeta::default(),
                rules,
            },
        })
    }

    /// Load a document from the given file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read rule database {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("failed to load rule database {}", path.display()))
    }

    /// Persist the document to the given file, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize rule database")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write rule database {}", path.display()))
    }
}
