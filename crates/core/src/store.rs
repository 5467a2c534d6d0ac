//! The immutable rule database.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::{
    crossref::reference_target,
    manifest::{RulebookDocument, RulebookMeta},
    models::{ModuleId, Rule, SessionConfig},
    resolver::{self, RuleStatus, Rulebook},
};

/// Rule database compiled into the binary.
const BUILTIN_RULES: &str = include_str!("../data/rules.json");

/// Ordered, read-only collection of rules.
///
/// Cloning is cheap; the rules are shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RuleStore {
    meta: RulebookMeta,
    rules: Arc<[Rule]>,
}

impl RuleStore {
    /// Build a store from rules in declaration order.
    pub fn new(meta: RulebookMeta, rules: Vec<Rule>) -> Self {
        Self {
            meta,
            rules: rules.into(),
        }
    }

    /// Store over the embedded High Frontier rule set.
    pub fn builtin() -> Result<Self> {
        let document = RulebookDocument::from_json_str(BUILTIN_RULES)
            .context("embedded rule database is malformed")?;
        Ok(Self::from(document))
    }

    /// Load a database file, or every `*.json` file beneath a directory.
    ///
    /// Directory contents are concatenated in file-name order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return RulebookDocument::load(path).map(Self::from);
        }

        let mut meta: Option<RulebookMeta> = None;
        let mut rules = Vec::new();
        for file in database_files(path)? {
            let document = RulebookDocument::load(&file)?;
            if meta.is_none() && document.meta.title.is_some() {
                meta = Some(document.meta);
            }
            rules.extend(document.rules);
        }
        Ok(Self::new(meta.unwrap_or_default(), rules))
    }

    /// Database metadata.
    pub fn meta(&self) -> &RulebookMeta {
        &self.meta
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Iterate rules in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Shared handle to the full collection.
    pub fn snapshot(&self) -> Arc<[Rule]> {
        Arc::clone(&self.rules)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True for an empty database.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Resolve a textual reference like `O6b`, falling back to its parent rule.
    pub fn lookup_reference(&self, reference: &str) -> Option<&Rule> {
        self.get(reference)
            .or_else(|| self.get(reference_target(reference)))
    }

    /// Every module id some rule depends on.
    pub fn modules(&self) -> BTreeSet<ModuleId> {
        self.rules
            .iter()
            .flat_map(|rule| rule.required_modules.iter().copied())
            .collect()
    }

    /// Every named scenario referenced by the rules.
    pub fn scenarios(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.scenarios.names())
            .map(str::to_string)
            .collect()
    }

    /// Every variant some rule depends on.
    pub fn variants(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.required_variants.iter().cloned())
            .collect()
    }

    /// Filter rules using a case-insensitive substring search.
    pub fn matching(&self, query: &str) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches_query(query))
            .collect()
    }

    /// Resolve the rulebook for a session.
    pub fn resolve(&self, session: &SessionConfig) -> Rulebook<'_> {
        Rulebook::resolve(self.rules.iter(), session)
    }

    /// Status of every rule for a session.
    pub fn explain(&self, session: &SessionConfig) -> Vec<(&Rule, RuleStatus)> {
        resolver::explain(self.rules.iter(), session)
    }
}

impl From<RulebookDocument> for RuleStore {
    fn from(document: RulebookDocument) -> Self {
        Self::new(document.meta, document.rules)
    }
}

impl<'a> IntoIterator for &'a RuleStore {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn database_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builtin_database_loads_in_declaration_order() -> Result<()> {
        let store = RuleStore::builtin()?;
        assert_eq!(store.len(), 15);
        assert_eq!(store.rules()[0].id, "A1");
        assert_eq!(store.meta().title.as_deref(), Some("High Frontier 4 All"));
        assert_eq!(store.modules(), BTreeSet::from([0]));
        assert!(store.scenarios().is_empty());
        assert!(store.variants().is_empty());
        Ok(())
    }

    #[test]
    fn builtin_core_session_uses_income_operation() -> Result<()> {
        let store = RuleStore::builtin()?;
        let book = store.resolve(&SessionConfig::new());
        assert_eq!(
            book.ids(),
            vec!["A1", "A2", "D1", "D2", "F4c", "I1", "B6a"]
        );
        Ok(())
    }

    #[test]
    fn builtin_politics_session_replaces_income_with_fundraise() -> Result<()> {
        let store = RuleStore::builtin()?;
        let session = SessionConfig::new()
            .with_module(0)
            .with_scenario("Standard Game");
        let book = store.resolve(&session);
        let ids = book.ids();
        assert!(!ids.contains(&"I1"));
        assert!(ids.contains(&"O2"));
        assert_eq!(ids.len(), 14);
        Ok(())
    }

    #[test]
    fn lookup_reference_falls_back_to_parent_rule() -> Result<()> {
        let store = RuleStore::builtin()?;
        let id = |reference: &str| store.lookup_reference(reference).map(|r| r.id.clone());
        assert_eq!(id("F4c").as_deref(), Some("F4c"));
        assert_eq!(id("O6b").as_deref(), Some("O6"));
        assert!(store.lookup_reference("Z9").is_none());
        Ok(())
    }

    #[test]
    fn matching_is_case_insensitive() -> Result<()> {
        let store = RuleStore::builtin()?;
        let hits: Vec<&str> = store
            .matching("FUNDRAISE")
            .into_iter()
            .map(|rule| rule.id.as_str())
            .collect();
        assert!(hits.contains(&"O2"));
        assert!(hits.contains(&"I1"));
        assert_eq!(store.matching("  ").len(), store.len());
        Ok(())
    }

    #[test]
    fn loads_directory_in_file_name_order() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("20_module0.json"),
            r#"[{ "id": "O2", "section": "O2", "title": "Fundraise", "text": "",
                 "modules": [0], "scenarios": ["all"], "supersedes": "I1" }]"#,
        )?;
        fs::write(
            dir.path().join("10_core.json"),
            r#"{ "meta": { "title": "Core" },
                 "rules": [{ "id": "I1", "section": "I1", "title": "Income", "text": "",
                             "scenarios": ["all"] }] }"#,
        )?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let store = RuleStore::load(dir.path())?;
        let ids: Vec<&str> = store.iter().map(|rule| rule.id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "O2"]);
        assert_eq!(store.meta().title.as_deref(), Some("Core"));
        assert_eq!(
            store.resolve(&SessionConfig::new().with_module(0)).ids(),
            vec!["O2"]
        );
        Ok(())
    }

    #[test]
    fn snapshot_shares_rules() -> Result<()> {
        let store = RuleStore::builtin()?;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), store.len());
        assert!(std::ptr::eq(snapshot.as_ptr(), store.rules().as_ptr()));
        Ok(())
    }
}
