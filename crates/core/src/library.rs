//! Shared, reloadable handle to the current rule store.

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    store::RuleStore,
    validate::{validate, ValidationIssue},
};

/// Where a library reads its rules from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// The database compiled into the binary.
    Builtin,
    /// A database file or a directory of database files.
    Path(PathBuf),
}

impl RuleSource {
    /// Source for an optional configured path.
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or(RuleSource::Builtin, RuleSource::Path)
    }

    fn load(&self) -> Result<RuleStore> {
        match self {
            RuleSource::Builtin => RuleStore::builtin(),
            RuleSource::Path(path) => RuleStore::load(path),
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Builtin => write!(f, "built-in rules"),
            RuleSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Thread-safe handle to the current rule store.
///
/// The store itself is immutable; reloading swaps in a new one while
/// readers holding the previous `Arc` keep a consistent view.
#[derive(Clone)]
pub struct RuleLibrary {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    source: RuleSource,
    store: Arc<RuleStore>,
    issues: Vec<ValidationIssue>,
}

impl RuleLibrary {
    /// Load rules from `source`.
    pub fn open(source: RuleSource) -> Result<Self> {
        let (store, issues) = load_checked(&source)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                source,
                store,
                issues,
            })),
        })
    }

    /// Current rule store.
    pub fn store(&self) -> Arc<RuleStore> {
        Arc::clone(&self.inner.read().store)
    }

    /// Source the current store was read from.
    pub fn source(&self) -> RuleSource {
        self.inner.read().source.clone()
    }

    /// Validation findings for the current store.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.inner.read().issues.clone()
    }

    /// Re-read the current source. On failure the previous store stays active.
    pub fn reload(&self) -> Result<Arc<RuleStore>> {
        let source = self.source();
        self.refresh(source)
    }

    /// Point the library at a new source and load it.
    pub fn refresh(&self, source: RuleSource) -> Result<Arc<RuleStore>> {
        let (store, issues) = load_checked(&source)?;
        let mut inner = self.inner.write();
        inner.source = source;
        inner.store = Arc::clone(&store);
        inner.issues = issues;
        Ok(store)
    }
}

fn load_checked(source: &RuleSource) -> Result<(Arc<RuleStore>, Vec<ValidationIssue>)> {
    let store = source.load()?;
    let issues = validate(store.rules());
    for issue in &issues {
        warn!(%source, rule = issue.rule_id(), "{issue}");
    }
    info!(
        %source,
        rules = store.len(),
        title = %store.meta().display_name(),
        "Loaded rule database"
    );
    Ok((Arc::new(store), issues))
}
