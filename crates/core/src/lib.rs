#![warn(clippy::all, missing_docs)]

//! Session rulebook engine for High Frontier.
//!
//! This crate hosts the rule data model, the immutable rule store, the
//! session resolver, offline validation, configuration handling and preset
//! persistence used by the terminal UI and any future frontends.

pub mod config;
pub mod crossref;
pub mod library;
pub mod manifest;
pub mod models;
pub mod resolver;
pub mod save;
pub mod store;
pub mod validate;

pub use config::AppConfig;
pub use library::{RuleLibrary, RuleSource};
pub use manifest::{RulebookDocument, RulebookMeta};
pub use models::{ModuleId, Rule, ScenarioScope, SessionConfig, ALL_SCENARIOS};
pub use resolver::{explain, resolve, Exclusion, RuleStatus, Rulebook, Section};
pub use save::{PresetEntry, PresetManager};
pub use store::RuleStore;
pub use validate::{validate, ValidationIssue};
