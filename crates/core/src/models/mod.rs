//! Shared domain models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of an optional expansion module (`0` = Politics, ...).
pub type ModuleId = u32;

/// Sentinel used in rule data to mark a rule as valid for every scenario.
pub const ALL_SCENARIOS: &str = "all";

/// A single immutable entry in the rule database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rulebook reference (e.g. `A1`, `O2`, `F4c`).
    pub id: String,
    /// Display grouping label.
    pub section: String,
    /// Human-readable rule title.
    pub title: String,
    /// Full rule text.
    pub text: String,
    /// Modules that must all be active. Empty means base game.
    #[serde(rename = "modules", default)]
    pub required_modules: BTreeSet<ModuleId>,
    /// Scenarios this rule applies to.
    pub scenarios: ScenarioScope,
    /// Variants that must all be active. Empty means no variant precondition.
    #[serde(rename = "variants", default)]
    pub required_variants: BTreeSet<String>,
    /// Id of the rule this one replaces while active.
    #[serde(default)]
    pub supersedes: Option<String>,
}

impl Rule {
    /// Returns true when every required module is active.
    pub fn modules_satisfied(&self, session: &SessionConfig) -> bool {
        self.required_modules.is_subset(&session.active_modules)
    }

    /// Returns true when the rule targets every scenario or the selected one.
    pub fn scenario_matches(&self, session: &SessionConfig) -> bool {
        self.scenarios.matches(&session.scenario)
    }

    /// Returns true when every required variant is active.
    pub fn variants_satisfied(&self, session: &SessionConfig) -> bool {
        self.required_variants.is_subset(&session.active_variants)
    }

    /// Module, scenario and variant preconditions all hold for `session`.
    pub fn applies_to(&self, session: &SessionConfig) -> bool {
        self.modules_satisfied(session)
            && self.scenario_matches(session)
            && self.variants_satisfied(session)
    }

    /// Case-insensitive substring match against id, section, title and text.
    ///
    /// A blank query matches every rule.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.id.to_lowercase().contains(&needle)
            || self.section.to_lowercase().contains(&needle)
            || self.title.to_lowercase().contains(&needle)
            || self.text.to_lowercase().contains(&needle)
    }

    /// True for rules without any module, scenario or variant precondition.
    pub fn is_core(&self) -> bool {
        self.required_modules.is_empty()
            && self.required_variants.is_empty()
            && self.scenarios.is_all()
    }
}

/// Scenario applicability of a rule.
///
/// Serialized as a list of names where the `"all"` sentinel anywhere in the
/// list widens the scope to every scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum ScenarioScope {
    /// Valid for every scenario, including "no scenario selected".
    #[default]
    All,
    /// Valid only for the listed scenario names (exact, case-sensitive).
    Only(BTreeSet<String>),
}

impl ScenarioScope {
    /// Scope limited to the given scenario names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(names.into_iter().map(Into::into).collect::<Vec<String>>())
    }

    /// Whether `scenario` falls inside this scope.
    pub fn matches(&self, scenario: &str) -> bool {
        match self {
            ScenarioScope::All => true,
            ScenarioScope::Only(names) => names.contains(scenario),
        }
    }

    /// Whether this is the universal scope.
    pub fn is_all(&self) -> bool {
        matches!(self, ScenarioScope::All)
    }

    /// Named scenarios; empty for [`ScenarioScope::All`].
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names = match self {
            ScenarioScope::All => None,
            ScenarioScope::Only(names) => Some(names),
        };
        names.into_iter().flatten().map(String::as_str)
    }
}

impl From<Vec<String>> for ScenarioScope {
    fn from(names: Vec<String>) -> Self {
        if names.iter().any(|name| name == ALL_SCENARIOS) {
            ScenarioScope::All
        } else {
            ScenarioScope::Only(names.into_iter().collect())
        }
    }
}

impl From<ScenarioScope> for Vec<String> {
    fn from(scope: ScenarioScope) -> Self {
        match scope {
            ScenarioScope::All => vec![ALL_SCENARIOS.to_string()],
            ScenarioScope::Only(names) => names.into_iter().collect(),
        }
    }
}

/// User selections describing one play session.
///
/// Every field is optional in serialized form; missing values mean
/// "nothing active" and an empty scenario means none was chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Active expansion modules.
    #[serde(rename = "modules")]
    pub active_modules: BTreeSet<ModuleId>,
    /// Selected scenario name, empty when none is chosen.
    pub scenario: String,
    /// Active variant names.
    #[serde(rename = "variants")]
    pub active_variants: BTreeSet<String>,
}

#[allow(missing_docs)]
impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: ModuleId) -> Self {
        self.active_modules.insert(module);
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.active_variants.insert(variant.into());
        self
    }

    /// Flip a module on or off, returning whether it is now active.
    pub fn toggle_module(&mut self, module: ModuleId) -> bool {
        if !self.active_modules.remove(&module) {
            self.active_modules.insert(module);
            return true;
        }
        false
    }

    /// Flip a variant on or off, returning whether it is now active.
    pub fn toggle_variant(&mut self, variant: &str) -> bool {
        if !self.active_variants.remove(variant) {
            self.active_variants.insert(variant.to_string());
            return true;
        }
        false
    }

    /// Short one-line description used in logs and status lines.
    pub fn summary(&self) -> String {
        let ids: Vec<String> = self.active_modules.iter().map(|m| m.to_string()).collect();
        self.render_summary(format!("modules {}", ids.join(",")))
    }

    /// Like [`SessionConfig::summary`], naming each module with `label`.
    pub fn summary_with(&self, label: impl Fn(ModuleId) -> String) -> String {
        let labels: Vec<String> = self.active_modules.iter().map(|m| label(*m)).collect();
        self.render_summary(labels.join(", "))
    }

    fn render_summary(&self, modules: String) -> String {
        let modules = if self.active_modules.is_empty() {
            "core only".to_string()
        } else {
            modules
        };
        let scenario = if self.scenario.is_empty() {
            "no scenario"
        } else {
            self.scenario.as_str()
        };
        let mut summary = format!("{modules} · {scenario}");
        if !self.active_variants.is_empty() {
            let variants: Vec<&str> = self.active_variants.iter().map(String::as_str).collect();
            summary.push_str(&format!(" · {}", variants.join(", ")));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(modules: &[ModuleId], scenarios: ScenarioScope, variants: &[&str]) -> Rule {
        Rule {
            id: "X1".to_string(),
            section: "X1".to_string(),
            title: "Test".to_string(),
            text: String::new(),
            required_modules: modules.iter().copied().collect(),
            scenarios,
            required_variants: variants.iter().map(|v| v.to_string()).collect(),
            supersedes: None,
        }
    }

    #[test]
    fn module_requirements_use_and_semantics() {
        let rule = rule(&[0, 1], ScenarioScope::All, &[]);
        assert!(!rule.applies_to(&SessionConfig::new().with_module(0)));
        assert!(rule.applies_to(&SessionConfig::new().with_module(0).with_module(1)));
        assert!(rule.applies_to(
            &SessionConfig::new()
                .with_module(0)
                .with_module(1)
                .with_module(2)
        ));
    }

    #[test]
    fn all_sentinel_matches_every_scenario() {
        let rule = rule(&[], ScenarioScope::All, &[]);
        assert!(rule.applies_to(&SessionConfig::new()));
        assert!(rule.applies_to(&SessionConfig::new().with_scenario("Standard Game")));
    }

    #[test]
    fn named_scenarios_match_exactly() {
        let rule = rule(&[], ScenarioScope::only(["Standard Game"]), &[]);
        assert!(rule.applies_to(&SessionConfig::new().with_scenario("Standard Game")));
        assert!(!rule.applies_to(&SessionConfig::new().with_scenario("standard game")));
        assert!(!rule.applies_to(&SessionConfig::new()));
    }

    #[test]
    fn variant_requirements_need_every_variant() {
        let rule = rule(&[], ScenarioScope::All, &["QuickStart"]);
        assert!(!rule.applies_to(&SessionConfig::new()));
        assert!(rule.applies_to(&SessionConfig::new().with_variant("QuickStart")));
    }

    #[test]
    fn sentinel_anywhere_widens_scope() {
        let scope = ScenarioScope::from(vec!["Duel".to_string(), "all".to_string()]);
        assert!(scope.is_all());
        let json: Vec<String> = ScenarioScope::All.into();
        assert_eq!(json, vec!["all".to_string()]);
    }

    #[test]
    fn deserializes_database_shape() -> anyhow::Result<()> {
        let rule: Rule = serde_json::from_str(
            r#"{
                "id": "O2", "section": "O2", "title": "Fundraise", "text": "...",
                "modules": [0], "scenarios": ["all"], "variants": [], "supersedes": "I1"
            }"#,
        )?;
        assert_eq!(rule.required_modules, BTreeSet::from([0]));
        assert!(rule.scenarios.is_all());
        assert_eq!(rule.supersedes.as_deref(), Some("I1"));
        Ok(())
    }

    #[test]
    fn session_config_fields_default_when_missing() -> anyhow::Result<()> {
        let session: SessionConfig = serde_json::from_str(r#"{ "modules": [0] }"#)?;
        assert_eq!(session, SessionConfig::new().with_module(0));

        let mut session = SessionConfig::new();
        assert!(session.toggle_variant("Quick Start"));
        assert!(!session.toggle_variant("Quick Start"));
        assert!(session.active_variants.is_empty());
        Ok(())
    }

    #[test]
    fn summaries_share_one_layout() {
        let session = SessionConfig::new()
            .with_module(0)
            .with_module(2)
            .with_scenario("Standard Game")
            .with_variant("Quick Start");
        assert_eq!(
            session.summary(),
            "modules 0,2 · Standard Game · Quick Start"
        );
        assert_eq!(
            session.summary_with(|module| format!("M{module}")),
            "M0, M2 · Standard Game · Quick Start"
        );
        assert_eq!(
            SessionConfig::new().summary_with(|module| format!("M{module}")),
            "core only · no scenario"
        );
    }
}
