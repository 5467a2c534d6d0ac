//! Session rule resolution.
//!
//! Resolution runs in two passes over the database in declaration order:
//! an applicability filter (modules, scenario, variants) followed by
//! supersession pruning driven only by the rules that survived the filter.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{ModuleId, Rule, SessionConfig};

/// Derive the ordered set of rules governing `session`.
///
/// Supersession targets are collected once from every applicable rule before
/// any removal, so a rule that is itself superseded still removes its own
/// target. A rule never removes itself.
pub fn resolve<'a, I>(rules: I, session: &SessionConfig) -> Vec<&'a Rule>
where
    I: IntoIterator<Item = &'a Rule>,
{
    let active: Vec<&Rule> = rules
        .into_iter()
        .filter(|rule| rule.applies_to(session))
        .collect();

    let superseded: HashSet<&str> = active
        .iter()
        .copied()
        .filter_map(supersession_target)
        .collect();

    active
        .into_iter()
        .filter(|rule| !superseded.contains(rule.id.as_str()))
        .collect()
}

fn supersession_target(rule: &Rule) -> Option<&str> {
    rule.supersedes
        .as_deref()
        .filter(|target| *target != rule.id)
}

/// Why a rule failed the applicability filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Required modules that are not active.
    MissingModules(BTreeSet<ModuleId>),
    /// The rule is limited to scenarios other than the selected one.
    ScenarioMismatch,
    /// Required variants that are not active.
    MissingVariants(BTreeSet<String>),
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::MissingModules(modules) => {
                let ids: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
                write!(f, "needs module {}", ids.join(", "))
            }
            Exclusion::ScenarioMismatch => write!(f, "not used in this scenario"),
            Exclusion::MissingVariants(variants) => {
                let names: Vec<&str> = variants.iter().map(String::as_str).collect();
                write!(f, "needs variant {}", names.join(", "))
            }
        }
    }
}

/// Outcome for a single rule under a session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStatus {
    /// Part of the resolved rulebook.
    Active,
    /// Dropped by the applicability filter.
    Inapplicable(Vec<Exclusion>),
    /// Applicable but replaced by the listed active rules.
    Superseded {
        /// Ids of the rules that replace this one.
        by: Vec<String>,
    },
}

/// Report the status of every rule in declaration order.
///
/// The `Active` entries are exactly the rules returned by [`resolve`].
pub fn explain<'a, I>(rules: I, session: &SessionConfig) -> Vec<(&'a Rule, RuleStatus)>
where
    I: IntoIterator<Item = &'a Rule>,
{
    let rules: Vec<&Rule> = rules.into_iter().collect();

    let mut superseders: HashMap<&str, Vec<String>> = HashMap::new();
    for rule in rules.iter().copied().filter(|rule| rule.applies_to(session)) {
        if let Some(target) = supersession_target(rule) {
            superseders
                .entry(target)
                .or_default()
                .push(rule.id.clone());
        }
    }

    rules
        .into_iter()
        .map(|rule| {
            let exclusions = exclusions(rule, session);
            let status = if !exclusions.is_empty() {
                RuleStatus::Inapplicable(exclusions)
            } else if let Some(by) = superseders.get(rule.id.as_str()) {
                RuleStatus::Superseded { by: by.clone() }
            } else {
                RuleStatus::Active
            };
            (rule, status)
        })
        .collect()
}

fn exclusions(rule: &Rule, session: &SessionConfig) -> Vec<Exclusion> {
    let mut reasons = Vec::new();
    if !rule.modules_satisfied(session) {
        let missing = rule
            .required_modules
            .difference(&session.active_modules)
            .copied()
            .collect();
        reasons.push(Exclusion::MissingModules(missing));
    }
    if !rule.scenario_matches(session) {
        reasons.push(Exclusion::ScenarioMismatch);
    }
    if !rule.variants_satisfied(session) {
        let missing = rule
            .required_variants
            .difference(&session.active_variants)
            .cloned()
            .collect();
        reasons.push(Exclusion::MissingVariants(missing));
    }
    reasons
}

/// The resolved rules for one session, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Rulebook<'a> {
    rules: Vec<&'a Rule>,
}

/// Rules sharing a section label.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    /// Section label as written in the database.
    pub label: &'a str,
    /// Rules of this section in declaration order.
    pub rules: Vec<&'a Rule>,
}

impl<'a> Rulebook<'a> {
    /// Resolve `rules` for `session`.
    pub fn resolve<I>(rules: I, session: &SessionConfig) -> Self
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        Self {
            rules: resolve(rules, session),
        }
    }

    /// Resolved rules in declaration order.
    pub fn rules(&self) -> &[&'a Rule] {
        &self.rules
    }

    /// Ids of the resolved rules.
    pub fn ids(&self) -> Vec<&'a str> {
        self.rules.iter().copied().map(|rule| rule.id.as_str()).collect()
    }

    /// Number of resolved rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule applies.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Group rules by section, sections ordered by first appearance.
    pub fn sections(&self) -> Vec<Section<'a>> {
        let mut sections: Vec<Section<'a>> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for &rule in &self.rules {
            let label = rule.section.as_str();
            match index.get(label) {
                Some(&pos) => sections[pos].rules.push(rule),
                None => {
                    index.insert(label, sections.len());
                    sections.push(Section {
                        label,
                        rules: vec![rule],
                    });
                }
            }
        }
        sections
    }

    /// Plain-text rendering suitable for printing or exporting.
    pub fn to_plain_text(&self) -> String {
        if self.is_empty() {
            return "No applicable rules.\n".to_string();
        }

        let mut out = String::new();
        for section in self.sections() {
            out.push_str(&format!("== {} ==\n", section.label));
            for rule in section.rules {
                if rule.id == section.label {
                    out.push_str(&format!("{}\n", rule.title));
                } else {
                    out.push_str(&format!("{} {}\n", rule.id, rule.title));
                }
                for line in rule.text.lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for Rulebook<'a> {
    type Item = &'a Rule;
    type IntoIter = std::vec::IntoIter<&'a Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScenarioScope;

    fn rule(id: &str, modules: &[ModuleId], supersedes: Option<&str>) -> Rule {
        Rule {
            id: id.to_string(),
            section: id.to_string(),
            title: format!("Rule {id}"),
            text: String::new(),
            required_modules: modules.iter().copied().collect(),
            scenarios: ScenarioScope::All,
            required_variants: BTreeSet::new(),
            supersedes: supersedes.map(str::to_string),
        }
    }

    fn ids<'a>(rules: &[&'a Rule]) -> Vec<&'a str> {
        rules.iter().map(|rule| rule.id.as_str()).collect()
    }

    fn income_database() -> Vec<Rule> {
        vec![rule("I1", &[], None), rule("O2", &[0], Some("I1"))]
    }

    #[test]
    fn core_session_keeps_income_rule() {
        let db = income_database();
        let resolved = resolve(&db, &SessionConfig::new());
        assert_eq!(ids(&resolved), vec!["I1"]);
    }

    #[test]
    fn module_rule_supersedes_core_rule() {
        let db = income_database();
        let resolved = resolve(&db, &SessionConfig::new().with_module(0));
        assert_eq!(ids(&resolved), vec!["O2"]);
    }

    #[test]
    fn inactive_superseder_does_not_remove_target() {
        let db = income_database();
        let resolved = resolve(&db, &SessionConfig::new().with_module(1));
        assert_eq!(ids(&resolved), vec!["I1"]);
    }

    #[test]
    fn empty_database_and_empty_config_resolve_to_nothing() {
        let db: Vec<Rule> = Vec::new();
        assert!(resolve(&db, &SessionConfig::default()).is_empty());
    }

    #[test]
    fn variant_gated_rule() {
        let mut quick = rule("QS1", &[], None);
        quick.required_variants.insert("QuickStart".to_string());
        let db = vec![quick];

        assert!(resolve(&db, &SessionConfig::new()).is_empty());
        let resolved = resolve(&db, &SessionConfig::new().with_variant("QuickStart"));
        assert_eq!(ids(&resolved), vec!["QS1"]);
    }

    #[test]
    fn scenario_specific_rules_need_exact_name() {
        let mut duel = rule("S1", &[], None);
        duel.scenarios = ScenarioScope::only(["Duel"]);
        let db = vec![rule("A1", &[], None), duel];

        assert_eq!(ids(&resolve(&db, &SessionConfig::new())), vec!["A1"]);
        assert_eq!(
            ids(&resolve(&db, &SessionConfig::new().with_scenario("Duel"))),
            vec!["A1", "S1"]
        );
        assert_eq!(
            ids(&resolve(&db, &SessionConfig::new().with_scenario("duel"))),
            vec!["A1"]
        );
    }

    #[test]
    fn chained_supersession_is_one_hop_over_survivors() {
        let db = vec![
            rule("Z", &[], None),
            rule("Y", &[], Some("Z")),
            rule("X", &[], Some("Y")),
        ];
        let resolved = resolve(&db, &SessionConfig::new());
        assert_eq!(ids(&resolved), vec!["X"]);
    }

    #[test]
    fn chain_with_inactive_middle_keeps_tail() {
        let db = vec![
            rule("Z", &[], None),
            rule("Y", &[3], Some("Z")),
            rule("X", &[], Some("Y")),
        ];
        let resolved = resolve(&db, &SessionConfig::new());
        assert_eq!(ids(&resolved), vec!["Z", "X"]);
    }

    #[test]
    fn duplicate_targets_are_idempotent() {
        let db = vec![
            rule("B", &[], None),
            rule("A1", &[], Some("B")),
            rule("A2", &[], Some("B")),
            rule("C", &[], None),
        ];
        let resolved = resolve(&db, &SessionConfig::new());
        assert_eq!(ids(&resolved), vec!["A1", "A2", "C"]);
    }

    #[test]
    fn dangling_and_self_references_are_ignored() {
        let db = vec![rule("A", &[], Some("missing")), rule("B", &[], Some("B"))];
        let resolved = resolve(&db, &SessionConfig::new());
        assert_eq!(ids(&resolved), vec!["A", "B"]);
    }

    #[test]
    fn resolution_preserves_order_and_is_idempotent() {
        let db = vec![
            rule("A", &[], None),
            rule("B", &[0], None),
            rule("C", &[], None),
            rule("D", &[0], Some("A")),
            rule("E", &[0, 1], Some("C")),
            rule("F", &[], None),
        ];
        let session = SessionConfig::new().with_module(0);
        let first = resolve(&db, &session);
        assert_eq!(ids(&first), vec!["B", "C", "D", "F"]);

        let subset: Vec<Rule> = first.iter().map(|rule| (*rule).clone()).collect();
        let second = resolve(&subset, &session);
        assert_eq!(ids(&second), ids(&first));
    }

    #[test]
    fn explain_agrees_with_resolve() {
        let mut gated = rule("V", &[1], None);
        gated.required_variants.insert("Quick Start".to_string());
        gated.scenarios = ScenarioScope::only(["Duel"]);
        let db = vec![
            rule("I1", &[], None),
            rule("O2", &[0], Some("I1")),
            gated,
        ];
        let session = SessionConfig::new().with_module(0);

        let report = explain(&db, &session);
        let statuses: Vec<(&str, RuleStatus)> = report
            .iter()
            .map(|(rule, status)| (rule.id.as_str(), status.clone()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (
                    "I1",
                    RuleStatus::Superseded {
                        by: vec!["O2".to_string()]
                    }
                ),
                ("O2", RuleStatus::Active),
                (
                    "V",
                    RuleStatus::Inapplicable(vec![
                        Exclusion::MissingModules(BTreeSet::from([1])),
                        Exclusion::ScenarioMismatch,
                        Exclusion::MissingVariants(BTreeSet::from(["Quick Start".to_string()])),
                    ])
                ),
            ]
        );

        let active: Vec<&str> = report
            .iter()
            .filter(|(_, status)| *status == RuleStatus::Active)
            .map(|(rule, _)| rule.id.as_str())
            .collect();
        assert_eq!(active, ids(&resolve(&db, &session)));
    }

    #[test]
    fn sections_group_by_first_appearance() {
        let mut a = rule("O1", &[], None);
        a.section = "O".to_string();
        let mut b = rule("A1", &[], None);
        b.section = "A".to_string();
        let mut c = rule("O2", &[], None);
        c.section = "O".to_string();
        let db = vec![a, b, c];

        let book = Rulebook::resolve(&db, &SessionConfig::new());
        let sections = book.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, "O");
        assert_eq!(ids(&sections[0].rules), vec!["O1", "O2"]);
        assert_eq!(sections[1].label, "A");
        assert!(book.to_plain_text().starts_with("== O ==\nO1 Rule O1\n"));
    }

    #[test]
    fn empty_rulebook_renders_placeholder() {
        let db: Vec<Rule> = Vec::new();
        let book = Rulebook::resolve(&db, &SessionConfig::new());
        assert!(book.is_empty());
        assert_eq!(book.to_plain_text(), "No applicable rules.\n");
    }
}
