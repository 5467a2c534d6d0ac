//! Offline consistency checks for rule databases.
//!
//! Resolution tolerates every problem reported here; these checks exist so
//! data authors can spot them before a session hides a rule unexpectedly.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{Rule, ScenarioScope};

/// A consistency problem found in a rule database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// Two rules share an id.
    #[error("rule id {id} is declared {count} times")]
    DuplicateId {
        /// The repeated id.
        id: String,
        /// How many rules carry it.
        count: usize,
    },
    /// `supersedes` names a rule that does not exist.
    #[error("rule {id} supersedes unknown rule {target}")]
    DanglingSupersession {
        /// The superseding rule.
        id: String,
        /// The id that matches no rule.
        target: String,
    },
    /// `supersedes` names the rule itself.
    #[error("rule {id} supersedes itself")]
    SelfSupersession {
        /// The offending rule.
        id: String,
    },
    /// The scenario list is empty, so the rule can never apply.
    #[error("rule {id} lists no scenarios and can never apply")]
    NoScenarios {
        /// The offending rule.
        id: String,
    },
    /// A superseded rule supersedes another rule in turn.
    #[error("rule {id} supersedes {middle}, which supersedes {target}; only one hop is applied")]
    SupersessionChain {
        /// Rule at the head of the chain.
        id: String,
        /// Rule superseded by `id` that supersedes `target`.
        middle: String,
        /// Rule at the end of the chain.
        target: String,
    },
}

impl ValidationIssue {
    /// Id of the rule the issue was found on.
    pub fn rule_id(&self) -> &str {
        match self {
            ValidationIssue::DuplicateId { id, .. }
            | ValidationIssue::DanglingSupersession { id, .. }
            | ValidationIssue::SelfSupersession { id }
            | ValidationIssue::NoScenarios { id }
            | ValidationIssue::SupersessionChain { id, .. } => id,
        }
    }
}

/// Check a rule database, returning issues in rule order.
pub fn validate(rules: &[Rule]) -> Vec<ValidationIssue> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for rule in rules {
        *counts.entry(rule.id.as_str()).or_default() += 1;
    }
    // First declaration wins, matching `RuleStore::get`.
    let mut supersedes: HashMap<&str, Option<&str>> = HashMap::new();
    for rule in rules {
        supersedes
            .entry(rule.id.as_str())
            .or_insert(rule.supersedes.as_deref());
    }

    let mut issues = Vec::new();
    let mut reported_duplicates: HashSet<&str> = HashSet::new();
    for rule in rules {
        let id = rule.id.as_str();
        let count = counts.get(id).copied().unwrap_or(0);
        if count > 1 && reported_duplicates.insert(id) {
            issues.push(ValidationIssue::DuplicateId {
                id: id.to_string(),
                count,
            });
        }

        if let ScenarioScope::Only(names) = &rule.scenarios {
            if names.is_empty() {
                issues.push(ValidationIssue::NoScenarios { id: id.to_string() });
            }
        }

        let Some(target) = rule.supersedes.as_deref() else {
            continue;
        };
        if target == id {
            issues.push(ValidationIssue::SelfSupersession { id: id.to_string() });
        } else if !counts.contains_key(target) {
            issues.push(ValidationIssue::DanglingSupersession {
                id: id.to_string(),
                target: target.to_string(),
            });
        } else if let Some(next) = supersedes
            .get(target)
            .copied()
            .flatten()
            .filter(|next| *next != target)
        {
            issues.push(ValidationIssue::SupersessionChain {
                id: id.to_string(),
                middle: target.to_string(),
                target: next.to_string(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RuleStore;

    fn rule(id: &str, supersedes: Option<&str>) -> Rule {
        Rule {
            id: id.to_string(),
            section: id.to_string(),
            title: id.to_string(),
            text: String::new(),
            required_modules: Default::default(),
            scenarios: ScenarioScope::All,
            required_variants: Default::default(),
            supersedes: supersedes.map(str::to_string),
        }
    }

    #[test]
    fn builtin_database_is_clean() -> anyhow::Result<()> {
        let store = RuleStore::builtin()?;
        assert_eq!(validate(store.rules()), Vec::new());
        Ok(())
    }

    #[test]
    fn reports_each_problem_once() {
        let mut never = rule("N", None);
        never.scenarios = ScenarioScope::only(Vec::<String>::new());
        let rules = vec![
            rule("A", None),
            rule("A", None),
            rule("B", Some("missing")),
            rule("C", Some("C")),
            never,
        ];

        let issues = validate(&rules);
        assert_eq!(
            issues,
            vec![
                ValidationIssue::DuplicateId {
                    id: "A".to_string(),
                    count: 2
                },
                ValidationIssue::DanglingSupersession {
                    id: "B".to_string(),
                    target: "missing".to_string()
                },
                ValidationIssue::SelfSupersession {
                    id: "C".to_string()
                },
                ValidationIssue::NoScenarios {
                    id: "N".to_string()
                },
            ]
        );
        assert_eq!(issues[1].rule_id(), "B");
    }

    #[test]
    fn flags_supersession_chains() {
        let rules = vec![rule("Z", None), rule("Y", Some("Z")), rule("X", Some("Y"))];
        let issues = validate(&rules);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].to_string(),
            "rule X supersedes Y, which supersedes Z; only one hop is applied"
        );
    }

    #[test]
    fn chains_follow_first_declaration_of_duplicate_ids() {
        let rules = vec![
            rule("Z", None),
            rule("Y", Some("Z")),
            rule("Y", None),
            rule("X", Some("Y")),
        ];
        let issues = validate(&rules);
        assert!(issues.contains(&ValidationIssue::SupersessionChain {
            id: "X".to_string(),
            middle: "Y".to_string(),
            target: "Z".to_string(),
        }));
        assert_eq!(
            issues[0],
            ValidationIssue::DuplicateId {
                id: "Y".to_string(),
                count: 2
            }
        );
    }
}
