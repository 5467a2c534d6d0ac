//! Rulebook cross-reference extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Rule;

/// Matches parenthesised rulebook references such as `(K2)`, `(O6b)`,
/// `(2A6c)` or a bare chapter letter `(H)`.
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d?[A-Z]\d+[a-z]?|[A-Z])\)").expect("invalid cross-reference regex")
});

impl Rule {
    /// References to other rules mentioned in the text, first occurrence order.
    pub fn cross_references(&self) -> Vec<&str> {
        let mut found: Vec<&str> = Vec::new();
        for caps in REFERENCE_RE.captures_iter(&self.text) {
            if let Some(m) = caps.get(1) {
                if !found.contains(&m.as_str()) {
                    found.push(m.as_str());
                }
            }
        }
        found
    }
}

/// Strip a trailing paragraph letter so `O6b` resolves to the rule `O6`.
pub fn reference_target(reference: &str) -> &str {
    match reference.char_indices().last() {
        Some((idx, ch)) if ch.is_ascii_lowercase() && idx > 0 => &reference[..idx],
        _ => reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScenarioScope;

    fn with_text(text: &str) -> Rule {
        Rule {
            id: "T".to_string(),
            section: "T".to_string(),
            title: "T".to_string(),
            text: text.to_string(),
            required_modules: Default::default(),
            scenarios: ScenarioScope::All,
            required_variants: Default::default(),
            supersedes: None,
        }
    }

    #[test]
    fn extracts_references_in_order_without_duplicates() {
        let rule = with_text(
            "Make an Event Roll (K2). Player order can change (O6b). Roll again (K2). \
             Ships in LEO (LEO) use (Module 1) rules and movement (H).",
        );
        assert_eq!(rule.cross_references(), vec!["K2", "O6b", "H"]);
    }

    #[test]
    fn handles_numbered_module_chapters() {
        let rule = with_text("If you exomigrate (2A6c) or build a Colony (G3c)");
        assert_eq!(rule.cross_references(), vec!["2A6c", "G3c"]);
    }

    #[test]
    fn reference_target_drops_paragraph_letter() {
        assert_eq!(reference_target("O6b"), "O6");
        assert_eq!(reference_target("F4c"), "F4");
        assert_eq!(reference_target("K2"), "K2");
        assert_eq!(reference_target("H"), "H");
    }
}
