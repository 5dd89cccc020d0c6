//! # Scenarios
//!
//! Validated descriptions of an interactive representation. Values of these
//! types only come out of [`crate::core::validate`], so their invariants hold:
//!
//! ```text
//! addition   2 <= origins.len() <= 6, every origin is "<count> <object>"
//! deletion   solution_count <= original_count
//! division   group_count >= 1
//! ```
//!
//! The serialized form is a flat object tagged by `method`.

use serde::{Deserialize, Serialize};

use crate::core::method::RepresentationMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionScenario {
    pub scenario: String,
    pub solution: String,
    /// Draggable labels, each a count followed by an object ("2 Apples").
    pub origins: Vec<String>,
    pub target: String,
}

impl AdditionScenario {
    /// Counts encoded in each origin label, in order.
    pub fn quantities(&self) -> Vec<u64> {
        self.origins
            .iter()
            .filter_map(|label| leading_count(label))
            .collect()
    }

    /// Sum of the origin counts; None if it does not fit in a `u64`.
    pub fn total(&self) -> Option<u64> {
        self.quantities()
            .into_iter()
            .try_fold(0u64, |sum, count| sum.checked_add(count))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionScenario {
    pub scenario: String,
    pub solution: String,
    pub asset: String,
    pub original_count: u64,
    pub solution_count: u64,
}

impl DeletionScenario {
    /// How many objects the user has to click away.
    pub fn removed(&self) -> u64 {
        self.original_count.saturating_sub(self.solution_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionScenario {
    pub scenario: String,
    pub solution: String,
    pub origin: String,
    pub origin_count: u64,
    pub group: String,
    pub group_count: u64,
}

impl DivisionScenario {
    /// Objects per group when shared equally.
    pub fn share(&self) -> u64 {
        self.origin_count / self.group_count.max(1)
    }

    pub fn remainder(&self) -> u64 {
        self.origin_count % self.group_count.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Scenario {
    Addition(AdditionScenario),
    Deletion(DeletionScenario),
    Division(DivisionScenario),
}

impl Scenario {
    pub fn method(&self) -> RepresentationMethod {
        match self {
            Scenario::Addition(_) => RepresentationMethod::Addition,
            Scenario::Deletion(_) => RepresentationMethod::Deletion,
            Scenario::Division(_) => RepresentationMethod::Division,
        }
    }

    pub fn scenario_text(&self) -> &str {
        match self {
            Scenario::Addition(s) => &s.scenario,
            Scenario::Deletion(s) => &s.scenario,
            Scenario::Division(s) => &s.scenario,
        }
    }
}

impl From<AdditionScenario> for Scenario {
    fn from(s: AdditionScenario) -> Self {
        Scenario::Addition(s)
    }
}

impl From<DeletionScenario> for Scenario {
    fn from(s: DeletionScenario) -> Self {
        Scenario::Deletion(s)
    }
}

impl From<DivisionScenario> for Scenario {
    fn from(s: DivisionScenario) -> Self {
        Scenario::Division(s)
    }
}

/// Parses the count at the start of a label like "12 Cookies".
pub(crate) fn leading_count(label: &str) -> Option<u64> {
    label.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn division(origin_count: u64, group_count: u64) -> DivisionScenario {
        DivisionScenario {
            scenario: "Share the cookies.".into(),
            solution: "Divide.".into(),
            origin: "cookie".into(),
            origin_count,
            group: "child".into(),
            group_count,
        }
    }

    #[test]
    fn test_serialized_shape_is_flat_and_tagged() {
        let scenario = Scenario::from(division(12, 4));
        let json = serde_json::to_value(&scenario).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "division",
                "scenario": "Share the cookies.",
                "solution": "Divide.",
                "origin": "cookie",
                "originCount": 12,
                "group": "child",
                "groupCount": 4
            })
        );
    }

    #[test]
    fn test_deletion_field_names() {
        let scenario = Scenario::Deletion(DeletionScenario {
            scenario: "Eat berries.".into(),
            solution: "15 - 5 = 10".into(),
            asset: "berries".into(),
            original_count: 15,
            solution_count: 10,
        });
        let json = serde_json::to_string(&scenario).unwrap();
        assert!(json.contains(r#""method":"deletion""#));
        assert!(json.contains(r#""originalCount":15"#));
        assert!(json.contains(r#""solutionCount":10"#));
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scenario);
        assert_eq!(back.method(), RepresentationMethod::Deletion);
    }

    #[test]
    fn test_addition_quantities() {
        let addition = AdditionScenario {
            scenario: "Pack a picnic basket.".into(),
            solution: "1 + 2 = 3".into(),
            origins: vec!["1 Apple".into(), "2 Apples".into()],
            target: "Basket".into(),
        };
        assert_eq!(addition.quantities(), vec![1, 2]);
        assert_eq!(addition.total(), Some(3));
    }

    #[test]
    fn test_addition_total_does_not_overflow() {
        let addition = AdditionScenario {
            scenario: "Pack a picnic basket.".into(),
            solution: "huge".into(),
            origins: vec![format!("{} Apples", u64::MAX), "1 Apple".into()],
            target: "Basket".into(),
        };
        assert_eq!(addition.total(), None);
    }

    #[test]
    fn test_division_share_and_remainder() {
        assert_eq!(division(12, 4).share(), 3);
        assert_eq!(division(13, 4).remainder(), 1);
    }

    #[test]
    fn test_leading_count() {
        assert_eq!(leading_count("12 Cookies"), Some(12));
        assert_eq!(leading_count("Cookies"), None);
        assert_eq!(leading_count("-3 Cookies"), None);
        assert_eq!(leading_count(""), None);
    }
}
