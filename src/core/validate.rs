//! # Schema Validator
//!
//! Turns the model's raw text into a [`Scenario`], or explains everything
//! that is wrong with it.
//!
//! ```text
//! raw text ──▶ strip one ``` fence ──▶ strict JSON parse ──▶ object?
//!                                                             │
//!          ┌──────────────────────────────────────────────────┘
//!          ▼
//!   method tag ─▶ fields (presence, type) ─▶ per-method invariants ─▶ Scenario
//! ```
//!
//! Every check runs even after an earlier one fails, so a caller gets the
//! full list of violations in one pass.

use std::fmt;

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::method::RepresentationMethod;
use crate::core::scenario::{
    AdditionScenario, DeletionScenario, DivisionScenario, Scenario, leading_count,
};
use crate::inference::types::replace_typography;

pub const MIN_ORIGINS: usize = 2;
pub const MAX_ORIGINS: usize = 6;
pub const MAX_SCENARIO_WORDS: usize = 60;
pub const MAX_LABEL_WORDS: usize = 4;

/// What to do when a repairable invariant is broken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepairPolicy {
    /// Reject the output.
    #[default]
    Strict,
    /// Clamp `solutionCount` down to `originalCount` and record a correction.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Not a single JSON object.
    Syntax,
    Missing,
    WrongType,
    /// Empty, too long, too few, too many, or out of numeric range.
    Range,
    /// A label that does not read "<count> <object>".
    Format,
    /// The `method` tag names a different method.
    Mismatch,
    /// A relation between fields does not hold.
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Path of the offending field (`$` for the whole document).
    pub field: String,
    pub rule: Rule,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// None when the input question itself was rejected.
    pub method: Option<RepresentationMethod>,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            Some(method) => write!(f, "{method} output failed validation: ")?,
            None => write!(f, "input failed validation: ")?,
        }
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A repair applied under [`RepairPolicy::Clamp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub field: String,
    pub original: u64,
    pub corrected: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub scenario: Scenario,
    pub corrections: Vec<Correction>,
}

/// Rejects blank questions before any call is made.
pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError {
            method: None,
            violations: vec![Violation {
                field: "question".into(),
                rule: Rule::Range,
                detail: "must not be empty".into(),
            }],
        });
    }
    Ok(())
}

/// Validates raw model output for `method`.
pub fn validate(
    method: RepresentationMethod,
    raw: &str,
    policy: RepairPolicy,
) -> Result<Validated, ValidationError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!("{} output is not a single JSON document: {}", method, e);
        ValidationError {
            method: Some(method),
            violations: vec![Violation {
                field: "$".into(),
                rule: Rule::Syntax,
                detail: format!("not a single JSON object: {e}"),
            }],
        }
    })?;
    validate_value(method, &value, policy)
}

/// Validates an already-parsed JSON document for `method`.
pub fn validate_value(
    method: RepresentationMethod,
    value: &Value,
    policy: RepairPolicy,
) -> Result<Validated, ValidationError> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationError {
            method: Some(method),
            violations: vec![Violation {
                field: "$".into(),
                rule: Rule::WrongType,
                detail: format!("expected a JSON object, got {}", type_name(value)),
            }],
        });
    };

    let mut checker = Checker::default();
    checker.method_tag(obj, method);
    let scenario = checker.text(obj, "scenario", "scenario");
    if let Some(text) = &scenario {
        let words = text.split_whitespace().count();
        if words > MAX_SCENARIO_WORDS {
            checker.fail(
                "scenario",
                Rule::Range,
                format!("must be at most {MAX_SCENARIO_WORDS} words (got {words})"),
            );
        }
    }
    let solution = checker.text(obj, "solution", "solution");

    let result = match method {
        RepresentationMethod::Addition => {
            let fields = addition_fields(&mut checker, obj);
            match (scenario, solution, fields) {
                (Some(scenario), Some(solution), Some((origins, target))) => {
                    Some(Scenario::Addition(AdditionScenario {
                        scenario,
                        solution,
                        origins,
                        target,
                    }))
                }
                _ => None,
            }
        }
        RepresentationMethod::Deletion => {
            let asset = checker.label(obj, "asset", "asset");
            let original_count = checker.count(obj, "originalCount", 0);
            let mut solution_count = checker.count(obj, "solutionCount", 0);
            if let (Some(original), Some(solution)) = (original_count, solution_count)
                && solution > original
            {
                match policy {
                    RepairPolicy::Strict => checker.fail(
                        "solutionCount",
                        Rule::Invariant,
                        format!("must not exceed originalCount ({solution} > {original})"),
                    ),
                    RepairPolicy::Clamp => {
                        checker.corrections.push(Correction {
                            field: "solutionCount".into(),
                            original: solution,
                            corrected: original,
                        });
                        solution_count = Some(original);
                    }
                }
            }
            match (scenario, solution, asset, original_count, solution_count) {
                (Some(scenario), Some(solution), Some(asset), Some(original_count), Some(solution_count)) => {
                    Some(Scenario::Deletion(DeletionScenario {
                        scenario,
                        solution,
                        asset,
                        original_count,
                        solution_count,
                    }))
                }
                _ => None,
            }
        }
        RepresentationMethod::Division => {
            let origin = checker.label(obj, "origin", "origin");
            let origin_count = checker.count(obj, "originCount", 0);
            let group = checker.label(obj, "group", "group");
            let group_count = checker.count(obj, "groupCount", 1);
            match (scenario, solution, origin, origin_count, group, group_count) {
                (Some(scenario), Some(solution), Some(origin), Some(origin_count), Some(group), Some(group_count)) => {
                    Some(Scenario::Division(DivisionScenario {
                        scenario,
                        solution,
                        origin,
                        origin_count,
                        group,
                        group_count,
                    }))
                }
                _ => None,
            }
        }
    };

    for key in obj.keys() {
        if !known_field(method, key) {
            debug!("Ignoring unknown {} field '{}'", method, key);
        }
    }

    match result {
        Some(scenario) if checker.violations.is_empty() => {
            for correction in &checker.corrections {
                info!(
                    "Corrected {} {}: {} -> {}",
                    method, correction.field, correction.original, correction.corrected
                );
            }
            Ok(Validated {
                scenario,
                corrections: checker.corrections,
            })
        }
        _ => {
            warn!(
                "{} output failed validation with {} violation(s)",
                method,
                checker.violations.len()
            );
            Err(ValidationError {
                method: Some(method),
                violations: checker.violations,
            })
        }
    }
}

/// Reads `origins` and `target`, either at the top level or nested under
/// `assets` (the shape older prompts asked for).
fn addition_fields(checker: &mut Checker, obj: &Map<String, Value>) -> Option<(Vec<String>, String)> {
    let (holder, prefix) = match obj.get("assets") {
        Some(Value::Object(assets)) if !obj.contains_key("origins") => (assets, "assets."),
        _ => (obj, ""),
    };

    let origins_path = format!("{prefix}origins");
    let origins = match holder.get("origins") {
        None => {
            checker.fail(&origins_path, Rule::Missing, "is required".into());
            None
        }
        Some(Value::Array(items)) => {
            if !(MIN_ORIGINS..=MAX_ORIGINS).contains(&items.len()) {
                checker.fail(
                    &origins_path,
                    Rule::Range,
                    format!(
                        "must have {MIN_ORIGINS}-{MAX_ORIGINS} items (got {})",
                        items.len()
                    ),
                );
            }
            let mut labels = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let path = format!("{origins_path}[{i}]");
                if let Some(label) = checker.label_value(Some(item), &path) {
                    let has_object = label.split_whitespace().nth(1).is_some();
                    if leading_count(&label).is_none() || !has_object {
                        checker.fail(
                            &path,
                            Rule::Format,
                            format!("must be a count followed by an object (got \"{label}\")"),
                        );
                    }
                    labels.push(label);
                }
            }
            let counts: Option<Vec<u64>> = labels.iter().map(|l| leading_count(l)).collect();
            if let Some(counts) = counts
                && counts
                    .iter()
                    .try_fold(0u64, |sum, count| sum.checked_add(*count))
                    .is_none()
            {
                checker.fail(
                    &origins_path,
                    Rule::Range,
                    "origin counts must not sum past the largest representable count".into(),
                );
            }
            (labels.len() == items.len()).then_some(labels)
        }
        Some(other) => {
            checker.fail(
                &origins_path,
                Rule::WrongType,
                format!("expected an array of strings, got {}", type_name(other)),
            );
            None
        }
    };

    let target = checker.label(holder, "target", &format!("{prefix}target"));
    Some((origins?, target?))
}

fn known_field(method: RepresentationMethod, key: &str) -> bool {
    let specific: &[&str] = match method {
        RepresentationMethod::Addition => &["origins", "target", "assets"],
        RepresentationMethod::Deletion => &["asset", "originalCount", "solutionCount"],
        RepresentationMethod::Division => &["origin", "originCount", "group", "groupCount"],
    };
    matches!(key, "method" | "scenario" | "solution") || specific.contains(&key)
}

/// Removes a single enclosing Markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(pos) => body[pos + 1..].trim(),
        None => body.trim(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
    corrections: Vec<Correction>,
}

impl Checker {
    fn fail(&mut self, field: &str, rule: Rule, detail: String) {
        self.violations.push(Violation {
            field: field.to_string(),
            rule,
            detail,
        });
    }

    fn method_tag(&mut self, obj: &Map<String, Value>, expected: RepresentationMethod) {
        match obj.get("method") {
            None => self.fail("method", Rule::Missing, "is required".into()),
            Some(Value::String(tag)) if tag == expected.as_str() => {}
            Some(Value::String(tag)) => self.fail(
                "method",
                Rule::Mismatch,
                format!("expected \"{expected}\", got \"{tag}\""),
            ),
            Some(other) => self.fail(
                "method",
                Rule::WrongType,
                format!("expected a string, got {}", type_name(other)),
            ),
        }
    }

    /// A required, non-empty string, with typography normalized.
    fn text(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        self.text_value(obj.get(key), path)
    }

    fn text_value(&mut self, value: Option<&Value>, path: &str) -> Option<String> {
        match value {
            None => {
                self.fail(path, Rule::Missing, "is required".into());
                None
            }
            Some(Value::String(s)) => {
                let normalized = replace_typography(s).trim().to_string();
                if normalized.is_empty() {
                    self.fail(path, Rule::Range, "must not be empty".into());
                    return None;
                }
                Some(normalized)
            }
            Some(other) => {
                self.fail(
                    path,
                    Rule::WrongType,
                    format!("expected a string, got {}", type_name(other)),
                );
                None
            }
        }
    }

    /// A short caption: non-empty text of at most [`MAX_LABEL_WORDS`] words.
    fn label(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        self.label_value(obj.get(key), path)
    }

    fn label_value(&mut self, value: Option<&Value>, path: &str) -> Option<String> {
        let label = self.text_value(value, path)?;
        let words = label.split_whitespace().count();
        if words > MAX_LABEL_WORDS {
            self.fail(
                path,
                Rule::Range,
                format!("must be at most {MAX_LABEL_WORDS} words (got {words})"),
            );
        }
        Some(label)
    }

    /// A required whole number no smaller than `min`.
    fn count(&mut self, obj: &Map<String, Value>, key: &str, min: u64) -> Option<u64> {
        match obj.get(key) {
            None => {
                self.fail(key, Rule::Missing, "is required".into());
                None
            }
            Some(Value::Number(n)) => {
                if let Some(count) = n.as_u64() {
                    if count < min {
                        let detail = if min == 1 {
                            format!("must be at least 1, got {count} (division by zero)")
                        } else {
                            format!("must be at least {min}, got {count}")
                        };
                        self.fail(key, Rule::Range, detail);
                        return None;
                    }
                    Some(count)
                } else if n.as_i64().is_some() {
                    self.fail(key, Rule::Range, format!("must be non-negative, got {n}"));
                    None
                } else {
                    self.fail(key, Rule::WrongType, format!("expected an integer, got {n}"));
                    None
                }
            }
            Some(other) => {
                self.fail(
                    key,
                    Rule::WrongType,
                    format!("expected an integer, got {}", type_name(other)),
                );
                None
            }
        }
    }
}
