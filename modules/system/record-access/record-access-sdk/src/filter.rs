//! Backend-neutral filter expressions.
//!
//! A [`FilterExpr`] is a conjunction of [`FilterCondition`]s. The engine only
//! builds expressions; backends translate them into their own query language.
//! [`FilterExpr::matches`] is the reference evaluation used by in-memory
//! backends and by item-level scope checks.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{FilterCondition, MatchType, Record};

/// Conjunction of conditions. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpr {
    conditions: Vec<FilterCondition>,
}

impl FilterExpr {
    /// Builds a conjunction, or `None` when there is nothing to filter on.
    #[must_use]
    pub fn and(conditions: Vec<FilterCondition>) -> Option<Self> {
        if conditions.is_empty() {
            None
        } else {
            Some(Self { conditions })
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Returns true if `record` satisfies every condition.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl FilterCondition {
    /// Evaluates this condition against a record.
    ///
    /// A missing field only satisfies the negative match types.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return matches!(self.operator, MatchType::NotEqual | MatchType::NotContains);
        };

        match self.operator {
            MatchType::Equals => value_text(actual) == self.value,
            MatchType::NotEqual => value_text(actual) != self.value,
            MatchType::Contains => contains(actual, &self.value),
            MatchType::NotContains => !contains(actual, &self.value),
            MatchType::StartsWith => value_text(actual).starts_with(self.value.as_str()),
            MatchType::GreaterThan => {
                compare(&value_text(actual), &self.value) == Ordering::Greater
            }
            MatchType::LessThan => compare(&value_text(actual), &self.value) == Ordering::Less,
        }
    }
}

/// Textual form of a JSON value: strings as-is, everything else as JSON text.
#[must_use]
pub fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

fn contains(actual: &Value, needle: &str) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| value_text(item) == needle),
        other => value_text(other).contains(needle),
    }
}

// Numeric when both sides parse as numbers, lexicographic otherwise.
fn compare(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn empty_conjunction_is_no_filter() {
        assert!(FilterExpr::and(vec![]).is_none());
    }

    #[test]
    fn conjunction_requires_every_condition() {
        let expr = FilterExpr::and(vec![
            FilterCondition::equals("dept", "finance"),
            FilterCondition::equals("dept", "engineering"),
        ])
        .unwrap();

        assert!(!expr.matches(&record(json!({"dept": "finance"}))));
        assert!(!expr.matches(&record(json!({"dept": "engineering"}))));
    }

    #[test]
    fn equals_compares_json_text_for_non_strings() {
        let cond = FilterCondition::equals("level", "3");
        assert!(cond.matches(&record(json!({"level": 3}))));
        assert!(!cond.matches(&record(json!({"level": "4"}))));
    }

    #[test]
    fn missing_field_only_matches_negative_operators() {
        let rec = record(json!({"other": "x"}));
        assert!(!FilterCondition::equals("dept", "a").matches(&rec));
        assert!(FilterCondition::new("dept", "a", MatchType::NotEqual).matches(&rec));
        assert!(FilterCondition::new("dept", "a", MatchType::NotContains).matches(&rec));
        assert!(!FilterCondition::new("dept", "a", MatchType::StartsWith).matches(&rec));
    }

    #[test]
    fn contains_checks_substrings_and_array_members() {
        let cond = FilterCondition::new("tags", "red", MatchType::Contains);
        assert!(cond.matches(&record(json!({"tags": ["blue", "red"]}))));
        assert!(!cond.matches(&record(json!({"tags": ["reddish"]}))));
        assert!(cond.matches(&record(json!({"tags": "bored"}))));
    }

    #[test]
    fn ordering_is_numeric_when_possible() {
        let gt = FilterCondition::new("size", "9", MatchType::GreaterThan);
        assert!(gt.matches(&record(json!({"size": 10}))));

        let lt = FilterCondition::new("name", "m", MatchType::LessThan);
        assert!(lt.matches(&record(json!({"name": "alpha"}))));
        assert!(!lt.matches(&record(json!({"name": "zulu"}))));
    }

    #[test]
    fn starts_with() {
        let cond = FilterCondition::new("path", "/a", MatchType::StartsWith);
        assert!(cond.matches(&record(json!({"path": "/a/b"}))));
        assert!(!cond.matches(&record(json!({"path": "/b/a"}))));
    }
}
