//! Choice-gating conditions
//!
//! A condition is a conjunction: every flag entry, every variable constraint,
//! and every module condition must hold. Absent clauses are trivially
//! satisfied; evaluation lives in the condition service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::{ModuleId, Scalar};

/// Condition object attached to a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub flags: HashMap<String, bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, VariableConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_conditions: Vec<ModuleCondition>,
}

/// Constraint on a single variable: either a bare scalar (strict equality)
/// or a numeric range object.
///
/// Untagged ordering matters: any JSON object deserializes as a range (an
/// empty object is a range with no comparators, which always holds), and
/// anything else falls through to scalar equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableConstraint {
    Range(NumericRange),
    Equals(Scalar),
}

/// Numeric comparators, all optional, all ANDed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<f64>,
}

impl NumericRange {
    /// Whether every present comparator holds against `value`.
    ///
    /// `gt/lt/gte/lte/eq` require a numeric current value and fail for
    /// anything else. `neq` only fails when the current value is a number
    /// equal to the bound.
    pub fn holds(&self, value: Option<&Scalar>) -> bool {
        let number = value.and_then(Scalar::as_number);

        let ordered = |bound: Option<f64>, check: fn(f64, f64) -> bool| match bound {
            Some(bound) => number.map(|current| check(current, bound)).unwrap_or(false),
            None => true,
        };

        if !ordered(self.gt, |current, bound| current > bound) {
            return false;
        }
        if !ordered(self.lt, |current, bound| current < bound) {
            return false;
        }
        if !ordered(self.gte, |current, bound| current >= bound) {
            return false;
        }
        if !ordered(self.lte, |current, bound| current <= bound) {
            return false;
        }
        if !ordered(self.eq, |current, bound| current == bound) {
            return false;
        }
        if let Some(bound) = self.neq {
            if number == Some(bound) {
                return false;
            }
        }
        true
    }
}

/// A named question addressed to one module, e.g.
/// `{ "module": "ship", "condition": "SHIELDS_UP" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCondition {
    pub module: ModuleId,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parses_from_object_and_scalar_from_literal() {
        let constraint: VariableConstraint = serde_json::from_str(r#"{"gte": 3}"#).unwrap();
        assert!(matches!(constraint, VariableConstraint::Range(_)));

        let constraint: VariableConstraint = serde_json::from_str("7").unwrap();
        assert_eq!(constraint, VariableConstraint::Equals(Scalar::Number(7.0)));
    }

    #[test]
    fn empty_range_always_holds() {
        let range = NumericRange::default();
        assert!(range.holds(None));
        assert!(range.holds(Some(&Scalar::Text("anything".into()))));
    }

    #[test]
    fn ordered_comparators_require_numbers() {
        let range = NumericRange {
            gt: Some(1.0),
            ..Default::default()
        };
        assert!(range.holds(Some(&Scalar::Number(2.0))));
        assert!(!range.holds(Some(&Scalar::Number(1.0))));
        assert!(!range.holds(Some(&Scalar::Text("2".into()))));
        assert!(!range.holds(None));
    }

    #[test]
    fn neq_passes_for_non_numbers() {
        let range = NumericRange {
            neq: Some(5.0),
            ..Default::default()
        };
        assert!(range.holds(Some(&Scalar::Number(4.0))));
        assert!(!range.holds(Some(&Scalar::Number(5.0))));
        assert!(range.holds(Some(&Scalar::Text("5".into()))));
        assert!(range.holds(None));
    }

    #[test]
    fn all_present_comparators_are_anded() {
        let range = NumericRange {
            gte: Some(2.0),
            lt: Some(5.0),
            ..Default::default()
        };
        assert!(range.holds(Some(&Scalar::Number(2.0))));
        assert!(range.holds(Some(&Scalar::Number(4.9))));
        assert!(!range.holds(Some(&Scalar::Number(5.0))));
        assert!(!range.holds(Some(&Scalar::Number(1.9))));
    }
}
