//! Conditions: typed predicates over a system's attribute columns.
//!
//! A condition's value is a tagged variant rather than a loosely typed field.
//! Matching and budget initialization dispatch on the tag explicitly.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::system::SystemRecord;

/// Sentinel list entry meaning "every value not explicitly constrained
/// elsewhere for this attribute".
pub const OTHERS: &str = "__OTHERS__";

/// Comparison applied by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionOperator {
    #[cfg_attr(feature = "serde", serde(rename = "Equals"))]
    Equals,
    #[cfg_attr(feature = "serde", serde(rename = "Not Equals", alias = "NotEquals"))]
    NotEquals,
    #[cfg_attr(feature = "serde", serde(rename = "Contains"))]
    Contains,
    #[cfg_attr(feature = "serde", serde(rename = "Not Contains", alias = "NotContains"))]
    NotContains,
    #[cfg_attr(feature = "serde", serde(rename = "Greater Than", alias = "GreaterThan"))]
    GreaterThan,
    #[cfg_attr(feature = "serde", serde(rename = "Less Than", alias = "LessThan"))]
    LessThan,
    #[cfg_attr(feature = "serde", serde(rename = "In"))]
    In,
    #[cfg_attr(feature = "serde", serde(rename = "Not In", alias = "NotIn"))]
    NotIn,
}

impl ConditionOperator {
    /// Returns the document spelling, e.g. `"Not Equals"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "Equals",
            ConditionOperator::NotEquals => "Not Equals",
            ConditionOperator::Contains => "Contains",
            ConditionOperator::NotContains => "Not Contains",
            ConditionOperator::GreaterThan => "Greater Than",
            ConditionOperator::LessThan => "Less Than",
            ConditionOperator::In => "In",
            ConditionOperator::NotIn => "Not In",
        }
    }

    /// Returns true for the membership operators `Equals` and `In`.
    pub fn is_inclusive_membership(&self) -> bool {
        matches!(self, ConditionOperator::Equals | ConditionOperator::In)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operator name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown condition operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for ConditionOperator {
    type Err = UnknownOperator;

    /// Accepts both `"Not Equals"` and `"NotEquals"` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "Equals" => Ok(ConditionOperator::Equals),
            "NotEquals" => Ok(ConditionOperator::NotEquals),
            "Contains" => Ok(ConditionOperator::Contains),
            "NotContains" => Ok(ConditionOperator::NotContains),
            "GreaterThan" => Ok(ConditionOperator::GreaterThan),
            "LessThan" => Ok(ConditionOperator::LessThan),
            "In" => Ok(ConditionOperator::In),
            "NotIn" => Ok(ConditionOperator::NotIn),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// The value side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Ordered list of attribute values.
    List(Vec<String>),
    /// Attribute value to its own fraction-or-absolute bound.
    Bounded(IndexMap<String, f64>),
    /// Single value.
    Scalar(String),
}

impl ConditionValue {
    /// Short name of the variant, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            ConditionValue::List(_) => "list",
            ConditionValue::Bounded(_) => "bounded map",
            ConditionValue::Scalar(_) => "scalar",
        }
    }

    /// Returns every value named by this condition value, in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ConditionValue::List(values) => values.iter().map(String::as_str).collect(),
            ConditionValue::Bounded(bounds) => bounds.keys().map(String::as_str).collect(),
            ConditionValue::Scalar(value) => vec![value.as_str()],
        }
    }

    fn contains(&self, value: &str) -> bool {
        if value == OTHERS {
            return false;
        }
        match self {
            ConditionValue::List(values) => values.iter().any(|v| v == value),
            ConditionValue::Bounded(bounds) => bounds.contains_key(value),
            ConditionValue::Scalar(v) => v == value,
        }
    }
}

/// Why a condition cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionShapeError {
    #[error("condition has no attribute")]
    EmptyAttribute,

    #[error("operator '{operator}' cannot take a {shape} value")]
    IncompatibleValue {
        operator: ConditionOperator,
        shape: &'static str,
    },

    #[error("operator '{operator}' needs a numeric value, got '{value}'")]
    NonNumeric {
        operator: ConditionOperator,
        value: String,
    },
}

/// A predicate over one attribute column.
///
/// # Example
///
/// ```
/// use solarfund_core::{Condition, ConditionOperator, ConditionValue, SystemRecord};
///
/// let cond = Condition::new(
///     "state",
///     ConditionOperator::In,
///     ConditionValue::List(vec!["CA".into(), "TX".into()]),
/// ).unwrap();
///
/// let s = SystemRecord::new("S1", 1.0).with_attribute("state", "TX");
/// assert!(cond.matches(&s));
///
/// // Numeric comparisons require a numeric scalar.
/// assert!(Condition::new(
///     "kw",
///     ConditionOperator::GreaterThan,
///     ConditionValue::List(vec!["5".into()]),
/// ).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Attribute column the condition reads.
    pub attribute: String,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

impl Condition {
    /// Creates a condition, checking that the operator fits the value shape.
    pub fn new(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> Result<Self, ConditionShapeError> {
        let condition = Self {
            attribute: attribute.into(),
            operator,
            value,
        };
        condition.validate()?;
        Ok(condition)
    }

    /// Membership in a list of values (`In`).
    pub fn one_of<I, V>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            attribute: attribute.into(),
            operator: ConditionOperator::In,
            value: ConditionValue::List(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Membership with a bound per value (`Equals` over a bounded map).
    pub fn bounded<I, V>(attribute: impl Into<String>, bounds: I) -> Self
    where
        I: IntoIterator<Item = (V, f64)>,
        V: Into<String>,
    {
        Self {
            attribute: attribute.into(),
            operator: ConditionOperator::Equals,
            value: ConditionValue::Bounded(
                bounds.into_iter().map(|(v, b)| (v.into(), b)).collect(),
            ),
        }
    }

    /// Re-checks the operator / value pairing.
    pub fn validate(&self) -> Result<(), ConditionShapeError> {
        use ConditionOperator::*;

        if self.attribute.trim().is_empty() {
            return Err(ConditionShapeError::EmptyAttribute);
        }
        let fits = match (self.operator, &self.value) {
            (Equals | In, _) => true,
            (NotEquals | NotIn, ConditionValue::List(_) | ConditionValue::Scalar(_)) => true,
            (Contains | NotContains | GreaterThan | LessThan, ConditionValue::Scalar(_)) => true,
            _ => false,
        };
        if !fits {
            return Err(ConditionShapeError::IncompatibleValue {
                operator: self.operator,
                shape: self.value.shape(),
            });
        }
        if let (GreaterThan | LessThan, ConditionValue::Scalar(v)) = (self.operator, &self.value) {
            if v.trim().parse::<f64>().is_err() {
                return Err(ConditionShapeError::NonNumeric {
                    operator: self.operator,
                    value: v.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns true if this condition lists the OTHERS sentinel.
    pub fn has_others(&self) -> bool {
        matches!(&self.value, ConditionValue::List(values) if values.iter().any(|v| v == OTHERS))
    }

    /// Evaluates the condition against a system.
    ///
    /// A system without a value for the attribute never matches. The OTHERS
    /// sentinel is not matched literally; it is resolved against the other
    /// budgets on the same attribute.
    pub fn matches(&self, system: &SystemRecord) -> bool {
        use ConditionOperator::*;

        let actual = system.attribute(&self.attribute);
        match self.operator {
            Equals | In => actual.is_some_and(|a| self.value.contains(a)),
            NotEquals | NotIn => actual.is_some_and(|a| !self.value.contains(a)),
            Contains => actual.is_some_and(|a| self.value.values().iter().any(|v| a.contains(v))),
            NotContains => {
                actual.is_some_and(|a| !self.value.values().iter().any(|v| a.contains(v)))
            }
            GreaterThan | LessThan => self.compare(system),
        }
    }

    fn compare(&self, system: &SystemRecord) -> bool {
        let (Some(actual), ConditionValue::Scalar(raw)) =
            (system.number(&self.attribute), &self.value)
        else {
            return false;
        };
        let Ok(threshold) = raw.trim().parse::<f64>() else {
            return false;
        };
        match self.operator {
            ConditionOperator::GreaterThan => actual > threshold,
            ConditionOperator::LessThan => actual < threshold,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys(state: &str) -> SystemRecord {
        SystemRecord::new("S", 100.0)
            .with_attribute("state", state)
            .with_attribute("kw", "8.2")
    }

    #[test]
    fn test_operator_parses_both_spellings() {
        assert_eq!("Not Equals".parse(), Ok(ConditionOperator::NotEquals));
        assert_eq!("NotEquals".parse(), Ok(ConditionOperator::NotEquals));
        assert_eq!("Greater Than".parse(), Ok(ConditionOperator::GreaterThan));
        assert_eq!(
            "Between".parse::<ConditionOperator>(),
            Err(UnknownOperator("Between".into()))
        );
    }

    #[test]
    fn test_operator_display_round_trips() {
        for op in [
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::Contains,
            ConditionOperator::NotContains,
            ConditionOperator::GreaterThan,
            ConditionOperator::LessThan,
            ConditionOperator::In,
            ConditionOperator::NotIn,
        ] {
            assert_eq!(op.to_string().parse(), Ok(op));
        }
    }

    #[test]
    fn test_numeric_operator_rejects_list() {
        let err = Condition::new(
            "kw",
            ConditionOperator::GreaterThan,
            ConditionValue::List(vec!["5".into()]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConditionShapeError::IncompatibleValue {
                operator: ConditionOperator::GreaterThan,
                shape: "list",
            }
        );
    }

    #[test]
    fn test_numeric_operator_rejects_text() {
        let err = Condition::new(
            "kw",
            ConditionOperator::LessThan,
            ConditionValue::Scalar("big".into()),
        )
        .unwrap_err();
        assert!(matches!(err, ConditionShapeError::NonNumeric { .. }));
    }

    #[test]
    fn test_not_in_rejects_bounded_map() {
        let mut cond = Condition::bounded("state", [("CA", 0.5)]);
        cond.operator = ConditionOperator::NotIn;
        assert!(cond.validate().is_err());
    }

    #[test]
    fn test_empty_attribute_rejected() {
        let cond = Condition::one_of(" ", ["CA"]);
        assert_eq!(cond.validate(), Err(ConditionShapeError::EmptyAttribute));
    }

    #[test]
    fn test_membership_matching() {
        let cond = Condition::one_of("state", ["CA", "TX"]);
        assert!(cond.matches(&sys("CA")));
        assert!(!cond.matches(&sys("NY")));

        let mut negated = cond.clone();
        negated.operator = ConditionOperator::NotIn;
        assert!(!negated.matches(&sys("CA")));
        assert!(negated.matches(&sys("NY")));
    }

    #[test]
    fn test_bounded_map_matches_keys() {
        let cond = Condition::bounded("state", [("CA", 0.5), ("TX", 0.3)]);
        assert!(cond.matches(&sys("TX")));
        assert!(!cond.matches(&sys("NY")));
    }

    #[test]
    fn test_others_never_matches_literally() {
        let cond = Condition::one_of("state", [OTHERS]);
        assert!(!cond.matches(&sys(OTHERS)));
        assert!(cond.has_others());
    }

    #[test]
    fn test_contains_and_numeric() {
        let contains = Condition::new(
            "state",
            ConditionOperator::Contains,
            ConditionValue::Scalar("A".into()),
        )
        .unwrap();
        assert!(contains.matches(&sys("CA")));
        assert!(!contains.matches(&sys("NY")));

        let gt = Condition::new(
            "kw",
            ConditionOperator::GreaterThan,
            ConditionValue::Scalar("8".into()),
        )
        .unwrap();
        assert!(gt.matches(&sys("CA")));

        let fmv_lt = Condition::new(
            "FMV",
            ConditionOperator::LessThan,
            ConditionValue::Scalar("50".into()),
        )
        .unwrap();
        assert!(!fmv_lt.matches(&sys("CA")));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let mut cond = Condition::one_of("utility", ["PG&E"]);
        assert!(!cond.matches(&sys("CA")));
        cond.operator = ConditionOperator::NotIn;
        assert!(!cond.matches(&sys("CA")));
    }
}
