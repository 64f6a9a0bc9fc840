//! The declarative constraint document.
//!
//! Shape: `fund_name -> { capacity, constraints: [ { name, category,
//! constraint_type, attribute, measure, upper_bound, aggregation,
//! apply_per_value, conditions: [ { type, condition, values | value } ],
//! active, group_name } ] }`.
//!
//! Funds keep their declaration order. Unknown keys are ignored on read, so
//! documents annotated with bookkeeping fields still load.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use solarfund_core::{
    Condition, ConditionOperator, ConditionValue, Constraint, ConstraintCategory, ConstraintKind,
    ConstraintResolutionError, Fund, Measure, FMV,
};
use tracing::warn;

use crate::ConfigError;

/// Serialization format of a constraint document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(DocumentFormat::Json),
            Some("yaml" | "yml") => Ok(DocumentFormat::Yaml),
            Some("toml") => Ok(DocumentFormat::Toml),
            _ => Err(ConfigError::Invalid(format!(
                "cannot infer document format from '{}'",
                path.display()
            ))),
        }
    }
}

/// Per-fund constraint specifications, in declaration order.
///
/// # Examples
///
/// ```
/// use solarfund_config::ConstraintDocument;
///
/// let doc = ConstraintDocument::from_json_str(r#"{
///     "Fund A": {
///         "capacity": 1000000,
///         "constraints": [{
///             "name": "StateCap",
///             "category": "Geographic",
///             "constraint_type": "Upper Bound",
///             "attribute": "state",
///             "apply_per_value": true,
///             "conditions": [
///                 { "type": "state", "condition": "Equals", "values": { "CA": 0.5, "TX": 0.3 } }
///             ]
///         }]
///     }
/// }"#).unwrap();
///
/// let resolved = doc.resolve().unwrap();
/// assert!(resolved.warnings.is_empty());
/// assert_eq!(resolved.funds[0].constraints[0].conditions.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintDocument {
    pub funds: IndexMap<String, FundSpec>,
}

/// Document entry for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FundSpec {
    pub capacity: f64,

    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

fn default_measure() -> String {
    FMV.to_string()
}

fn default_active() -> bool {
    true
}

/// Document entry for one constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConstraintSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ConstraintCategory>,

    #[serde(default)]
    pub constraint_type: ConstraintKind,

    #[serde(default)]
    pub attribute: String,

    #[serde(default = "default_measure")]
    pub measure: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,

    #[serde(default)]
    pub apply_per_value: bool,

    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

/// Document entry for one condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Attribute column.
    #[serde(rename = "type", default)]
    pub attribute: String,

    /// Operator, e.g. `"In"` or `"Not Equals"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "ConditionValues::is_empty")]
    pub values: ConditionValues,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScalarValue>,
}

/// A list of values, or values mapped to their own bounds.
///
/// A `null` bound is allowed on read; such entries are dropped with a
/// resolution warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValues {
    List(Vec<String>),
    Bounded(IndexMap<String, Option<f64>>),
}

impl Default for ConditionValues {
    fn default() -> Self {
        ConditionValues::List(Vec::new())
    }
}

impl ConditionValues {
    pub fn is_empty(&self) -> bool {
        match self {
            ConditionValues::List(values) => values.is_empty(),
            ConditionValues::Bounded(bounds) => bounds.is_empty(),
        }
    }
}

/// Scalar condition value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Text(s) => f.write_str(s),
            ScalarValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Funds built from a document, plus the conditions that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFunds {
    pub funds: Vec<Fund>,
    pub warnings: Vec<ConstraintResolutionError>,
}

impl ResolvedFunds {
    /// Returns the fund with the given name.
    pub fn fund(&self, name: &str) -> Option<&Fund> {
        self.funds.iter().find(|f| f.name == name)
    }
}

impl ConstraintDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a document, choosing the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let format = DocumentFormat::from_path(&path)?;
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, format)
    }

    /// Writes the document, choosing the format from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let format = DocumentFormat::from_path(&path)?;
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }

    /// Parses a document in the given format.
    pub fn parse(s: &str, format: DocumentFormat) -> Result<Self, ConfigError> {
        match format {
            DocumentFormat::Json => Self::from_json_str(s),
            DocumentFormat::Yaml => Self::from_yaml_str(s),
            DocumentFormat::Toml => Self::from_toml_str(s),
        }
    }

    /// Renders the document in the given format.
    pub fn render(&self, format: DocumentFormat) -> Result<String, ConfigError> {
        Ok(match format {
            DocumentFormat::Json => serde_json::to_string_pretty(self)?,
            DocumentFormat::Yaml => serde_yaml::to_string(self)?,
            DocumentFormat::Toml => toml::to_string_pretty(self)?,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Builds a document from in-memory funds.
    pub fn from_funds<'a>(funds: impl IntoIterator<Item = &'a Fund>) -> Self {
        let mut doc = Self::new();
        for fund in funds {
            doc.insert_fund(fund);
        }
        doc
    }

    /// Adds or replaces a fund, returning the entry it replaced.
    pub fn insert_fund(&mut self, fund: &Fund) -> Option<FundSpec> {
        self.funds.insert(fund.name.clone(), FundSpec::from(fund))
    }

    /// Removes a fund, keeping the order of the rest.
    pub fn remove_fund(&mut self, name: &str) -> Option<FundSpec> {
        self.funds.shift_remove(name)
    }

    /// Returns fund names in declaration order.
    pub fn fund_names(&self) -> impl Iterator<Item = &str> {
        self.funds.keys().map(String::as_str)
    }

    /// Converts the document into the domain model.
    ///
    /// Conditions that cannot be used are skipped and reported in
    /// [`ResolvedFunds::warnings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty fund name, a negative or
    /// non-finite capacity, or a constraint name used twice in one fund.
    pub fn resolve(&self) -> Result<ResolvedFunds, ConfigError> {
        let mut resolved = ResolvedFunds::default();
        for (name, spec) in &self.funds {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("fund name must not be empty".into()));
            }
            if !spec.capacity.is_finite() || spec.capacity < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "fund '{name}' has invalid capacity {}",
                    spec.capacity
                )));
            }
            let mut fund = Fund::new(name.clone(), spec.capacity);
            for constraint in &spec.constraints {
                fund.constraints
                    .push(constraint.to_constraint(name, &mut resolved.warnings));
            }
            if let Some(dup) = fund.duplicate_constraint_name() {
                return Err(ConfigError::Invalid(format!(
                    "fund '{name}' declares constraint '{dup}' more than once"
                )));
            }
            resolved.funds.push(fund);
        }
        Ok(resolved)
    }
}

impl From<&Fund> for FundSpec {
    fn from(fund: &Fund) -> Self {
        Self {
            capacity: fund.capacity,
            constraints: fund.constraints.iter().map(ConstraintSpec::from).collect(),
        }
    }
}

impl From<&Constraint> for ConstraintSpec {
    fn from(c: &Constraint) -> Self {
        Self {
            name: c.name.clone(),
            category: c.category,
            constraint_type: c.kind,
            attribute: c.attribute.clone(),
            measure: c.measure.name().to_string(),
            upper_bound: c.upper_bound,
            aggregation: c.aggregation.clone(),
            apply_per_value: c.apply_per_value,
            conditions: c.conditions.iter().map(ConditionSpec::from).collect(),
            active: c.active,
            group_name: c.group_name.clone(),
        }
    }
}

impl From<&Condition> for ConditionSpec {
    fn from(c: &Condition) -> Self {
        let (values, value) = match &c.value {
            ConditionValue::List(list) => (ConditionValues::List(list.clone()), None),
            ConditionValue::Bounded(bounds) => (
                ConditionValues::Bounded(
                    bounds.iter().map(|(k, b)| (k.clone(), Some(*b))).collect(),
                ),
                None,
            ),
            ConditionValue::Scalar(s) => (
                ConditionValues::default(),
                Some(ScalarValue::Text(s.clone())),
            ),
        };
        Self {
            attribute: c.attribute.clone(),
            condition: Some(c.operator.as_str().to_string()),
            values,
            value,
        }
    }
}

impl ConstraintSpec {
    fn to_constraint(
        &self,
        fund: &str,
        warnings: &mut Vec<ConstraintResolutionError>,
    ) -> Constraint {
        let mut constraint = Constraint {
            name: self.name.clone(),
            category: self.category,
            kind: self.constraint_type,
            attribute: self.attribute.clone(),
            measure: Measure::from_name(self.measure.trim()),
            upper_bound: self.upper_bound,
            aggregation: self.aggregation.clone(),
            apply_per_value: self.apply_per_value,
            conditions: Vec::with_capacity(self.conditions.len()),
            active: self.active,
            group_name: self.group_name.clone(),
        };

        for (index, spec) in self.conditions.iter().enumerate() {
            let mut skip = |reason: String| {
                let err = ConstraintResolutionError::new(fund, &self.name, index, reason);
                warn!(event = "condition_skipped", %err);
                warnings.push(err);
            };
            if let ConditionValues::Bounded(bounds) = &spec.values {
                for (value, _) in bounds.iter().filter(|(_, b)| b.is_none()) {
                    skip(format!("value '{value}' has no bound and is ignored"));
                }
            }
            match spec.to_condition() {
                Ok(condition) => constraint.conditions.push(condition),
                Err(reason) => skip(reason),
            }
        }
        constraint
    }
}

impl ConditionSpec {
    fn to_condition(&self) -> Result<Condition, String> {
        if self.attribute.trim().is_empty() {
            return Err("missing attribute ('type')".to_string());
        }
        let operator: ConditionOperator = self
            .condition
            .as_deref()
            .ok_or_else(|| "missing operator ('condition')".to_string())?
            .parse()
            .map_err(|e: solarfund_core::UnknownOperator| e.to_string())?;

        let value = match (&self.values, &self.value) {
            (values, Some(scalar)) if values.is_empty() => {
                ConditionValue::Scalar(scalar.to_string())
            }
            (ConditionValues::List(list), _) => ConditionValue::List(list.clone()),
            (ConditionValues::Bounded(bounds), _) => ConditionValue::Bounded(
                bounds
                    .iter()
                    .filter_map(|(k, b)| b.map(|b| (k.clone(), b)))
                    .collect(),
            ),
        };

        Condition::new(self.attribute.trim(), operator, value).map_err(|e| e.to_string())
    }
}
