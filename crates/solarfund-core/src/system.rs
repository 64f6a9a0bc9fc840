//! Candidate systems and the rectangular dataset that carries them.
//!
//! The ingestion layer hands the engine a [`SystemTable`]: every record has a
//! unique identifier, a typed FMV, and a value for every declared attribute
//! column. Constraint conditions address attributes by column name; the
//! canonical [`FMV`] name always resolves to the typed FMV field.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::DataShapeError;

/// Canonical name of the fair-market-value column.
pub const FMV: &str = "FMV";

/// One candidate system (a solar installation) from the backlog or from a
/// fund's existing book.
///
/// # Example
///
/// ```
/// use solarfund_core::SystemRecord;
///
/// let s = SystemRecord::new("S1", 400_000.0).with_attribute("state", "CA");
/// assert_eq!(s.attribute("state"), Some("CA"));
/// assert_eq!(s.number("FMV"), Some(400_000.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SystemRecord {
    /// Unique identifier.
    pub id: String,
    /// Fair market value in currency units.
    pub fmv: f64,
    /// Attribute columns by name.
    pub attributes: BTreeMap<String, String>,
}

impl SystemRecord {
    /// Creates a record with no attributes.
    pub fn new(id: impl Into<String>, fmv: f64) -> Self {
        Self {
            id: id.into(),
            fmv,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets an attribute value.
    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Returns the textual value of an attribute column.
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }

    /// Returns the numeric view of a column.
    ///
    /// `FMV` yields the typed field; other columns are parsed, ignoring
    /// surrounding whitespace.
    pub fn number(&self, column: &str) -> Option<f64> {
        if column == FMV {
            return Some(self.fmv);
        }
        self.attribute(column)
            .and_then(|v| v.trim().parse::<f64>().ok())
    }
}

/// The quantity a budget is measured in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Fair market value.
    #[default]
    Fmv,
    /// Any other numeric column.
    Column(String),
}

impl Measure {
    /// Maps a declared measure name to a measure. Empty names mean FMV.
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() || name == FMV {
            Measure::Fmv
        } else {
            Measure::Column(name.to_string())
        }
    }

    /// Returns the column name of this measure.
    pub fn name(&self) -> &str {
        match self {
            Measure::Fmv => FMV,
            Measure::Column(c) => c,
        }
    }

    /// Returns the system's amount of this measure.
    ///
    /// A missing or non-numeric column value counts as zero.
    pub fn measure_of(&self, system: &SystemRecord) -> f64 {
        match self {
            Measure::Fmv => system.fmv,
            Measure::Column(c) => system
                .number(c)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rectangular dataset of systems.
///
/// Every record carries a value for every declared column; identifiers are
/// unique and FMV is finite and non-negative.
///
/// # Example
///
/// ```
/// use solarfund_core::{SystemRecord, SystemTable};
///
/// let mut table = SystemTable::new(["state"]);
/// table.push(SystemRecord::new("S1", 10.0).with_attribute("state", "CA")).unwrap();
///
/// assert!(table.has_column("state"));
/// assert!(table.has_column("FMV"));
/// assert!(table.require_columns(["Stage"]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemTable {
    columns: Vec<String>,
    records: Vec<SystemRecord>,
    ids: HashSet<String>,
}

impl SystemTable {
    /// Creates an empty table with the given attribute columns.
    pub fn new<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let mut declared: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !declared.contains(&column) {
                declared.push(column);
            }
        }
        Self {
            columns: declared,
            records: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Builds a table whose columns are those of the first record.
    ///
    /// # Errors
    ///
    /// Returns the first shape violation among the records.
    pub fn infer(records: Vec<SystemRecord>) -> Result<Self, DataShapeError> {
        let columns: Vec<String> = records
            .first()
            .map(|r| r.attributes.keys().cloned().collect())
            .unwrap_or_default();
        let mut table = Self::new(columns);
        for record in records {
            table.push(record)?;
        }
        Ok(table)
    }

    /// Appends a record after checking it against the table's shape.
    pub fn push(&mut self, record: SystemRecord) -> Result<(), DataShapeError> {
        if !record.fmv.is_finite() || record.fmv < 0.0 {
            return Err(DataShapeError::InvalidFmv {
                id: record.id,
                value: record.fmv,
            });
        }
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !record.attributes.contains_key(c.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DataShapeError::RaggedRecord {
                id: record.id,
                missing,
            });
        }
        if !self.ids.insert(record.id.clone()) {
            return Err(DataShapeError::DuplicateId(record.id));
        }
        self.records.push(record);
        Ok(())
    }

    /// Returns the declared attribute columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns true if the column is present. `FMV` is always present.
    pub fn has_column(&self, column: &str) -> bool {
        column == FMV || self.columns.iter().any(|c| c == column)
    }

    /// Checks that every named column exists.
    ///
    /// # Errors
    ///
    /// Lists every absent column once, in the order first requested.
    pub fn require_columns<'a, I>(&self, required: I) -> Result<(), DataShapeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing: Vec<String> = Vec::new();
        for column in required {
            if !self.has_column(column) && !missing.iter().any(|m| m == column) {
                missing.push(column.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DataShapeError::MissingColumns(missing))
        }
    }

    /// Returns the records in insertion order.
    pub fn records(&self) -> &[SystemRecord] {
        &self.records
    }

    /// Iterates over the records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SystemRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a SystemTable {
    type Item = &'a SystemRecord;
    type IntoIter = std::slice::Iter<'a, SystemRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ca(id: &str, fmv: f64) -> SystemRecord {
        SystemRecord::new(id, fmv).with_attribute("state", "CA")
    }

    #[test]
    fn test_number_parses_attribute() {
        let s = SystemRecord::new("S1", 5.0).with_attribute("kw", " 7.5 ");
        assert_eq!(s.number("kw"), Some(7.5));
        assert_eq!(s.number("FMV"), Some(5.0));
        assert_eq!(s.number("missing"), None);
    }

    #[test]
    fn test_measure_from_name() {
        assert_eq!(Measure::from_name(""), Measure::Fmv);
        assert_eq!(Measure::from_name("FMV"), Measure::Fmv);
        assert_eq!(Measure::from_name("kw"), Measure::Column("kw".into()));
    }

    #[test]
    fn test_measure_of_non_numeric_is_zero() {
        let s = SystemRecord::new("S1", 5.0).with_attribute("kw", "n/a");
        assert_eq!(Measure::Column("kw".into()).measure_of(&s), 0.0);
        assert_eq!(Measure::Fmv.measure_of(&s), 5.0);
    }

    #[test]
    fn test_push_rejects_ragged_record() {
        let mut table = SystemTable::new(["state", "Stage"]);
        let err = table.push(ca("S1", 1.0)).unwrap_err();
        assert_eq!(
            err,
            DataShapeError::RaggedRecord {
                id: "S1".into(),
                missing: vec!["Stage".into()],
            }
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_push_rejects_duplicate_id() {
        let mut table = SystemTable::new(["state"]);
        table.push(ca("S1", 1.0)).unwrap();
        let err = table.push(ca("S1", 2.0)).unwrap_err();
        assert_eq!(err, DataShapeError::DuplicateId("S1".into()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_push_rejects_negative_fmv() {
        let mut table = SystemTable::new(["state"]);
        assert!(matches!(
            table.push(ca("S1", -1.0)),
            Err(DataShapeError::InvalidFmv { .. })
        ));
        assert!(matches!(
            table.push(ca("S2", f64::NAN)),
            Err(DataShapeError::InvalidFmv { .. })
        ));
    }

    #[test]
    fn test_infer_uses_first_record_columns() {
        let table = SystemTable::infer(vec![ca("S1", 1.0), ca("S2", 2.0)]).unwrap();
        assert_eq!(table.columns(), &["state".to_string()]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_require_columns_lists_each_missing_once() {
        let table = SystemTable::new(["state"]);
        let err = table
            .require_columns(["state", "Stage", "FMV", "Stage", "utility"])
            .unwrap_err();
        assert_eq!(
            err,
            DataShapeError::MissingColumns(vec!["Stage".into(), "utility".into()])
        );
    }
}
