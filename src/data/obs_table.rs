//! Per-sample annotation table (the "obs" side of a perturbation record set).

use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single annotation value that can be categorical, continuous, or ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Ordinal variable with integer rank.
    Ordinal(i64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as it appears inside grouping keys.
    ///
    /// Floats keep their decimal point (`1.0`, not `1`). Outside
    /// `[1e-4, 1e16)` they switch to exponent form with a signed,
    /// two-digit exponent (`1e-05`, `2.5e+16`).
    pub fn key_string(&self) -> String {
        self.to_string()
    }

    /// Order values by type first: numbers numerically, then text, then
    /// missing. Ties between numbers fall back to the rendered key.
    pub fn level_cmp(&self, other: &Variable) -> Ordering {
        fn rank(v: &Variable) -> u8 {
            match v {
                Variable::Continuous(_) | Variable::Ordinal(_) => 0,
                Variable::Categorical(_) => 1,
                Variable::Missing => 2,
            }
        }

        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a
                .total_cmp(&b)
                .then_with(|| self.key_string().cmp(&other.key_string())),
            _ => rank(self).cmp(&rank(other)).then_with(|| match (self, other) {
                (Variable::Categorical(a), Variable::Categorical(b)) => a.cmp(b),
                _ => Ordering::Equal,
            }),
        }
    }

    /// Sorted distinct key strings of a set of values, in [`level_cmp`] order.
    ///
    /// [`level_cmp`]: Variable::level_cmp
    pub fn sorted_levels(values: &[Variable]) -> Vec<String> {
        let mut sorted: Vec<&Variable> = values.iter().collect();
        sorted.sort_by(|a, b| a.level_cmp(b));

        let mut seen = HashSet::new();
        sorted
            .into_iter()
            .map(Variable::key_string)
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            Variable::Ordinal(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Whether the value equals the control sentinel (`1`).
    pub fn is_flag(&self) -> bool {
        match self {
            Variable::Continuous(v) => *v == 1.0,
            Variable::Ordinal(v) => *v == 1,
            Variable::Categorical(s) => {
                matches!(s.trim(), "1" | "1.0" | "true" | "True" | "TRUE")
            }
            Variable::Missing => false,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Categorical(s) => f.write_str(s),
            Variable::Continuous(v) => write_float(f, *v),
            Variable::Ordinal(v) => write!(f, "{}", v),
            Variable::Missing => f.write_str("nan"),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v < 0.0 { "-inf" } else { "inf" });
    }

    let magnitude = v.abs();
    if magnitude == 0.0 || (1e-4..1e16).contains(&magnitude) {
        let plain = v.to_string();
        if plain.contains('.') {
            return f.write_str(&plain);
        }
        return write!(f, "{}.0", plain);
    }

    let sci = format!("{:e}", v);
    match sci.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().map_err(|_| fmt::Error)?;
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => f.write_str(&sci),
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::Categorical(s.to_string())
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Variable::Categorical(s)
    }
}

impl From<f64> for Variable {
    fn from(v: f64) -> Self {
        Variable::Continuous(v)
    }
}

impl From<i64> for Variable {
    fn from(v: i64) -> Self {
        Variable::Ordinal(v)
    }
}

impl From<bool> for Variable {
    fn from(v: bool) -> Self {
        Variable::Ordinal(v as i64)
    }
}

/// Row-aligned sample annotations stored column by column.
#[derive(Debug, Clone, Default)]
pub struct ObsTable {
    /// Number of samples (rows).
    n_rows: usize,
    /// Column names in insertion order.
    column_names: Vec<String>,
    /// Data stored as column_name -> values.
    columns: HashMap<String, Vec<Variable>>,
}

impl ObsTable {
    /// Create an empty table with a fixed number of rows.
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            column_names: Vec::new(),
            columns: HashMap::new(),
        }
    }

    /// Builder form of [`ObsTable::insert_column`].
    pub fn with_column<I, V>(mut self, name: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        self.insert_column(name, values.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Add or replace a column. The column keeps its position when replaced.
    pub fn insert_column(&mut self, name: &str, values: Vec<Variable>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(DatasetError::DimensionMismatch {
                expected: self.n_rows,
                actual: values.len(),
            });
        }
        if !self.columns.contains_key(name) {
            self.column_names.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Number of samples.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Get all values for a column.
    pub fn column(&self, column: &str) -> Result<&[Variable]> {
        self.columns
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| DatasetError::MissingColumn(column.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> ObsTable {
        ObsTable::new(4)
            .with_column("perturbation", ["ctrl", "drugA", "drugA", "drugB"])
            .unwrap()
            .with_column("dose", [1.0, 0.5, 1.0, 2.0])
            .unwrap()
            .with_column("control", [1i64, 0, 0, 0])
            .unwrap()
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let table = create_test_table();
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.column_names(), &["perturbation", "dose", "control"]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = ObsTable::new(3).with_column("dose", [1.0, 2.0]);
        assert!(matches!(
            result,
            Err(DatasetError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut table = create_test_table();
        table
            .insert_column("perturbation", vec![Variable::Missing; 4])
            .unwrap();
        assert_eq!(table.column_names()[0], "perturbation");
        assert!(table.column("perturbation").unwrap()[0].is_missing());
    }

    #[test]
    fn test_missing_column() {
        let table = create_test_table();
        assert!(matches!(
            table.column("cell_type"),
            Err(DatasetError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_key_string_keeps_float_point() {
        assert_eq!(Variable::Continuous(1.0).key_string(), "1.0");
        assert_eq!(Variable::Continuous(0.25).key_string(), "0.25");
        assert_eq!(Variable::Ordinal(3).key_string(), "3");
        assert_eq!(Variable::from("1.0+2.0").key_string(), "1.0+2.0");
    }

    #[test]
    fn test_flag_sentinel() {
        assert!(Variable::Ordinal(1).is_flag());
        assert!(Variable::Continuous(1.0).is_flag());
        assert!(Variable::from("True").is_flag());
        assert!(Variable::from(true).is_flag());
        assert!(!Variable::Ordinal(0).is_flag());
        assert!(!Variable::Continuous(2.0).is_flag());
        assert!(!Variable::from("ctrl").is_flag());
        assert!(!Variable::Missing.is_flag());
    }

    #[test]
    fn test_key_string_small_and_large_floats() {
        assert_eq!(Variable::Continuous(0.0001).key_string(), "0.0001");
        assert_eq!(Variable::Continuous(1e-5).key_string(), "1e-05");
        assert_eq!(Variable::Continuous(-2.5e-7).key_string(), "-2.5e-07");
        assert_eq!(Variable::Continuous(1e15).key_string(), "1000000000000000.0");
        assert_eq!(Variable::Continuous(1e16).key_string(), "1e+16");
        assert_eq!(Variable::Continuous(1.5e300).key_string(), "1.5e+300");
        assert_eq!(Variable::Continuous(f64::NAN).key_string(), "nan");
        assert_eq!(Variable::Continuous(-0.0).key_string(), "-0.0");
    }

    #[test]
    fn test_sorted_levels_numeric_before_text() {
        let values = vec![
            Variable::Ordinal(2),
            Variable::Ordinal(10),
            Variable::Ordinal(1),
            Variable::Ordinal(2),
        ];
        assert_eq!(Variable::sorted_levels(&values), vec!["1", "2", "10"]);

        let mixed = vec![
            Variable::from("drugB"),
            Variable::Continuous(10.0),
            Variable::Missing,
            Variable::Continuous(2.5),
            Variable::from("ctrl"),
        ];
        assert_eq!(
            Variable::sorted_levels(&mixed),
            vec!["2.5", "10.0", "ctrl", "drugB", "nan"]
        );

        let same_key = vec![Variable::from("1"), Variable::Ordinal(1)];
        assert_eq!(Variable::sorted_levels(&same_key), vec!["1"]);
    }
}
