// used for the as-of tags and date indexes
use chrono::NaiveDateTime;
// tables travel as serde documents inside pickled blobs and table files
use serde::{Deserialize, Serialize};

// used to give scalars a total order, so they can key groups
use std::cmp::Ordering;
// used to print out readable forms of a scalar
use std::fmt;

use crate::error::{EncoderError, Result};

/// Reserved column holding the as-of tag of each row.
pub const ASOF: &str = "_asof";
/// Reserved column marking a table that started life as a one-dimensional series.
pub const SERIES: &str = "_is_series";

// ------------- Scalar -------------
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "lenient_float")] f64),
    Str(String),
    DateTime(NaiveDateTime),
}

// JSON has no literal for NaN or the infinities, they are written as text
mod lenient_float {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(x: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
        if x.is_finite() {
            s.serialize_f64(*x)
        } else {
            s.serialize_str(&x.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(x) => Ok(x),
            Repr::Text(t) => t.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) => 2,
            Scalar::Float(_) => 3,
            Scalar::Str(_) => 4,
            Scalar::DateTime(_) => 5,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Scalar::DateTime(t) => Some(*t),
            _ => None,
        }
    }
}

// Variants are ranked first, values second. Floats use the IEEE total order so
// that NaN equals NaN and index keys never fall out of a group.
impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}
impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::DateTime(t) => write!(f, "{}", t),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self { Scalar::Bool(b) }
}
impl From<i64> for Scalar {
    fn from(i: i64) -> Self { Scalar::Int(i) }
}
impl From<f64> for Scalar {
    fn from(x: f64) -> Self { Scalar::Float(x) }
}
impl From<&str> for Scalar {
    fn from(s: &str) -> Self { Scalar::Str(s.to_string()) }
}
impl From<String> for Scalar {
    fn from(s: String) -> Self { Scalar::Str(s) }
}
impl From<NaiveDateTime> for Scalar {
    fn from(t: NaiveDateTime) -> Self { Scalar::DateTime(t) }
}

// ------------- Table -------------
/// A row-indexed, column-labelled dataset. Index keys need not be unique,
/// which is what lets a bitemporal table hold several versions of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index_name: Option<String>,
    index: Vec<Scalar>,
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
    #[serde(default)]
    series: bool,
}

impl Table {
    pub fn new(index: Vec<Scalar>, columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        let table = Self {
            index_name: None,
            index,
            columns,
            rows,
            series: false,
        };
        table.check_shape()?;
        Ok(table)
    }
    /// Builds a table from `(label, cells)` pairs, one pair per column.
    pub fn from_columns(index: Vec<Scalar>, columns: Vec<(String, Vec<Scalar>)>) -> Result<Self> {
        let mut rows = vec![Vec::with_capacity(columns.len()); index.len()];
        let mut labels = Vec::with_capacity(columns.len());
        for (label, cells) in columns {
            if cells.len() != index.len() {
                return Err(EncoderError::Shape(format!(
                    "column '{}' has {} cells for {} index keys",
                    label,
                    cells.len(),
                    index.len()
                )));
            }
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.push(cell);
            }
            labels.push(label);
        }
        Self::new(index, labels, rows)
    }
    /// A one-dimensional series: a single column flagged as such.
    pub fn series(name: &str, index: Vec<Scalar>, values: Vec<Scalar>) -> Result<Self> {
        let mut table = Self::from_columns(index, vec![(name.to_string(), values)])?;
        table.series = true;
        Ok(table)
    }
    pub fn with_index_name(mut self, name: &str) -> Self {
        self.index_name = Some(name.to_string());
        self
    }
    pub(crate) fn set_index_name(&mut self, name: Option<String>) {
        self.index_name = name;
    }
    pub(crate) fn set_series(&mut self, series: bool) {
        self.series = series;
    }
    pub(crate) fn rename_column(&mut self, position: usize, label: &str) {
        if let Some(column) = self.columns.get_mut(position) {
            *column = label.to_string();
        }
    }
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }
    pub fn index(&self) -> &[Scalar] {
        &self.index
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }
    pub fn len(&self) -> usize {
        self.index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
    pub fn is_series(&self) -> bool {
        self.series
    }
    pub fn is_bitemporal(&self) -> bool {
        self.column_position(ASOF).is_some()
    }
    pub fn column_position(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }
    pub fn column(&self, label: &str) -> Option<Vec<&Scalar>> {
        let position = self.column_position(label)?;
        Some(self.rows.iter().map(|row| &row[position]).collect())
    }
    pub fn get(&self, row: usize, label: &str) -> Option<&Scalar> {
        let position = self.column_position(label)?;
        self.rows.get(row).map(|r| &r[position])
    }
    /// The "does this look like a table at all" check applied to anything
    /// decoded from bytes.
    pub fn check_shape(&self) -> Result<()> {
        if self.rows.len() != self.index.len() {
            return Err(EncoderError::Shape(format!(
                "{} rows for {} index keys",
                self.rows.len(),
                self.index.len()
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(EncoderError::Shape(format!(
                    "row {} has {} cells for {} columns",
                    i,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        for (i, label) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(label) {
                return Err(EncoderError::Shape(format!("duplicate column '{}'", label)));
            }
        }
        Ok(())
    }
    pub fn drop_column(&self, label: &str) -> Table {
        let Some(position) = self.column_position(label) else {
            return self.clone();
        };
        let mut table = self.clone();
        table.columns.remove(position);
        for row in table.rows.iter_mut() {
            row.remove(position);
        }
        table
    }
    /// Adds the column, or replaces its cells if the label already exists.
    pub fn with_column(&self, label: &str, cells: Vec<Scalar>) -> Result<Table> {
        if cells.len() != self.len() {
            return Err(EncoderError::Shape(format!(
                "column '{}' has {} cells for {} rows",
                label,
                cells.len(),
                self.len()
            )));
        }
        let mut table = self.clone();
        match table.column_position(label) {
            Some(position) => {
                for (row, cell) in table.rows.iter_mut().zip(cells) {
                    row[position] = cell;
                }
            }
            None => {
                table.columns.push(label.to_string());
                for (row, cell) in table.rows.iter_mut().zip(cells) {
                    row.push(cell);
                }
            }
        }
        Ok(table)
    }
    /// Stamps every row with the same as-of tag.
    pub fn stamp(&self, asof: NaiveDateTime) -> Table {
        let mut table = self.clone();
        match table.column_position(ASOF) {
            Some(position) => {
                for row in table.rows.iter_mut() {
                    row[position] = Scalar::DateTime(asof);
                }
            }
            None => {
                table.columns.push(ASOF.to_string());
                for row in table.rows.iter_mut() {
                    row.push(Scalar::DateTime(asof));
                }
            }
        }
        table
    }
    /// The rows at the given positions, in the given order.
    pub fn select(&self, positions: &[usize]) -> Table {
        Table {
            index_name: self.index_name.clone(),
            index: positions.iter().map(|&p| self.index[p].clone()).collect(),
            columns: self.columns.clone(),
            rows: positions.iter().map(|&p| self.rows[p].clone()).collect(),
            series: self.series,
        }
    }
    /// Appends the rows of `other`, aligning columns by label. Columns missing
    /// on either side are filled with nulls.
    pub fn concat(&self, other: &Table) -> Table {
        let mut columns = self.columns.clone();
        for label in &other.columns {
            if !columns.contains(label) {
                columns.push(label.clone());
            }
        }
        let realign = |table: &Table| -> Vec<Vec<Scalar>> {
            let positions: Vec<Option<usize>> =
                columns.iter().map(|c| table.column_position(c)).collect();
            table
                .rows
                .iter()
                .map(|row| {
                    positions
                        .iter()
                        .map(|p| p.map_or(Scalar::Null, |p| row[p].clone()))
                        .collect()
                })
                .collect()
        };
        let mut rows = realign(self);
        rows.extend(realign(other));
        let mut index = self.index.clone();
        index.extend(other.index.iter().cloned());
        Table {
            index_name: self.index_name.clone().or_else(|| other.index_name.clone()),
            index,
            columns,
            rows,
            series: self.series,
        }
    }
}
