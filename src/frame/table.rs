//! In-memory tabular frame produced by the cleaner and consumed by exporters.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;

/// A single scalar value in a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
}

impl Cell {
    /// Converts a JSON value into a cell.
    ///
    /// Arrays and objects are kept as their compact JSON text; integers too
    /// large for `i64` become floats.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Returns true for [`Cell::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Hashable identity used for deduplication and grouping.
    #[must_use]
    pub fn key(&self) -> CellKey {
        match self {
            Self::Null => CellKey::Null,
            Self::Bool(b) => CellKey::Bool(*b),
            Self::Int(i) => CellKey::Int(*i),
            // -0.0 and 0.0 compare equal, so they must hash equal too
            Self::Float(f) if *f == 0.0 => CellKey::Float(0.0_f64.to_bits()),
            Self::Float(f) => CellKey::Float(f.to_bits()),
            Self::Text(s) => CellKey::Text(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    /// Text rendering used by CSV output and partition directory names.
    /// Null renders as the empty string; integral floats keep a `.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Hashable, `Eq` projection of a [`Cell`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float by bit pattern.
    Float(u64),
    /// Text.
    Text(String),
}

/// Physical type of a column when written to a typed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Nullable 64-bit integers.
    Int,
    /// Nullable 64-bit floats.
    Float,
    /// Nullable booleans.
    Bool,
    /// Nullable UTF-8 text; anything mixed ends up here.
    Text,
}

impl ColumnType {
    /// Infers the narrowest type holding every non-null cell.
    ///
    /// All-null columns are text.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let mut inferred: Option<Self> = None;
        for cell in cells {
            let this = match cell {
                Cell::Null => continue,
                Cell::Bool(_) => Self::Bool,
                Cell::Int(_) => Self::Int,
                Cell::Float(_) => Self::Float,
                Cell::Text(_) => return Self::Text,
            };
            inferred = Some(match (inferred, this) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(Self::Int | Self::Float), Self::Int | Self::Float) => Self::Float,
                _ => return Self::Text,
            });
        }
        inferred.unwrap_or(Self::Text)
    }
}

/// Ordered rows over a shared, ordered column set.
///
/// Rows always have exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    declared: Vec<Option<ColumnType>>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Creates an empty frame with the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        let declared = vec![None; columns.len()];
        Self {
            columns,
            declared,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding with nulls or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Appends a column holding `value` in every row, with an explicit type.
    pub fn push_constant_column(&mut self, name: impl Into<String>, value: &Cell, ty: ColumnType) {
        self.columns.push(name.into());
        self.declared.push(Some(ty));
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    /// Fixes the physical type of a column instead of inferring it.
    pub fn declare_type(&mut self, index: usize, ty: ColumnType) {
        if let Some(slot) = self.declared.get_mut(index) {
            *slot = Some(ty);
        }
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Cells of a named column, if it exists.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        self.column_index(name)
            .map(|index| self.column_cells(index).collect())
    }

    /// Physical type of a column: declared if set, inferred otherwise.
    #[must_use]
    pub fn column_type(&self, index: usize) -> ColumnType {
        self.declared
            .get(index)
            .copied()
            .flatten()
            .unwrap_or_else(|| ColumnType::infer(self.column_cells(index)))
    }

    /// Mutable access to rows for in-crate cleaning steps.
    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }

    /// Per row, whether it holds at least one non-null cell.
    #[must_use]
    pub fn non_null_mask(&self) -> Vec<bool> {
        self.rows
            .iter()
            .map(|row| row.iter().any(|cell| !cell.is_null()))
            .collect()
    }

    /// Keeps the rows whose entry in `keep` is true; rows past its end are kept.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut index = 0;
        self.rows.retain(|_| {
            let kept = keep.get(index).copied().unwrap_or(true);
            index += 1;
            kept
        });
    }

    /// Drops rows in which every cell is null.
    pub fn drop_all_null_rows(&mut self) {
        let keep = self.non_null_mask();
        self.retain_rows(&keep);
    }

    /// Drops rows identical to an earlier row, keeping first occurrences.
    pub fn drop_duplicate_rows(&mut self) {
        let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(self.rows.len());
        self.rows
            .retain(|row| seen.insert(row.iter().map(Cell::key).collect()));
    }

    /// Splits the frame by the exact value of one column.
    ///
    /// Groups are returned in order of first appearance; each keeps every
    /// column and the declared types. Returns `None` if the column is absent.
    #[must_use]
    pub fn partition_by(&self, column: &str) -> Option<Vec<(Cell, Frame)>> {
        let index = self.column_index(column)?;
        let mut order: Vec<(Cell, Frame)> = Vec::new();
        let mut slots: HashMap<CellKey, usize> = HashMap::new();

        for row in &self.rows {
            let value = &row[index];
            let slot = *slots.entry(value.key()).or_insert_with(|| {
                order.push((
                    value.clone(),
                    Frame {
                        columns: self.columns.clone(),
                        declared: self.declared.clone(),
                        rows: Vec::new(),
                    },
                ));
                order.len() - 1
            });
            order[slot].1.rows.push(row.clone());
        }

        Some(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(columns: &[&str], rows: Vec<Vec<Cell>>) -> Frame {
        let mut frame = Frame::new(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            frame.push_row(row);
        }
        frame
    }

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from_json(&json!(null)), Cell::Null);
        assert_eq!(Cell::from_json(&json!(true)), Cell::Bool(true));
        assert_eq!(Cell::from_json(&json!(7)), Cell::Int(7));
        assert_eq!(Cell::from_json(&json!(7.5)), Cell::Float(7.5));
        assert_eq!(Cell::from_json(&json!("x")), Cell::Text("x".into()));
        assert_eq!(
            Cell::from_json(&json!({"a": [1]})),
            Cell::Text(r#"{"a":[1]}"#.into())
        );
        assert_eq!(
            Cell::from_json(&json!(u64::MAX)),
            Cell::Float(u64::MAX as f64)
        );
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::Int(2020).to_string(), "2020");
        assert_eq!(Cell::Float(5.5).to_string(), "5.5");
        assert_eq!(Cell::Float(3.0).to_string(), "3.0");
        assert_eq!(Cell::Bool(false).to_string(), "false");
        assert_eq!(Cell::Text("t".into()).to_string(), "t");
    }

    #[test]
    fn test_cell_key_float_zero_sign() {
        assert_eq!(Cell::Float(0.0).key(), Cell::Float(-0.0).key());
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(ColumnType::infer(&[Cell::Int(1), Cell::Null]), ColumnType::Int);
        assert_eq!(ColumnType::infer(&[Cell::Int(1), Cell::Float(1.5)]), ColumnType::Float);
        assert_eq!(ColumnType::infer(&[Cell::Bool(true)]), ColumnType::Bool);
        assert_eq!(
            ColumnType::infer(&[Cell::Int(1), Cell::Text("a".into())]),
            ColumnType::Text
        );
        assert_eq!(ColumnType::infer(&[Cell::Bool(true), Cell::Int(1)]), ColumnType::Text);
        assert_eq!(ColumnType::infer(&[Cell::Null, Cell::Null]), ColumnType::Text);
        assert_eq!(ColumnType::infer(std::iter::empty()), ColumnType::Text);
    }

    #[test]
    fn test_declared_type_overrides_inference() {
        let mut f = frame(&["year"], vec![vec![Cell::Null]]);
        assert_eq!(f.column_type(0), ColumnType::Text);
        f.declare_type(0, ColumnType::Int);
        assert_eq!(f.column_type(0), ColumnType::Int);
    }

    #[test]
    fn test_push_row_normalises_width() {
        let f = frame(&["a", "b"], vec![vec![Cell::Int(1)], vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]]);
        assert!(f.rows().iter().all(|row| row.len() == 2));
        assert_eq!(f.rows()[0][1], Cell::Null);
    }

    #[test]
    fn test_retain_rows_applies_mask_taken_earlier() {
        let mut f = frame(
            &["a"],
            vec![vec![Cell::Int(1)], vec![Cell::Null], vec![Cell::Text("x".into())]],
        );
        let keep = f.non_null_mask();
        assert_eq!(keep, vec![true, false, true]);

        f.rows_mut()[2][0] = Cell::Null;
        f.retain_rows(&keep);
        assert_eq!(f.rows(), &[vec![Cell::Int(1)], vec![Cell::Null]]);
    }

    #[test]
    fn test_drop_all_null_and_duplicates() {
        let mut f = frame(
            &["a", "b"],
            vec![
                vec![Cell::Int(1), Cell::Null],
                vec![Cell::Null, Cell::Null],
                vec![Cell::Int(1), Cell::Null],
                vec![Cell::Int(1), Cell::Text("x".into())],
            ],
        );
        f.drop_all_null_rows();
        f.drop_duplicate_rows();
        assert_eq!(
            f.rows(),
            &[
                vec![Cell::Int(1), Cell::Null],
                vec![Cell::Int(1), Cell::Text("x".into())],
            ]
        );
    }

    #[test]
    fn test_partition_by_groups_in_first_seen_order() {
        let f = frame(
            &["year", "v"],
            vec![
                vec![Cell::Int(2021), Cell::Int(1)],
                vec![Cell::Int(2020), Cell::Int(2)],
                vec![Cell::Int(2021), Cell::Int(3)],
            ],
        );
        let groups = f.partition_by("year").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Cell::Int(2021));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, Cell::Int(2020));
        assert_eq!(groups[1].1.columns(), f.columns());
        assert!(f.partition_by("missing").is_none());
    }

    #[test]
    fn test_push_constant_column() {
        let mut f = frame(&["a"], vec![vec![Cell::Int(1)], vec![Cell::Int(2)]]);
        f.push_constant_column("tag", &Cell::Text("t".into()), ColumnType::Text);
        assert_eq!(f.columns(), &["a".to_string(), "tag".to_string()]);
        assert!(f.column("tag").unwrap().iter().all(|c| **c == Cell::Text("t".into())));
    }
}
