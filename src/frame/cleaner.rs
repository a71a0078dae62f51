//! Raw record to [`Frame`] normalisation.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::extract_records;
use super::naming::to_snake_case;
use super::table::{Cell, ColumnType, Frame};

/// Name of the provenance column appended to every cleaned frame.
pub const PROVENANCE_COLUMN: &str = "fetched_at";

/// Column names coerced to nullable floats.
pub const VALUE_COLUMNS: [&str; 4] = ["value", "val", "quantity", "amount"];

/// Extracts records from a raw response and cleans them.
#[must_use]
pub fn clean_response(raw: Value) -> Frame {
    clean_records(extract_records(raw).into_records())
}

/// Cleans records, stamping them with the current time.
#[must_use]
pub fn clean_records(records: Vec<Value>) -> Frame {
    clean_records_at(records, Utc::now())
}

/// Cleans records, stamping them with `fetched_at`.
///
/// Steps, in order:
/// 1. rename every field to `snake_case`
/// 2. coerce `*year*` columns to integers and value-like columns to floats
/// 3. drop rows that had no non-null field before coercion
/// 4. drop duplicate rows
/// 5. append [`PROVENANCE_COLUMN`]
///
/// An empty input yields an empty frame with no columns.
#[must_use]
pub fn clean_records_at(records: Vec<Value>, fetched_at: DateTime<Utc>) -> Frame {
    if records.is_empty() {
        return Frame::default();
    }
    let input_rows = records.len();

    let mut frame = build_frame(records);
    // a field that fails coercion still counts as present
    let keep = frame.non_null_mask();
    coerce_columns(&mut frame);
    frame.retain_rows(&keep);
    let non_null_rows = frame.len();
    frame.drop_duplicate_rows();

    let stamp = fetched_at.to_rfc3339_opts(SecondsFormat::Micros, false);
    frame.push_constant_column(PROVENANCE_COLUMN, &Cell::Text(stamp), ColumnType::Text);

    debug!(
        input_rows,
        dropped_null = input_rows - non_null_rows,
        dropped_duplicate = non_null_rows - frame.len(),
        rows = frame.len(),
        columns = frame.columns().len(),
        "cleaned records"
    );
    frame
}

/// Renames fields and lays records out as rows.
///
/// Columns appear in first-seen order. When two raw keys map to the same
/// name the first non-null value wins.
fn build_frame(records: Vec<Value>) -> Frame {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut rows: Vec<Vec<(usize, Cell)>> = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let Value::Object(fields) = record else {
            warn!(index, kind = json_kind(&record), "skipping record that is not an object");
            continue;
        };
        let mut row = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let name = renamed
                .entry(key)
                .or_insert_with_key(|key| to_snake_case(key))
                .clone();
            if name == PROVENANCE_COLUMN {
                debug!(column = %name, "ignoring upstream field that shadows provenance");
                continue;
            }
            let position = *positions.entry(name).or_insert_with_key(|name| {
                columns.push(name.clone());
                columns.len() - 1
            });
            row.push((position, Cell::from_json(&value)));
        }
        rows.push(row);
    }

    let width = columns.len();
    let mut frame = Frame::new(columns);
    for fields in rows {
        let mut row = vec![Cell::Null; width];
        for (position, cell) in fields {
            if row[position].is_null() {
                row[position] = cell;
            }
        }
        frame.push_row(row);
    }
    frame
}

fn coerce_columns(frame: &mut Frame) {
    let plan: Vec<(usize, ColumnType)> = frame
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            if name.contains("year") {
                Some((index, ColumnType::Int))
            } else if VALUE_COLUMNS.contains(&name.as_str()) {
                Some((index, ColumnType::Float))
            } else {
                None
            }
        })
        .collect();

    for &(index, ty) in &plan {
        frame.declare_type(index, ty);
    }
    for row in frame.rows_mut() {
        for &(index, ty) in &plan {
            let cell = std::mem::replace(&mut row[index], Cell::Null);
            row[index] = match ty {
                ColumnType::Int => coerce_year(cell),
                _ => coerce_value(cell),
            };
        }
    }
}

/// Coerces a cell to an integer, or null when it is not a whole number.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn coerce_year(cell: Cell) -> Cell {
    let whole = |f: f64| {
        (f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64).then(|| Cell::Int(f as i64))
    };
    match cell {
        Cell::Int(i) => Cell::Int(i),
        Cell::Float(f) => whole(f).unwrap_or(Cell::Null),
        Cell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Cell::Int)
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
                .unwrap_or(Cell::Null)
        }
        Cell::Null | Cell::Bool(_) => Cell::Null,
    }
}

/// Coerces a cell to a float, or null when it is not numeric.
#[allow(clippy::cast_precision_loss)]
fn coerce_value(cell: Cell) -> Cell {
    let number = match cell {
        Cell::Int(i) => Some(i as f64),
        Cell::Float(f) => Some(f),
        Cell::Text(s) => s.trim().parse::<f64>().ok(),
        Cell::Null | Cell::Bool(_) => None,
    };
    number
        .filter(|f| !f.is_nan())
        .map_or(Cell::Null, Cell::Float)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn records(raw: Value) -> Vec<Value> {
        extract_records(raw).into_records()
    }

    #[test]
    fn test_clean_mixed_year_and_value_rows() {
        let raw = json!({"data": [{"Year": "2020", "Value": "5.5"}, {"Year": "x", "Value": null}]});
        let frame = clean_records_at(records(raw), at(1_700_000_000));

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("year").unwrap(), vec![&Cell::Int(2020), &Cell::Null]);
        assert_eq!(frame.column("value").unwrap(), vec![&Cell::Float(5.5), &Cell::Null]);
        let provenance: Vec<_> = frame
            .columns()
            .iter()
            .filter(|c| *c == PROVENANCE_COLUMN)
            .collect();
        assert_eq!(provenance.len(), 1);
        assert_eq!(frame.columns().last().unwrap(), PROVENANCE_COLUMN);
    }

    #[test]
    fn test_clean_empty_input_returns_empty_frame() {
        let frame = clean_records_at(Vec::new(), at(0));
        assert!(frame.is_empty());
        assert!(frame.columns().is_empty());
        assert!(clean_response(json!([])).is_empty());
        assert!(clean_response(Value::Null).is_empty());
    }

    #[test]
    fn test_clean_renames_columns() {
        let raw = json!([{"Area Code": 4, "ElementCode": 5510, "Item-Code (CPC)": "0111"}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(
            frame.columns(),
            &["area_code", "element_code", "item_code_(cpc)", PROVENANCE_COLUMN]
        );
    }

    #[test]
    fn test_clean_coerces_every_year_like_column() {
        let raw = json!([{"Year Code": "2019", "StartYear": 2001.0, "Yearly": true, "Area": "x"}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.column("year_code").unwrap(), vec![&Cell::Int(2019)]);
        assert_eq!(frame.column("start_year").unwrap(), vec![&Cell::Int(2001)]);
        assert_eq!(frame.column("yearly").unwrap(), vec![&Cell::Null]);
        let index = frame.column_index("yearly").unwrap();
        assert_eq!(frame.column_type(index), ColumnType::Int);
    }

    #[test]
    fn test_clean_coerces_value_like_columns() {
        let raw = json!([
            {"Val": 3, "Quantity": "1e3", "Amount": "n/a", "Value Flag": "A"}
        ]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.column("val").unwrap(), vec![&Cell::Float(3.0)]);
        assert_eq!(frame.column("quantity").unwrap(), vec![&Cell::Float(1000.0)]);
        assert_eq!(frame.column("amount").unwrap(), vec![&Cell::Null]);
        // only exact names are value columns
        assert_eq!(frame.column("value_flag").unwrap(), vec![&Cell::Text("A".into())]);
    }

    #[test]
    fn test_coerce_year_edge_cases() {
        assert_eq!(coerce_year(Cell::Text(" 1999 ".into())), Cell::Int(1999));
        assert_eq!(coerce_year(Cell::Text("2020.0".into())), Cell::Int(2020));
        assert_eq!(coerce_year(Cell::Text("2020.5".into())), Cell::Null);
        assert_eq!(coerce_year(Cell::Float(f64::NAN)), Cell::Null);
        assert_eq!(coerce_year(Cell::Text("2019-2021".into())), Cell::Null);
    }

    #[test]
    fn test_coerce_value_rejects_nan() {
        assert_eq!(coerce_value(Cell::Text("NaN".into())), Cell::Null);
        assert_eq!(coerce_value(Cell::Text("-0.25".into())), Cell::Float(-0.25));
        assert_eq!(coerce_value(Cell::Bool(true)), Cell::Null);
    }

    #[test]
    fn test_clean_drops_all_null_rows_and_duplicates() {
        let raw = json!([
            {"Area": "France", "Value": 1},
            {"Area": null, "Value": null},
            {"Area": "France", "Value": "1.0"},
            {"Area": "Chad", "Value": 1},
        ]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.column("area").unwrap(),
            vec![&Cell::Text("France".into()), &Cell::Text("Chad".into())]
        );
    }

    #[test]
    fn test_clean_keeps_row_whose_only_field_fails_coercion() {
        let raw = json!([{"Year": "unknown"}, {"Year": null}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.column("year").unwrap(), vec![&Cell::Null]);
    }

    #[test]
    fn test_clean_provenance_is_identical_within_a_run() {
        let raw = json!([{"a": 1}, {"a": 2}, {"a": 3}]);
        let frame = clean_records_at(records(raw), at(1_700_000_000));
        let stamps = frame.column(PROVENANCE_COLUMN).unwrap();
        assert!(stamps.iter().all(|s| *s == stamps[0]));
        assert_eq!(
            stamps[0],
            &Cell::Text("2023-11-14T22:13:20.000000+00:00".into())
        );
    }

    #[test]
    fn test_clean_provenance_differs_between_runs() {
        let first = clean_records_at(records(json!([{"a": 1}])), at(100));
        let second = clean_records_at(records(json!([{"a": 1}])), at(101));
        assert_ne!(
            first.column(PROVENANCE_COLUMN).unwrap(),
            second.column(PROVENANCE_COLUMN).unwrap()
        );
    }

    #[test]
    fn test_clean_merges_colliding_names() {
        let raw = json!([{"AreaCode": null, "Area Code": 4, "x": 1}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.columns(), &["area_code", "x", PROVENANCE_COLUMN]);
        assert_eq!(frame.column("area_code").unwrap(), vec![&Cell::Int(4)]);
    }

    #[test]
    fn test_clean_skips_non_object_records() {
        let raw = json!([1, "two", {"a": 3}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.column("a").unwrap(), vec![&Cell::Int(3)]);
    }

    #[test]
    fn test_clean_ignores_upstream_fetched_at() {
        let raw = json!([{"FetchedAt": "yesterday", "a": 1}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.columns(), &["a", PROVENANCE_COLUMN]);
    }

    #[test]
    fn test_clean_missing_fields_become_null() {
        let raw = json!([{"a": 1}, {"b": 2}]);
        let frame = clean_records_at(records(raw), at(0));
        assert_eq!(frame.column("a").unwrap(), vec![&Cell::Int(1), &Cell::Null]);
        assert_eq!(frame.column("b").unwrap(), vec![&Cell::Null, &Cell::Int(2)]);
    }
}
