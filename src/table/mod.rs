pub mod metadata;

pub use metadata::{TableMetadata, EMPTY_COLUMNS};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Column holding the dimension label of a row (country name, keyword, ...).
pub const LABEL_COLUMN: &str = "label";

/// A single cell. `Absent` is a first-class case and is never conflated with zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Zero, empty text, "0" and absent values are falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Number(n) => *n == 0.0,
            Value::Text(s) => s.is_empty() || s == "0",
            Value::Absent => true,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map_or(Value::Absent, Value::Number)
    }
}

/// Sort direction for [`Table::sort_by_column`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Ordered column storage. Never contains `Value::Absent`.
#[derive(Debug, Clone, Default, PartialEq)]
struct Columns(Vec<(String, Value)>);

impl Columns {
    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(k, _)| k == name)
    }

    fn set(&mut self, name: String, value: Value) {
        if value.is_absent() {
            self.remove(&name);
            return;
        }
        match self.position(&name) {
            Some(i) => self.0[i].1 = value,
            None => self.0.push((name, value)),
        }
    }

    fn remove(&mut self, name: &str) -> Value {
        match self.position(name) {
            Some(i) => self.0.remove(i).1,
            None => Value::Absent,
        }
    }
}

impl Serialize for Columns {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Columns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ColumnsVisitor;

        impl<'de> Visitor<'de> for ColumnsVisitor {
            type Value = Columns;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column names to numbers or strings")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Columns, A::Error> {
                let mut columns = Columns::default();
                while let Some((name, value)) =
                    access.next_entry::<String, crate::table::Value>()?
                {
                    columns.set(name, value);
                }
                Ok(columns)
            }
        }

        deserializer.deserialize_map(ColumnsVisitor)
    }
}

/// One row of a report: ordered columns plus free-form row metadata
/// (logo paths, URLs, segment hints) carried through to consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Columns,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, serde_json::Value>,
}

static ABSENT: Value = Value::Absent;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// The value of a column, or `Value::Absent` if the row does not carry it.
    pub fn get(&self, name: &str) -> &Value {
        self.columns
            .position(name)
            .map(|i| &self.columns.0[i].1)
            .unwrap_or(&ABSENT)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).as_number()
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.position(name).is_some()
    }

    /// Set a column. Setting `Value::Absent` removes the column.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.columns.set(name.to_string(), value.into());
    }

    /// Remove a column, returning its previous value (`Absent` if it was missing).
    pub fn remove(&mut self, name: &str) -> Value {
        self.columns.remove(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.0.is_empty()
    }

    pub fn label(&self) -> Option<&str> {
        self.get(LABEL_COLUMN).as_text()
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Keep only the named columns, in their existing order.
    pub fn retain_columns(&mut self, keep: &[String]) {
        self.columns.0.retain(|(k, _)| keep.iter().any(|c| c == k));
    }
}

/// An ordered collection of rows plus table-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Row>,
    #[serde(default)]
    metadata: TableMetadata,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            metadata: TableMetadata::default(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut TableMetadata {
        &mut self.metadata
    }

    /// Numeric values of a column across all rows; absent and text cells are skipped.
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.rows.iter().filter_map(move |r| r.number(name))
    }

    pub fn any_row_has(&self, name: &str) -> bool {
        self.rows.iter().any(|r| r.has(name))
    }

    /// Remove the named columns from every row. Missing columns are ignored.
    pub fn delete_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        for row in &mut self.rows {
            for name in names {
                row.remove(name.as_ref());
            }
        }
    }

    /// Keep only the named columns in every row.
    pub fn retain_columns(&mut self, keep: &[String]) {
        for row in &mut self.rows {
            row.retain_columns(keep);
        }
    }

    pub fn retain_rows<F: FnMut(&Row) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    /// Stable sort on one column. Rows without the column always sort last.
    pub fn sort_by_column(&mut self, column: &str, order: SortOrder) {
        self.rows
            .sort_by(|a, b| compare_values(a.get(column), b.get(column), order));
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}

fn compare_values(a: &Value, b: &Value, order: SortOrder) -> Ordering {
    match (a, b) {
        (Value::Absent, Value::Absent) => Ordering::Equal,
        (Value::Absent, _) => Ordering::Greater,
        (_, Value::Absent) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            order.apply(x.partial_cmp(y).unwrap_or(Ordering::Equal))
        }
        (Value::Text(x), Value::Text(y)) => order.apply(x.cmp(y)),
        (Value::Number(_), Value::Text(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, conversions: Option<f64>) -> Row {
        Row::new()
            .with_column(LABEL_COLUMN, label)
            .with_column("nb_conversions", conversions)
    }

    #[test]
    fn test_zero_and_absent_are_distinct() {
        let r = Row::new().with_column("sum_time", 0.0);
        assert_eq!(r.get("sum_time"), &Value::Number(0.0));
        assert!(r.has("sum_time"));
        assert_eq!(r.get("nb_hits"), &Value::Absent);
        assert!(!r.has("nb_hits"));
    }

    #[test]
    fn test_set_absent_removes_column() {
        let mut r = Row::new().with_column("a", 1.0).with_column("b", 2.0);
        r.set("a", Value::Absent);
        assert!(!r.has("a"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let mut r = Row::new()
            .with_column("z", 1.0)
            .with_column("a", 2.0)
            .with_column("m", 3.0);
        r.set("a", 5.0);
        let names: Vec<&str> = r.columns().map(|(k, _)| k).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[test]
    fn test_remove_missing_column_is_noop() {
        let mut r = Row::new().with_column("a", 1.0);
        assert_eq!(r.remove("b"), Value::Absent);
        assert_eq!(r.remove("a"), Value::Number(1.0));
        assert!(r.is_empty());
    }

    #[test]
    fn test_is_falsy() {
        assert!(Value::Absent.is_falsy());
        assert!(Value::Number(0.0).is_falsy());
        assert!(Value::Text(String::new()).is_falsy());
        assert!(!Value::Number(0.5).is_falsy());
        assert!(!Value::Text("x".into()).is_falsy());
    }

    #[test]
    fn test_delete_columns_across_rows() {
        let mut table = Table::from_rows(vec![
            Row::new().with_column("a", 1.0).with_column("b", 2.0),
            Row::new().with_column("b", 3.0),
        ]);
        table.delete_columns(&["b", "c"]);
        assert!(!table.any_row_has("b"));
        assert_eq!(table.rows()[0].number("a"), Some(1.0));
    }

    #[test]
    fn test_sort_desc_absent_last() {
        let mut table = Table::from_rows(vec![
            row("a", Some(3.0)),
            row("b", None),
            row("c", Some(8.0)),
            row("d", Some(5.0)),
        ]);
        table.sort_by_column("nb_conversions", SortOrder::Desc);
        let labels: Vec<&str> = table.rows().iter().filter_map(|r| r.label()).collect();
        assert_eq!(labels, ["c", "d", "a", "b"]);

        table.sort_by_column("nb_conversions", SortOrder::Asc);
        let labels: Vec<&str> = table.rows().iter().filter_map(|r| r.label()).collect();
        assert_eq!(labels, ["a", "d", "c", "b"]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut table = Table::from_rows(vec![
            row("first", Some(1.0)),
            row("second", Some(1.0)),
            row("third", Some(2.0)),
        ]);
        table.sort_by_column("nb_conversions", SortOrder::Desc);
        let labels: Vec<&str> = table.rows().iter().filter_map(|r| r.label()).collect();
        assert_eq!(labels, ["third", "first", "second"]);
    }

    #[test]
    fn test_column_values_skip_absent() {
        let table = Table::from_rows(vec![
            row("a", Some(3.0)),
            row("b", None),
            row("c", Some(4.0)),
        ]);
        let sum: f64 = table.column_values("nb_conversions").sum();
        assert_eq!(sum, 7.0);
    }

    #[test]
    fn test_row_json_preserves_column_order() {
        let json = r#"{"columns":{"label":"France","nb_visits":10,"avg_x":null},"metadata":{"code":"fr"}}"#;
        let r: Row = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = r.columns().map(|(k, _)| k).collect();
        assert_eq!(names, ["label", "nb_visits"]);
        assert_eq!(r.label(), Some("France"));
        assert_eq!(r.number("nb_visits"), Some(10.0));
        assert_eq!(r.metadata()["code"], serde_json::json!("fr"));

        let back = serde_json::to_string(&r).unwrap();
        assert_eq!(
            back,
            r#"{"columns":{"label":"France","nb_visits":10.0},"metadata":{"code":"fr"}}"#
        );
    }

    #[test]
    fn test_retain_columns() {
        let mut table = Table::from_rows(vec![Row::new()
            .with_column("label", "x")
            .with_column("conversion_rate", 5.0)
            .with_column("nb_visits", 3.0)]);
        table.retain_columns(&["conversion_rate".to_string()]);
        let names: Vec<&str> = table.rows()[0].columns().map(|(k, _)| k).collect();
        assert_eq!(names, ["conversion_rate"]);
    }
}
