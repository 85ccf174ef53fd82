// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection-independent query results
//!
//! A [`ResultSet`] is a fully materialized snapshot: rows are copied out of
//! the driver cursor before the job leaves the executor thread, so nothing
//! here refers back to the live connection.
//!
//! Column positions are 1-based, following the SQL driver convention.
//! Position 0 and positions past the last column are simply "not found".

mod value;

pub use value::FieldValue;

use std::collections::HashMap;
use std::sync::Arc;

/// Column name to position mapping, built once per result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnIndex {
    names: Vec<String>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(names: Vec<String>) -> Self {
        let mut exact = HashMap::with_capacity(names.len());
        let mut folded = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated column names
            exact.entry(name.clone()).or_insert(i + 1);
            folded.entry(name.to_lowercase()).or_insert(i + 1);
        }
        Self {
            names,
            exact,
            folded,
        }
    }

    /// 1-based position of `name`, exact match first, then case-insensitive
    pub fn position(&self, name: &str) -> Option<usize> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied()
    }

    /// Column name at 1-based `position`
    pub fn name(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Something that identifies a column: a 1-based position or a name
pub trait ColumnRef {
    fn resolve(&self, columns: &ColumnIndex) -> Option<usize>;
}

impl ColumnRef for usize {
    fn resolve(&self, columns: &ColumnIndex) -> Option<usize> {
        (*self >= 1 && *self <= columns.len()).then_some(*self)
    }
}

// Lets plain integer literals select columns
impl ColumnRef for i32 {
    fn resolve(&self, columns: &ColumnIndex) -> Option<usize> {
        usize::try_from(*self).ok().and_then(|p| p.resolve(columns))
    }
}

impl ColumnRef for &str {
    fn resolve(&self, columns: &ColumnIndex) -> Option<usize> {
        columns.position(self)
    }
}

impl ColumnRef for String {
    fn resolve(&self, columns: &ColumnIndex) -> Option<usize> {
        columns.position(self)
    }
}

/// One materialized row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<ColumnIndex>,
    values: Vec<FieldValue>,
}

impl Row {
    pub fn new(columns: Arc<ColumnIndex>, values: Vec<FieldValue>) -> Self {
        Self { columns, values }
    }

    /// Raw field by 1-based position or column name
    pub fn get<C: ColumnRef>(&self, column: C) -> Option<&FieldValue> {
        column
            .resolve(&self.columns)
            .and_then(|position| self.values.get(position - 1))
    }

    pub fn get_string<C: ColumnRef>(&self, column: C) -> Option<String> {
        self.get(column).and_then(FieldValue::as_string)
    }

    pub fn get_integer<C: ColumnRef>(&self, column: C) -> Option<i64> {
        self.get(column).and_then(FieldValue::as_integer)
    }

    pub fn get_double<C: ColumnRef>(&self, column: C) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_double)
    }

    /// True for SQL NULL; false for missing columns
    pub fn is_null<C: ColumnRef>(&self, column: C) -> bool {
        matches!(self.get(column), Some(FieldValue::Null))
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn columns(&self) -> &ColumnIndex {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column name to value map, for JSON output
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .names()
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Output of one completed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Rows changed by an INSERT, UPDATE or DELETE
    pub affected_rows: u64,
    /// Identifier generated by an INSERT, when the driver reports one
    pub insert_id: Option<i64>,
    /// Rows in database return order
    pub rows: Vec<Row>,
    columns: Arc<ColumnIndex>,
}

impl ResultSet {
    /// Result of a statement that returned rows
    pub fn with_rows(columns: Arc<ColumnIndex>, rows: Vec<Row>) -> Self {
        Self {
            affected_rows: 0,
            insert_id: None,
            rows,
            columns,
        }
    }

    /// Result of a mutation
    pub fn with_changes(affected_rows: u64, insert_id: Option<i64>) -> Self {
        Self {
            affected_rows,
            insert_id,
            rows: Vec::new(),
            columns: Arc::new(ColumnIndex::default()),
        }
    }

    /// 1-based position of a column, `None` when absent
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.position(name)
    }

    pub fn column_name(&self, position: usize) -> Option<&str> {
        self.columns.name(position)
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "affected_rows": self.affected_rows,
            "insert_id": self.insert_id,
            "columns": self.columns.names(),
            "rows": self.rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let columns = Arc::new(ColumnIndex::new(vec!["id".into(), "Name".into()]));
        let rows = vec![
            Row::new(
                Arc::clone(&columns),
                vec![FieldValue::Integer(1), FieldValue::Text("alice".into())],
            ),
            Row::new(
                Arc::clone(&columns),
                vec![FieldValue::Integer(2), FieldValue::Null],
            ),
        ];
        ResultSet::with_rows(columns, rows)
    }

    #[test]
    fn test_lookup_by_position_and_name() {
        let result = sample();
        let row = &result.rows[0];
        assert_eq!(row.get_integer(1), Some(1));
        assert_eq!(row.get_string("Name"), Some("alice".to_string()));
        assert_eq!(row.get_string("name"), Some("alice".to_string()));
        assert_eq!(result.column_index("id"), Some(1));
        assert_eq!(result.column_name(2), Some("Name"));
    }

    #[test]
    fn test_invalid_positions_are_not_found() {
        let result = sample();
        let row = &result.rows[0];
        assert_eq!(row.get(0usize), None);
        assert_eq!(row.get(3usize), None);
        assert_eq!(row.get("missing"), None);
        assert_eq!(result.column_index("missing"), None);
        assert_eq!(result.column_name(0), None);
        assert_eq!(result.column_name(3), None);
    }

    #[test]
    fn test_null_handling() {
        let result = sample();
        let row = &result.rows[1];
        assert!(row.is_null("name"));
        assert!(!row.is_null("missing"));
        assert_eq!(row.get_string(2), None);
    }

    #[test]
    fn test_mutation_result() {
        let result = ResultSet::with_changes(1, Some(17));
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.insert_id, Some(17));
        assert!(result.is_empty());
        assert!(result.column_names().is_empty());
    }

    #[test]
    fn test_json_output() {
        let json = sample().to_json();
        assert_eq!(json["columns"][1], "Name");
        assert_eq!(json["rows"][0]["Name"], "alice");
        assert_eq!(json["rows"][1]["Name"], serde_json::Value::Null);
    }
}
