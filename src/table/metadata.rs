use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved metadata key listing columns that were removed from every row
/// because they held no data. Renderers hide these columns entirely.
pub const EMPTY_COLUMNS: &str = "empty_columns";

/// Table-level metadata attached to a [`Table`](super::Table).
///
/// `empty_columns` is append-only and never holds the same name twice; names
/// keep the order in which they were first removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    empty_columns: Vec<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, serde_json::Value>,
}

impl TableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty_columns(&self) -> &[String] {
        &self.empty_columns
    }

    pub fn is_empty_column(&self, name: &str) -> bool {
        self.empty_columns.iter().any(|c| c == name)
    }

    /// Append column names to `empty_columns`, skipping names already listed.
    /// Returns how many names were actually added.
    pub fn add_empty_columns<I, S>(&mut self, columns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for column in columns {
            let column = column.into();
            if !self.is_empty_column(&column) {
                self.empty_columns.push(column);
                added += 1;
            }
        }
        added
    }
}
