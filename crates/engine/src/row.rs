use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::column::ColumnId;

/// Stable identifier for a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(pub String);

impl RowId {
    pub fn new() -> Self {
        RowId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall extraction status of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "pending",
            RowStatus::Processing => "processing",
            RowStatus::Completed => "completed",
            RowStatus::Error => "error",
        }
    }
}

/// Per-cell status during a column-targeted re-run. The row's own status is
/// untouched by a column run, so other cells stay interactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRunStatus {
    Processing,
    Error,
}

/// One document's extraction record: per-column cells plus overall status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    /// Reference into the external corpus.
    pub document_id: String,
    /// Cached document title for display without a corpus round-trip.
    pub title: String,
    /// Keys are always a subset of the sheet's current column ids.
    #[serde(default)]
    pub cells: HashMap<ColumnId, Cell>,
    #[serde(default)]
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl Row {
    pub fn new(document_id: &str, title: &str) -> Self {
        Self {
            id: RowId::new(),
            document_id: document_id.to_string(),
            title: title.to_string(),
            cells: HashMap::new(),
            status: RowStatus::Pending,
            error: None,
            extracted_at: None,
        }
    }

    pub fn cell(&self, column_id: &ColumnId) -> Option<&Cell> {
        self.cells.get(column_id)
    }

    pub fn cell_mut(&mut self, column_id: &ColumnId) -> &mut Cell {
        self.cells.entry(column_id.clone()).or_default()
    }

    /// Drop cells and reset to Pending. Used when the column schema is
    /// replaced: cell data is meaningless under a different schema.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.status = RowStatus::Pending;
        self.error = None;
        self.extracted_at = None;
    }

    /// Drop cells whose column id is no longer in the live schema.
    pub fn retain_columns(&mut self, live: &[ColumnId]) {
        self.cells.retain(|id, _| live.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    #[test]
    fn test_new_row_is_pending_and_empty() {
        let row = Row::new("doc-1", "A Paper");
        assert_eq!(row.status, RowStatus::Pending);
        assert!(row.cells.is_empty());
        assert!(row.error.is_none());
        assert!(row.extracted_at.is_none());
    }

    #[test]
    fn test_reset_clears_cells_and_status() {
        let mut row = Row::new("doc-1", "A Paper");
        let col = ColumnId::new();
        row.cell_mut(&col)
            .apply_manual_edit(CellValue::Text("x".to_string()));
        row.status = RowStatus::Completed;
        row.extracted_at = Some(Utc::now());

        row.reset();
        assert!(row.cells.is_empty());
        assert_eq!(row.status, RowStatus::Pending);
        assert!(row.extracted_at.is_none());
    }

    #[test]
    fn test_retain_columns_drops_stale_cells() {
        let mut row = Row::new("doc-1", "A Paper");
        let keep = ColumnId::new();
        let drop = ColumnId::new();
        row.cell_mut(&keep);
        row.cell_mut(&drop);

        row.retain_columns(&[keep.clone()]);
        assert!(row.cell(&keep).is_some());
        assert!(row.cell(&drop).is_none());
    }
}
