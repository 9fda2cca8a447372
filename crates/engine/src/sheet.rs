use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnId, ColumnPreset};
use crate::error::GridError;
use crate::row::{Row, RowId};

/// Stable identifier for a saved version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn new() -> Self {
        VersionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, named snapshot of a sheet's columns and rows.
///
/// Contents are deep copies taken at save time and never change afterward,
/// no matter how the live sheet mutates. Deletion, if offered at all, is an
/// outer-layer concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

/// The top-level extraction grid for one collection of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub id: String,
    pub name: String,
    /// The collection of documents this sheet draws from.
    pub collection_id: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Append-only. Never reordered or edited in place.
    #[serde(default)]
    pub versions: Vec<Version>,
    /// When set, consumers render that snapshot instead of live data and
    /// the selection controller goes read-only. Never persisted.
    #[serde(skip)]
    pub viewing_version: Option<VersionId>,
}

impl Sheet {
    pub fn new(name: &str, collection_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            collection_id: collection_id.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            versions: Vec::new(),
            viewing_version: None,
        }
    }

    // =========================================================================
    // Document membership
    // =========================================================================

    /// Add a document to the sheet: one Pending row with empty cells.
    /// At most one row per document; adding an existing document returns the
    /// existing row's id.
    pub fn add_document(&mut self, document_id: &str, title: &str) -> RowId {
        if let Some(row) = self.rows.iter().find(|r| r.document_id == document_id) {
            return row.id.clone();
        }
        let row = Row::new(document_id, title);
        let id = row.id.clone();
        self.rows.push(row);
        id
    }

    /// Remove a document's live row. Version-embedded copies are unaffected.
    /// Returns the removed row, if any.
    pub fn remove_document(&mut self, document_id: &str) -> Option<Row> {
        let idx = self.rows.iter().position(|r| r.document_id == document_id)?;
        Some(self.rows.remove(idx))
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.document_id.as_str()).collect()
    }

    pub fn row(&self, id: &RowId) -> Option<&Row> {
        self.rows.iter().find(|r| &r.id == id)
    }

    pub fn row_mut(&mut self, id: &RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| &r.id == id)
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Replace the column list. Destructive: every row's cells are cleared
    /// and every row resets to Pending, because cell data is meaningless
    /// under a different schema. Callers gate this behind confirmation.
    pub fn replace_columns(&mut self, columns: Vec<Column>) {
        self.columns = columns;
        for row in &mut self.rows {
            row.reset();
        }
    }

    pub fn apply_preset(&mut self, preset: &ColumnPreset) {
        self.replace_columns(preset.columns.clone());
    }

    /// Add a single column. Existing cells are untouched; the new column's
    /// cells simply don't exist yet.
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Remove a single column and its cells from every row.
    pub fn remove_column(&mut self, column_id: &ColumnId) -> Option<Column> {
        let idx = self.columns.iter().position(|c| &c.id == column_id)?;
        let removed = self.columns.remove(idx);
        let live = self.column_ids();
        for row in &mut self.rows {
            row.retain_columns(&live);
        }
        Some(removed)
    }

    // =========================================================================
    // Versions and preview
    // =========================================================================

    /// Deep-copy the live columns and rows into a new version, appended to
    /// the version list.
    pub fn save_version(&mut self, name: &str) -> &Version {
        let version = Version {
            id: VersionId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        };
        self.versions.push(version);
        self.versions.last().expect("just pushed")
    }

    pub fn version(&self, id: &VersionId) -> Option<&Version> {
        self.versions.iter().find(|v| &v.id == id)
    }

    /// Point consumers at a snapshot. Live columns/rows are not touched;
    /// preview is a pure overlay.
    pub fn enter_preview(&mut self, version_id: &VersionId) -> Result<(), GridError> {
        if self.version(version_id).is_none() {
            return Err(GridError::UnknownVersion(version_id.to_string()));
        }
        self.viewing_version = Some(version_id.clone());
        Ok(())
    }

    /// Clear the preview pointer; the live sheet is exactly as it was
    /// before the preview started.
    pub fn exit_preview(&mut self) {
        self.viewing_version = None;
    }

    pub fn is_previewing(&self) -> bool {
        self.viewing_version.is_some()
    }

    /// The columns consumers should render: the previewed snapshot's when a
    /// preview is active, live otherwise.
    pub fn visible_columns(&self) -> &[Column] {
        match self.previewed_version() {
            Some(v) => &v.columns,
            None => &self.columns,
        }
    }

    /// The rows consumers should render (see `visible_columns`).
    pub fn visible_rows(&self) -> &[Row] {
        match self.previewed_version() {
            Some(v) => &v.rows,
            None => &self.rows,
        }
    }

    fn previewed_version(&self) -> Option<&Version> {
        self.viewing_version.as_ref().and_then(|id| self.version(id))
    }
}
