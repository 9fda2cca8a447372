//! `papergrid-engine` — Structured-extraction grid engine.
//!
//! Pure engine crate: receives documents and AI completions through
//! collaborator traits, returns typed cells, statuses, and versions.
//! No CLI, IO, or HTTP dependencies.

pub mod cell;
pub mod column;
pub mod error;
pub mod export;
pub mod extract;
pub mod row;
pub mod selection;
pub mod sheet;

pub use cell::{Cell, CellValue, ExtractedValue};
pub use column::{Column, ColumnId, ColumnPreset, ColumnType};
pub use error::GridError;
pub use extract::{Completer, DocumentSource, ExtractionEngine, RunReport, SheetStore};
pub use row::{CellRunStatus, Row, RowId, RowStatus};
pub use selection::{CommitMove, CommitRequest, Selection, SelectionState};
pub use sheet::{Sheet, Version, VersionId};
