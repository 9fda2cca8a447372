//! Extraction orchestration: sequential per-row and per-column AI runs.
//!
//! The engine owns no IO. Documents, completions, and persistence arrive
//! through the three collaborator traits; the engine sequences the calls,
//! maps failures onto per-item statuses, and persists each row as soon as
//! its result is known so a crash mid-run loses at most one in-flight row.

use std::collections::HashSet;

use chrono::Utc;

use crate::cell::{Cell, ExtractedValue};
use crate::column::{Column, ColumnId};
use crate::error::GridError;
use crate::row::{CellRunStatus, Row, RowId, RowStatus};
use crate::sheet::{Sheet, Version};

/// How much of a document is sent to the AI service, in characters.
/// A bounded prefix, not retrieval: long papers are truncated, and facts
/// past this window are invisible to extraction.
pub const DOCUMENT_CONTEXT_CHARS: usize = 12_000;

// ============================================================================
// Collaborator traits
// ============================================================================

/// Read access to the document corpus. Text is assumed already extracted;
/// no binary parsing happens on this side.
pub trait DocumentSource {
    fn document_text(&self, document_id: &str) -> Result<String, GridError>;
}

/// Opaque text-completion service. The engine parses whatever comes back.
pub trait Completer {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GridError>;
}

/// External persistence. Called after every state change; storage layout
/// and retries live behind this trait.
pub trait SheetStore {
    fn list_sheets(&self, collection_id: &str) -> Result<Vec<Sheet>, GridError>;
    fn create_sheet(&self, sheet: &Sheet) -> Result<(), GridError>;
    fn update_sheet(&self, sheet: &Sheet) -> Result<(), GridError>;
    fn delete_sheet(&self, sheet_id: &str) -> Result<(), GridError>;
    fn upsert_row(&self, sheet_id: &str, row: &Row) -> Result<(), GridError>;
    fn delete_row(&self, sheet_id: &str, document_id: &str) -> Result<(), GridError>;
    fn append_version(&self, sheet_id: &str, version: &Version) -> Result<(), GridError>;
}

/// Summary of one extraction run. Persistence failures are non-fatal and
/// collected here instead of aborting the batch; in-memory state is not
/// rolled back when a write fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub persist_errors: Vec<String>,
}

// ============================================================================
// Engine
// ============================================================================

/// Sequential extraction engine for one sheet.
///
/// Owns a per-instance busy flag: a second run while one is in progress is
/// rejected with `GridError::Busy`, never queued. Separate sheets get
/// separate engines and run independently.
pub struct ExtractionEngine<'a, C, A, S>
where
    C: DocumentSource,
    A: Completer,
    S: SheetStore,
{
    source: &'a C,
    completer: &'a A,
    store: &'a S,
    busy: bool,
}

impl<'a, C, A, S> ExtractionEngine<'a, C, A, S>
where
    C: DocumentSource,
    A: Completer,
    S: SheetStore,
{
    pub fn new(source: &'a C, completer: &'a A, store: &'a S) -> Self {
        Self {
            source,
            completer,
            store,
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Run extraction over rows, strictly sequentially in target order.
    ///
    /// With no explicit target set, selects every row whose status is not
    /// Completed; `force_refresh` widens that to all rows. A bulk run never
    /// silently re-does completed work. An explicit target list is honored
    /// as given, completed or not; duplicate ids collapse so each row runs
    /// at most once per invocation.
    ///
    /// Rejected with `GridError::ReadOnly` while the sheet previews a
    /// version: extraction mutates live rows, and preview must not.
    ///
    /// Per row: fetch document text, extract every current column, assemble
    /// a full cells map, then Completed + timestamp. Any collaborator
    /// failure marks that row Error with a message and leaves its
    /// previously-held cells untouched; the loop moves on. Each row is
    /// persisted immediately on completion or failure.
    pub fn run_rows(
        &mut self,
        sheet: &mut Sheet,
        targets: Option<&[RowId]>,
        force_refresh: bool,
    ) -> Result<RunReport, GridError> {
        if self.busy {
            return Err(GridError::Busy);
        }
        if sheet.is_previewing() {
            return Err(GridError::ReadOnly);
        }

        let target_ids: Vec<RowId> = match targets {
            Some(ids) => {
                for id in ids {
                    if sheet.row(id).is_none() {
                        return Err(GridError::UnknownRow(id.to_string()));
                    }
                }
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert((*id).clone()))
                    .cloned()
                    .collect()
            }
            None => sheet
                .rows
                .iter()
                .filter(|r| force_refresh || r.status != RowStatus::Completed)
                .map(|r| r.id.clone())
                .collect(),
        };

        self.busy = true;
        let report = self.run_rows_inner(sheet, &target_ids);
        self.busy = false;
        Ok(report)
    }

    fn run_rows_inner(&mut self, sheet: &mut Sheet, target_ids: &[RowId]) -> RunReport {
        let mut report = RunReport {
            skipped: sheet.rows.len() - target_ids.len(),
            ..RunReport::default()
        };
        let columns = sheet.columns.clone();

        for id in target_ids {
            if let Some(row) = sheet.row_mut(id) {
                row.status = RowStatus::Processing;
                row.error = None;
            }
        }

        for id in target_ids {
            let (document_id, existing_cells) = match sheet.row(id) {
                Some(row) => (row.document_id.clone(), row.cells.clone()),
                None => continue,
            };

            let outcome = self.extract_row(&document_id, &columns, &existing_cells);

            let row = match sheet.row_mut(id) {
                Some(row) => row,
                None => continue,
            };
            match outcome {
                Ok(cells) => {
                    row.cells = cells;
                    row.status = RowStatus::Completed;
                    row.error = None;
                    row.extracted_at = Some(Utc::now());
                    report.completed += 1;
                }
                Err(err) => {
                    // Prior cell values stay as they were: a failed re-run
                    // never erases good data.
                    row.status = RowStatus::Error;
                    row.error = Some(err.to_string());
                    report.failed += 1;
                }
            }

            let row = sheet.row(id).expect("row present");
            if let Err(err) = self.store.upsert_row(&sheet.id, row) {
                report
                    .persist_errors
                    .push(format!("row '{}': {}", row.document_id, err));
            }
        }

        report
    }

    fn extract_row(
        &self,
        document_id: &str,
        columns: &[Column],
        existing: &std::collections::HashMap<ColumnId, Cell>,
    ) -> Result<std::collections::HashMap<ColumnId, Cell>, GridError> {
        let text = self.source.document_text(document_id)?;
        let mut cells = std::collections::HashMap::new();
        for column in columns {
            let result = self.extract_cell(&text, column)?;
            let mut cell = existing.get(&column.id).cloned().unwrap_or_default();
            cell.run_status = None;
            cell.apply_extraction_result(result);
            cells.insert(column.id.clone(), cell);
        }
        Ok(cells)
    }

    /// Re-extract a single column across every row, ignoring row status.
    /// Only the cell's own `run_status` cycles Processing → cleared/Error;
    /// the row's status is untouched so its other cells stay interactive.
    pub fn run_column(
        &mut self,
        sheet: &mut Sheet,
        column_id: &ColumnId,
    ) -> Result<RunReport, GridError> {
        if self.busy {
            return Err(GridError::Busy);
        }
        if sheet.is_previewing() {
            return Err(GridError::ReadOnly);
        }
        let column = sheet
            .column(column_id)
            .cloned()
            .ok_or_else(|| GridError::UnknownColumn(column_id.to_string()))?;

        self.busy = true;
        let report = self.run_column_inner(sheet, &column);
        self.busy = false;
        Ok(report)
    }

    fn run_column_inner(&mut self, sheet: &mut Sheet, column: &Column) -> RunReport {
        let mut report = RunReport::default();
        let row_ids: Vec<RowId> = sheet.rows.iter().map(|r| r.id.clone()).collect();

        for id in &row_ids {
            let document_id = match sheet.row_mut(id) {
                Some(row) => {
                    row.cell_mut(&column.id).run_status = Some(CellRunStatus::Processing);
                    row.document_id.clone()
                }
                None => continue,
            };

            let outcome = self
                .source
                .document_text(&document_id)
                .and_then(|text| self.extract_cell(&text, column));

            let row = match sheet.row_mut(id) {
                Some(row) => row,
                None => continue,
            };
            let cell = row.cell_mut(&column.id);
            match outcome {
                Ok(result) => {
                    cell.apply_extraction_result(result);
                    cell.run_status = None;
                    report.completed += 1;
                }
                Err(_) => {
                    cell.run_status = Some(CellRunStatus::Error);
                    report.failed += 1;
                }
            }

            let row = sheet.row(id).expect("row present");
            if let Err(err) = self.store.upsert_row(&sheet.id, row) {
                report
                    .persist_errors
                    .push(format!("row '{}': {}", row.document_id, err));
            }
        }

        report
    }

    /// Extract one column's value from document text.
    ///
    /// Transport/API failures propagate as `Err` for the caller to map onto
    /// row or cell status. A reply that cannot be parsed degrades to a
    /// Null, zero-confidence value instead of propagating.
    pub fn extract_cell(
        &self,
        document_text: &str,
        column: &Column,
    ) -> Result<ExtractedValue, GridError> {
        let system_prompt = extraction_system_prompt();
        let user_prompt = extraction_user_prompt(document_text, column);
        let reply = self.completer.complete(&system_prompt, &user_prompt)?;
        Ok(parse_extraction_reply(&reply, column))
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

fn extraction_system_prompt() -> String {
    r#"You are a research assistant extracting one specific fact from an academic paper.

CRITICAL INSTRUCTIONS:
1. Return ONLY valid JSON with exactly these keys: "value", "confidence", "sourceText"
2. "value" is your answer as a short string, or null if the paper does not contain the fact
3. "confidence" is a number between 0 and 1
4. "sourceText" is a short verbatim excerpt from the paper supporting your answer, or null
5. Do NOT include any text before or after the JSON
6. Do NOT use markdown code blocks

Example response:
{"value": "342", "confidence": 0.9, "sourceText": "We recruited 342 participants."}"#
        .to_string()
}

fn extraction_user_prompt(document_text: &str, column: &Column) -> String {
    let mut prompt = String::new();

    prompt.push_str("FACT TO EXTRACT:\n");
    prompt.push_str(&column.prompt);
    prompt.push('\n');

    match column.column_type {
        crate::column::ColumnType::Number => {
            prompt.push_str("\nAnswer with a plain number only.\n");
        }
        crate::column::ColumnType::Boolean => {
            prompt.push_str("\nAnswer \"yes\" or \"no\" only.\n");
        }
        crate::column::ColumnType::SingleSelect => {
            prompt.push_str("\nAnswer with exactly one of these options:\n");
            for opt in &column.options {
                prompt.push_str("- ");
                prompt.push_str(opt);
                prompt.push('\n');
            }
        }
        crate::column::ColumnType::MultiSelect => {
            prompt.push_str("\nAnswer with a comma-separated list drawn from these options:\n");
            for opt in &column.options {
                prompt.push_str("- ");
                prompt.push_str(opt);
                prompt.push('\n');
            }
        }
        crate::column::ColumnType::Text => {}
    }

    prompt.push_str("\nDOCUMENT:\n");
    prompt.push_str(truncate_chars(document_text, DOCUMENT_CONTEXT_CHARS));
    prompt.push('\n');

    prompt
}

/// Truncate at a char boundary without allocating.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Parse the AI reply into a typed result. Tolerates replies wrapped in
/// extra prose or markdown fences by falling back to the outermost JSON
/// object; anything still unparseable degrades to Null / confidence 0.
pub fn parse_extraction_reply(reply: &str, column: &Column) -> ExtractedValue {
    let parsed: serde_json::Value = match serde_json::from_str(reply) {
        Ok(v) => v,
        Err(_) => {
            let start = reply.find('{');
            let end = reply.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => match serde_json::from_str(&reply[s..=e]) {
                    Ok(v) => v,
                    Err(_) => return ExtractedValue::null(),
                },
                _ => return ExtractedValue::null(),
            }
        }
    };

    let raw_value = match parsed.get("value") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => if *b { "yes" } else { "no" }.to_string(),
        _ => String::new(),
    };

    let confidence = parsed
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let source_text = parsed
        .get("sourceText")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty());

    let value = column.column_type.coerce(&raw_value);
    // A null answer carries no evidence; don't report confidence for it.
    let confidence = if value.is_null() { 0.0 } else { confidence };
    ExtractedValue {
        value,
        confidence,
        source_text,
    }
}
