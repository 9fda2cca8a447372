//! End-to-end extraction scenarios against in-memory fake collaborators.

use std::cell::RefCell;
use std::collections::HashMap;

use papergrid_engine::{
    Cell, CellRunStatus, CellValue, Column, ColumnType, Completer, DocumentSource,
    ExtractionEngine, GridError, Row, RowStatus, Sheet, SheetStore, Version,
};

// ============================================================================
// Fakes
// ============================================================================

/// Corpus backed by a map; missing ids behave like an empty library.
struct FakeCorpus {
    docs: HashMap<String, String>,
}

impl FakeCorpus {
    fn new(docs: &[(&str, &str)]) -> Self {
        Self {
            docs: docs
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        }
    }
}

impl DocumentSource for FakeCorpus {
    fn document_text(&self, document_id: &str) -> Result<String, GridError> {
        self.docs
            .get(document_id)
            .cloned()
            .ok_or_else(|| GridError::DocumentUnavailable {
                document_id: document_id.to_string(),
            })
    }
}

/// Completer with a scripted reply per call; `fail_on` makes the nth call
/// (1-based) return a service error.
struct FakeCompleter {
    reply: String,
    fail_on: Option<usize>,
    calls: RefCell<usize>,
}

impl FakeCompleter {
    fn always(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_on: None,
            calls: RefCell::new(0),
        }
    }

    fn failing_on(reply: &str, call: usize) -> Self {
        Self {
            reply: reply.to_string(),
            fail_on: Some(call),
            calls: RefCell::new(0),
        }
    }

    fn call_count(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Completer for FakeCompleter {
    fn complete(&self, _system: &str, _user: &str) -> Result<String, GridError> {
        let mut calls = self.calls.borrow_mut();
        *calls += 1;
        if Some(*calls) == self.fail_on {
            return Err(GridError::Service("simulated outage".to_string()));
        }
        Ok(self.reply.clone())
    }
}

/// Store that records every upsert; optionally fails all writes.
#[derive(Default)]
struct RecordingStore {
    upserts: RefCell<Vec<String>>,
    fail_writes: bool,
}

impl SheetStore for RecordingStore {
    fn list_sheets(&self, _collection_id: &str) -> Result<Vec<Sheet>, GridError> {
        Ok(Vec::new())
    }
    fn create_sheet(&self, _sheet: &Sheet) -> Result<(), GridError> {
        Ok(())
    }
    fn update_sheet(&self, _sheet: &Sheet) -> Result<(), GridError> {
        Ok(())
    }
    fn delete_sheet(&self, _sheet_id: &str) -> Result<(), GridError> {
        Ok(())
    }
    fn upsert_row(&self, _sheet_id: &str, row: &Row) -> Result<(), GridError> {
        if self.fail_writes {
            return Err(GridError::Store("disk full".to_string()));
        }
        self.upserts.borrow_mut().push(row.document_id.clone());
        Ok(())
    }
    fn delete_row(&self, _sheet_id: &str, _document_id: &str) -> Result<(), GridError> {
        Ok(())
    }
    fn append_version(&self, _sheet_id: &str, _version: &Version) -> Result<(), GridError> {
        Ok(())
    }
}

fn three_row_sheet() -> Sheet {
    let mut sheet = Sheet::new("grid", "collection-1");
    sheet.add_column(Column::new("Finding", ColumnType::Text, "main finding?"));
    sheet.add_column(Column::new("Sample size", ColumnType::Number, "n?"));
    sheet.add_document("doc-a", "Paper A");
    sheet.add_document("doc-b", "Paper B");
    sheet.add_document("doc-c", "Paper C");
    sheet
}

fn corpus_for(sheet: &Sheet) -> FakeCorpus {
    let pairs: Vec<(String, String)> = sheet
        .rows
        .iter()
        .map(|r| (r.document_id.clone(), format!("text of {}", r.title)))
        .collect();
    FakeCorpus {
        docs: pairs.into_iter().collect(),
    }
}

const GOOD_REPLY: &str = r#"{"value": "57", "confidence": 0.8, "sourceText": "n = 57"}"#;

// ============================================================================
// Row runs
// ============================================================================

#[test]
fn bulk_run_skips_completed_rows() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);

    // Pre-complete one row with data that must survive untouched.
    let col = sheet.columns[0].id.clone();
    let done_id = sheet.rows[1].id.clone();
    {
        let row = sheet.row_mut(&done_id).unwrap();
        row.cell_mut(&col)
            .apply_manual_edit(CellValue::Text("prior answer".to_string()));
        row.status = RowStatus::Completed;
    }

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 1);

    // Two rows, two columns each.
    assert_eq!(completer.call_count(), 4);
    // The completed row kept its prior data and was never persisted.
    let done = sheet.row(&done_id).unwrap();
    assert_eq!(
        done.cells[&col].value,
        CellValue::Text("prior answer".to_string())
    );
    assert_eq!(store.upserts.borrow().len(), 2);
    assert!(!store.upserts.borrow().contains(&"doc-b".to_string()));
}

#[test]
fn force_refresh_redoes_completed_rows() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    sheet.rows[0].status = RowStatus::Completed;
    sheet.rows[1].status = RowStatus::Completed;
    sheet.rows[2].status = RowStatus::Completed;

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_rows(&mut sheet, None, true).unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(report.skipped, 0);
}

#[test]
fn failing_ai_call_fails_only_its_row() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);

    let col = sheet.columns[0].id.clone();
    let done_id = sheet.rows[2].id.clone();
    {
        let row = sheet.row_mut(&done_id).unwrap();
        row.cell_mut(&col)
            .apply_manual_edit(CellValue::Text("kept".to_string()));
        row.status = RowStatus::Completed;
    }

    // Two target rows (a, b), two columns each: fail the first call of
    // row b (call 3 overall).
    let completer = FakeCompleter::failing_on(GOOD_REPLY, 3);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    // Give row b some prior data to prove a failed re-run never erases it.
    let b_id = sheet.rows[1].id.clone();
    sheet
        .row_mut(&b_id)
        .unwrap()
        .cell_mut(&col)
        .apply_manual_edit(CellValue::Text("earlier good data".to_string()));

    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);

    let a = &sheet.rows[0];
    assert_eq!(a.status, RowStatus::Completed);
    assert!(a.extracted_at.is_some());

    let b = sheet.row(&b_id).unwrap();
    assert_eq!(b.status, RowStatus::Error);
    assert!(b.error.as_deref().unwrap().contains("simulated outage"));
    assert_eq!(
        b.cells[&col].value,
        CellValue::Text("earlier good data".to_string())
    );

    // Untargeted completed row untouched.
    assert_eq!(sheet.row(&done_id).unwrap().status, RowStatus::Completed);

    // Both processed rows persisted, success and failure alike.
    assert_eq!(store.upserts.borrow().as_slice(), ["doc-a", "doc-b"]);
}

#[test]
fn missing_document_marks_row_error() {
    let mut sheet = three_row_sheet();
    let corpus = FakeCorpus::new(&[("doc-a", "text"), ("doc-c", "text")]);

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);

    let b = &sheet.rows[1];
    assert_eq!(b.status, RowStatus::Error);
    assert!(b.error.as_deref().unwrap().contains("doc-b"));
}

#[test]
fn explicit_targets_override_status_filter() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    sheet.rows[0].status = RowStatus::Completed;
    let target = sheet.rows[0].id.clone();

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine
        .run_rows(&mut sheet, Some(&[target.clone()]), false)
        .unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.skipped, 2);
    assert!(sheet.row(&target).unwrap().extracted_at.is_some());
}

#[test]
fn duplicate_targets_run_once_per_row() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let target = sheet.rows[0].id.clone();

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine
        .run_rows(&mut sheet, Some(&[target.clone(), target.clone()]), false)
        .unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.skipped, 2);

    // One row, two columns: the repeated id never triggers a second pass.
    assert_eq!(completer.call_count(), 2);
    assert_eq!(store.upserts.borrow().as_slice(), ["doc-a"]);
}

#[test]
fn previewing_sheet_rejects_extraction() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let vid = sheet.save_version("v1").id.clone();
    sheet.enter_preview(&vid).unwrap();

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let err = engine.run_rows(&mut sheet, None, false).unwrap_err();
    assert!(matches!(err, GridError::ReadOnly));

    let col = sheet.columns[0].id.clone();
    let err = engine.run_column(&mut sheet, &col).unwrap_err();
    assert!(matches!(err, GridError::ReadOnly));

    assert_eq!(completer.call_count(), 0);
    assert!(sheet.rows.iter().all(|r| r.status == RowStatus::Pending));

    // Leaving the preview makes the same run valid again.
    sheet.exit_preview();
    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    assert_eq!(report.completed, 3);
}

#[test]
fn unknown_target_is_rejected_before_any_work() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let bogus = papergrid_engine::RowId::new();
    let err = engine
        .run_rows(&mut sheet, Some(&[bogus]), false)
        .unwrap_err();
    assert!(matches!(err, GridError::UnknownRow(_)));
    assert_eq!(completer.call_count(), 0);
}

#[test]
fn persistence_failure_is_reported_not_fatal() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore {
        fail_writes: true,
        ..RecordingStore::default()
    };
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    // All rows still completed in memory; every write failure reported.
    assert_eq!(report.completed, 3);
    assert_eq!(report.persist_errors.len(), 3);
    assert!(sheet.rows.iter().all(|r| r.status == RowStatus::Completed));
}

// ============================================================================
// Column runs
// ============================================================================

#[test]
fn column_run_touches_every_row_but_not_row_status() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    sheet.rows[0].status = RowStatus::Completed;
    sheet.rows[1].status = RowStatus::Error;
    let col = sheet.columns[1].id.clone();

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_column(&mut sheet, &col).unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(completer.call_count(), 3);

    // Row statuses untouched, cells populated, run_status cleared.
    assert_eq!(sheet.rows[0].status, RowStatus::Completed);
    assert_eq!(sheet.rows[1].status, RowStatus::Error);
    assert_eq!(sheet.rows[2].status, RowStatus::Pending);
    for row in &sheet.rows {
        let cell = row.cell(&col).unwrap();
        assert_eq!(cell.value, CellValue::Number(57.0));
        assert!(cell.run_status.is_none());
    }
    assert_eq!(store.upserts.borrow().len(), 3);
}

#[test]
fn column_run_failure_flags_cell_not_row() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let col = sheet.columns[0].id.clone();

    let completer = FakeCompleter::failing_on(GOOD_REPLY, 2);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_column(&mut sheet, &col).unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);

    let failed_cell: &Cell = sheet.rows[1].cell(&col).unwrap();
    assert_eq!(failed_cell.run_status, Some(CellRunStatus::Error));
    assert_eq!(sheet.rows[1].status, RowStatus::Pending);
}

#[test]
fn column_run_unknown_column() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let err = engine
        .run_column(&mut sheet, &papergrid_engine::ColumnId::new())
        .unwrap_err();
    assert!(matches!(err, GridError::UnknownColumn(_)));
}

// ============================================================================
// Degraded parses
// ============================================================================

#[test]
fn unparseable_reply_yields_null_cell_but_row_completes() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let completer = FakeCompleter::always("no json here, sorry");
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);

    let report = engine.run_rows(&mut sheet, None, false).unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);

    let col = sheet.columns[0].id.clone();
    for row in &sheet.rows {
        let cell = row.cell(&col).unwrap();
        assert_eq!(cell.value, CellValue::Null);
        assert_eq!(cell.confidence, Some(0.0));
        assert_eq!(row.status, RowStatus::Completed);
    }
}

#[test]
fn fresh_extraction_overwrites_manual_override() {
    let mut sheet = three_row_sheet();
    let corpus = corpus_for(&sheet);
    let col = sheet.columns[1].id.clone();
    let row_id = sheet.rows[0].id.clone();
    sheet
        .row_mut(&row_id)
        .unwrap()
        .cell_mut(&col)
        .apply_manual_edit(CellValue::Number(1.0));

    let completer = FakeCompleter::always(GOOD_REPLY);
    let store = RecordingStore::default();
    let mut engine = ExtractionEngine::new(&corpus, &completer, &store);
    engine
        .run_rows(&mut sheet, Some(&[row_id.clone()]), false)
        .unwrap();

    let cell = sheet.row(&row_id).unwrap().cell(&col).unwrap();
    assert_eq!(cell.value, CellValue::Number(57.0));
    assert_eq!(cell.ai_value, Some(CellValue::Number(57.0)));
    assert!(!cell.is_overridden());
}
