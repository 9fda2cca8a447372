use serde::{Deserialize, Serialize};

use crate::column::ColumnType;
use crate::row::CellRunStatus;

/// A typed cell value. The concrete shape must match the owning column's
/// type; mismatches (after a column type edit) read as Null rather than
/// failing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Shape check against a column type. Null conforms to every type.
    pub fn conforms_to(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (CellValue::Null, _) => true,
            (CellValue::Text(_), ColumnType::Text | ColumnType::SingleSelect) => true,
            (CellValue::Number(_), ColumnType::Number) => true,
            (CellValue::Bool(_), ColumnType::Boolean) => true,
            (CellValue::List(_), ColumnType::MultiSelect) => true,
            _ => false,
        }
    }

    /// Plain-text rendering for display, edit seeding, and export.
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
            CellValue::List(items) => items.join(", "),
        }
    }
}

/// One AI extraction result before it is applied to a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedValue {
    pub value: CellValue,
    /// Model confidence in [0,1].
    pub confidence: f64,
    /// Short evidence excerpt from the document, when the model gave one.
    pub source_text: Option<String>,
}

impl ExtractedValue {
    /// The degraded result used when the AI reply cannot be parsed.
    pub fn null() -> Self {
        Self {
            value: CellValue::Null,
            confidence: 0.0,
            source_text: None,
        }
    }
}

/// The value extracted or edited for one (row, column) pair, plus AI
/// provenance. `value` is what the grid shows; `ai_value` is the last
/// AI-produced answer and only ever changes through a fresh extraction,
/// so a manual override can always be reverted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_value: Option<CellValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    /// Column-scoped status used only during a column-targeted re-run.
    /// Independent of the owning row's status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_status: Option<CellRunStatus>,
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Apply a fresh AI result. Overwrites both `value` and `ai_value`:
    /// a fresh AI pass always wins over a stale manual edit.
    pub fn apply_extraction_result(&mut self, result: ExtractedValue) {
        self.value = result.value.clone();
        self.ai_value = Some(result.value);
        self.confidence = Some(result.confidence.clamp(0.0, 1.0));
        self.source_text = result.source_text;
    }

    /// Apply a manual edit. Overwrites `value` only; `ai_value` is left
    /// exactly as it was. Confidence and source text describe AI provenance
    /// and are now stale, so they are cleared.
    pub fn apply_manual_edit(&mut self, new_value: CellValue) {
        self.value = new_value;
        self.confidence = None;
        self.source_text = None;
    }

    /// Restore the last AI answer. No-op when no AI pass has run.
    pub fn revert_to_ai(&mut self) {
        if let Some(ai) = &self.ai_value {
            self.value = ai.clone();
        }
    }

    /// True when a manual edit has diverged from the last AI answer.
    pub fn is_overridden(&self) -> bool {
        match &self.ai_value {
            Some(ai) => *ai != self.value,
            None => false,
        }
    }

    /// Read the value as typed under the given column type. A stored shape
    /// that no longer matches (the column's type was edited) reads as Null.
    pub fn typed_value(&self, column_type: ColumnType) -> CellValue {
        if self.value.conforms_to(column_type) {
            self.value.clone()
        } else {
            CellValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(text: &str, confidence: f64) -> ExtractedValue {
        ExtractedValue {
            value: CellValue::Text(text.to_string()),
            confidence,
            source_text: Some("excerpt".to_string()),
        }
    }

    #[test]
    fn test_extraction_overwrites_value_and_ai_value() {
        let mut cell = Cell::empty();
        cell.apply_manual_edit(CellValue::Text("typed by hand".to_string()));

        cell.apply_extraction_result(extracted("from ai", 0.8));
        assert_eq!(cell.value, CellValue::Text("from ai".to_string()));
        assert_eq!(cell.ai_value, Some(CellValue::Text("from ai".to_string())));
        assert_eq!(cell.confidence, Some(0.8));
        assert!(cell.source_text.is_some());
    }

    #[test]
    fn test_manual_edit_clears_provenance_keeps_ai_value() {
        let mut cell = Cell::empty();
        cell.apply_extraction_result(extracted("ai answer", 0.9));
        let ai_before = cell.ai_value.clone();

        cell.apply_manual_edit(CellValue::Text("corrected".to_string()));
        assert_eq!(cell.value, CellValue::Text("corrected".to_string()));
        assert_eq!(cell.ai_value, ai_before);
        assert!(cell.confidence.is_none());
        assert!(cell.source_text.is_none());
        assert!(cell.is_overridden());
    }

    #[test]
    fn test_revert_to_ai() {
        let mut cell = Cell::empty();
        cell.apply_extraction_result(extracted("ai answer", 0.9));
        cell.apply_manual_edit(CellValue::Text("override".to_string()));

        cell.revert_to_ai();
        assert_eq!(cell.value, CellValue::Text("ai answer".to_string()));
        assert!(!cell.is_overridden());
    }

    #[test]
    fn test_revert_without_ai_value_is_noop() {
        let mut cell = Cell::empty();
        cell.apply_manual_edit(CellValue::Text("manual only".to_string()));
        cell.revert_to_ai();
        assert_eq!(cell.value, CellValue::Text("manual only".to_string()));
    }

    #[test]
    fn test_confidence_clamped() {
        let mut cell = Cell::empty();
        cell.apply_extraction_result(ExtractedValue {
            value: CellValue::Number(1.0),
            confidence: 3.5,
            source_text: None,
        });
        assert_eq!(cell.confidence, Some(1.0));
    }

    #[test]
    fn test_schema_mismatch_reads_null() {
        let mut cell = Cell::empty();
        cell.apply_manual_edit(CellValue::Text("hello".to_string()));
        assert_eq!(cell.typed_value(ColumnType::Number), CellValue::Null);
        assert_eq!(
            cell.typed_value(ColumnType::Text),
            CellValue::Text("hello".to_string())
        );
    }

    #[test]
    fn test_null_conforms_to_everything() {
        for t in [
            ColumnType::Text,
            ColumnType::Number,
            ColumnType::Boolean,
            ColumnType::SingleSelect,
            ColumnType::MultiSelect,
        ] {
            assert!(CellValue::Null.conforms_to(t));
        }
    }
}
