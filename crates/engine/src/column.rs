use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

/// Stable identifier for a column, kept across renames and reorders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub String);

impl ColumnId {
    pub fn new() -> Self {
        ColumnId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The five column types. Closed set: coercion, prompt shaping, and editor
/// behavior all dispatch over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Boolean,
    SingleSelect,
    MultiSelect,
}

impl ColumnType {
    pub fn is_select(&self) -> bool {
        matches!(self, ColumnType::SingleSelect | ColumnType::MultiSelect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::SingleSelect => "single_select",
            ColumnType::MultiSelect => "multi_select",
        }
    }

    /// Interpret raw text (AI output or a committed edit buffer) as a typed
    /// value. This is the single coercion path for every write site.
    ///
    /// - Number: f64 parse; unparseable or non-finite becomes Null, never NaN.
    /// - Boolean: true iff the trimmed text equals "yes" (case-insensitive).
    /// - MultiSelect: split on commas, trim, drop empties.
    /// - SingleSelect/Text: trimmed text, empty becomes Null.
    pub fn coerce(&self, raw: &str) -> CellValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        match self {
            ColumnType::Text | ColumnType::SingleSelect => CellValue::Text(trimmed.to_string()),
            ColumnType::Number => match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => CellValue::Number(n),
                _ => CellValue::Null,
            },
            ColumnType::Boolean => CellValue::Bool(trimmed.eq_ignore_ascii_case("yes")),
            ColumnType::MultiSelect => {
                let items: Vec<String> = trimmed
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if items.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::List(items)
                }
            }
        }
    }
}

/// A typed, AI-prompted fact to extract from every document in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub column_type: ColumnType,
    /// Free-text instruction describing what to find in the document.
    pub prompt: String,
    /// Allowed labels. Non-empty iff `column_type` is a select variant.
    #[serde(default)]
    pub options: Vec<String>,
    /// Display width hint. Non-semantic.
    #[serde(default = "default_width")]
    pub width: f32,
}

fn default_width() -> f32 {
    160.0
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType, prompt: &str) -> Self {
        Self {
            id: ColumnId::new(),
            name: name.to_string(),
            column_type,
            prompt: prompt.to_string(),
            options: Vec::new(),
            width: default_width(),
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Check the options invariant: select columns require options, other
    /// types must not carry any.
    pub fn validate(&self) -> Result<(), String> {
        if self.column_type.is_select() && self.options.is_empty() {
            return Err(format!(
                "column '{}' is {} but has no options",
                self.name,
                self.column_type.as_str()
            ));
        }
        if !self.column_type.is_select() && !self.options.is_empty() {
            return Err(format!(
                "column '{}' is {} but carries select options",
                self.name,
                self.column_type.as_str()
            ));
        }
        Ok(())
    }
}

/// A named bundle of columns that can replace a sheet's schema in one step.
/// Applying a preset clears all cells (cell data is meaningless under a
/// different schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPreset {
    pub name: String,
    pub columns: Vec<Column>,
}

impl ColumnPreset {
    /// Built-in presets for common research-paper extraction setups.
    pub fn builtin() -> Vec<ColumnPreset> {
        vec![
            ColumnPreset {
                name: "Empirical study".to_string(),
                columns: vec![
                    Column::new(
                        "Research question",
                        ColumnType::Text,
                        "What is the main research question or hypothesis of this paper?",
                    ),
                    Column::new(
                        "Sample size",
                        ColumnType::Number,
                        "How many participants or samples were included in the study? Answer with a number only.",
                    ),
                    Column::new(
                        "Study design",
                        ColumnType::SingleSelect,
                        "What is the study design?",
                    )
                    .with_options(&[
                        "Randomized controlled trial",
                        "Observational",
                        "Meta-analysis",
                        "Case study",
                        "Simulation",
                    ]),
                    Column::new(
                        "Peer reviewed",
                        ColumnType::Boolean,
                        "Was this paper published in a peer-reviewed venue? Answer yes or no.",
                    ),
                    Column::new(
                        "Methods used",
                        ColumnType::MultiSelect,
                        "Which methods does the paper use? List all that apply, comma-separated.",
                    )
                    .with_options(&[
                        "Survey",
                        "Interview",
                        "Experiment",
                        "Statistical analysis",
                        "Machine learning",
                    ]),
                ],
            },
            ColumnPreset {
                name: "Literature review".to_string(),
                columns: vec![
                    Column::new(
                        "Key finding",
                        ColumnType::Text,
                        "What is the single most important finding or claim of this paper?",
                    ),
                    Column::new(
                        "Publication year",
                        ColumnType::Number,
                        "In what year was this paper published? Answer with the year only.",
                    ),
                    Column::new(
                        "Limitations",
                        ColumnType::Text,
                        "What limitations do the authors acknowledge?",
                    ),
                ],
            },
        ]
    }

    pub fn by_name(name: &str) -> Option<ColumnPreset> {
        Self::builtin()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercion_is_finite_or_null() {
        let t = ColumnType::Number;
        assert_eq!(t.coerce("42"), CellValue::Number(42.0));
        assert_eq!(t.coerce("  3.14 "), CellValue::Number(3.14));
        assert_eq!(t.coerce("-0.5"), CellValue::Number(-0.5));
        assert_eq!(t.coerce("not a number"), CellValue::Null);
        assert_eq!(t.coerce("NaN"), CellValue::Null);
        assert_eq!(t.coerce("inf"), CellValue::Null);
        assert_eq!(t.coerce(""), CellValue::Null);
    }

    #[test]
    fn test_boolean_coercion_exact_yes_only() {
        let t = ColumnType::Boolean;
        assert_eq!(t.coerce("yes"), CellValue::Bool(true));
        assert_eq!(t.coerce("YES"), CellValue::Bool(true));
        assert_eq!(t.coerce(" Yes "), CellValue::Bool(true));
        assert_eq!(t.coerce("Yes, definitely"), CellValue::Bool(false));
        assert_eq!(t.coerce("No"), CellValue::Bool(false));
        assert_eq!(t.coerce("Maybe"), CellValue::Bool(false));
        assert_eq!(t.coerce(""), CellValue::Null);
    }

    #[test]
    fn test_multi_select_splits_and_drops_empties() {
        let t = ColumnType::MultiSelect;
        assert_eq!(
            t.coerce("Survey, Experiment , ,Interview"),
            CellValue::List(vec![
                "Survey".to_string(),
                "Experiment".to_string(),
                "Interview".to_string()
            ])
        );
        assert_eq!(t.coerce(" , ,"), CellValue::Null);
    }

    #[test]
    fn test_text_and_select_pass_through() {
        assert_eq!(
            ColumnType::Text.coerce("  hello  "),
            CellValue::Text("hello".to_string())
        );
        assert_eq!(
            ColumnType::SingleSelect.coerce("Observational"),
            CellValue::Text("Observational".to_string())
        );
    }

    #[test]
    fn test_options_invariant() {
        let col = Column::new("Design", ColumnType::SingleSelect, "prompt");
        assert!(col.validate().is_err());
        let col = col.with_options(&["A", "B"]);
        assert!(col.validate().is_ok());

        let col = Column::new("Notes", ColumnType::Text, "prompt").with_options(&["X"]);
        assert!(col.validate().is_err());
    }

    #[test]
    fn test_builtin_presets_validate() {
        for preset in ColumnPreset::builtin() {
            for col in &preset.columns {
                assert!(col.validate().is_ok(), "preset column {}", col.name);
            }
        }
    }
}
