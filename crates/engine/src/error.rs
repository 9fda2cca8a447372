use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// The corpus has no text for a row's document.
    DocumentUnavailable { document_id: String },
    /// AI call failed (network, API error).
    Service(String),
    /// AI output could not be interpreted where a hard answer was required.
    Parse(String),
    /// A write to the external store failed.
    Store(String),
    /// An extraction run is already in progress on this engine.
    Busy,
    /// Referenced column id is not in the sheet.
    UnknownColumn(String),
    /// Referenced version id does not exist.
    UnknownVersion(String),
    /// Referenced row id does not exist.
    UnknownRow(String),
    /// Mutation attempted while previewing a version.
    ReadOnly,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentUnavailable { document_id } => {
                write!(f, "no document text available for '{document_id}'")
            }
            Self::Service(msg) => write!(f, "AI service error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Store(msg) => write!(f, "store error: {msg}"),
            Self::Busy => write!(f, "an extraction run is already in progress"),
            Self::UnknownColumn(id) => write!(f, "unknown column: {id}"),
            Self::UnknownVersion(id) => write!(f, "unknown version: {id}"),
            Self::UnknownRow(id) => write!(f, "unknown row: {id}"),
            Self::ReadOnly => write!(f, "sheet is read-only while previewing a version"),
        }
    }
}

impl std::error::Error for GridError {}
