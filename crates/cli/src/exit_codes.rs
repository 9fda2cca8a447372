//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Exit codes are part of
//! the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                              |
//! |---------|-----------|------------------------------------------|
//! | 0       | Universal | Success                                  |
//! | 1       | Universal | General error (unspecified)              |
//! | 2       | Universal | CLI usage error (bad args, missing file) |
//! | 3-9     | io/store  | Corpus and sheet store codes             |
//! | 10-19   | ai        | AI provider/keychain codes               |
//! | 20-29   | extract   | Extraction run codes                     |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// IO / store (3-9)
// =============================================================================

/// Sheet store read/write failed.
pub const EXIT_STORE: u8 = 3;

/// Referenced sheet, row, column, or version does not exist.
pub const EXIT_NOT_FOUND: u8 = 4;

/// Corpus directory missing or a document file unreadable.
pub const EXIT_CORPUS: u8 = 5;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none) — not an error, just informational.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// AI call failed at runtime (network, API error).
pub const EXIT_AI_SERVICE: u8 = 12;

// =============================================================================
// Extraction (20-29)
// =============================================================================

/// An extraction run is already in progress on this engine.
pub const EXIT_EXTRACT_BUSY: u8 = 20;

/// The run finished but one or more rows ended in Error.
pub const EXIT_EXTRACT_PARTIAL: u8 = 21;
