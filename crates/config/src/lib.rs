//! `papergrid-config` — settings file and AI provider/key resolution.

pub mod ai;
pub mod settings;

pub use ai::{AiConfigStatus, Diagnostics, KeySource, ResolvedAiConfig};
pub use settings::{AiProvider, AiSettings, Settings};
