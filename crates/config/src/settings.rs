// Application settings
// Loaded from ~/.config/papergrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// AI extraction disabled (default)
    #[default]
    None,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
    /// Local model behind an OpenAI-compatible endpoint (Ollama)
    Local,
}

impl AiProvider {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AiProvider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AiProvider::None => "none",
            AiProvider::OpenAI => "openai",
            AiProvider::Local => "local",
        }
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, AiProvider::OpenAI)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::None => "",
            AiProvider::OpenAI => "gpt-4o-mini",
            AiProvider::Local => "llama3:8b",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Selected AI provider
    pub provider: AiProvider,

    /// Model identifier (provider-specific); empty = provider default
    pub model: String,

    /// Custom endpoint for the Local provider
    pub endpoint: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::None,
            model: String::new(),
            endpoint: None,
        }
    }
}

impl AiSettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or("http://localhost:11434/v1")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ai: AiSettings,

    /// Path of the SQLite sheet store. None = default location.
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>,

    /// Directory of extracted document text files (<document_id>.txt).
    #[serde(rename = "corpus.dir")]
    pub corpus_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            store_path: None,
            corpus_dir: None,
        }
    }
}

impl Settings {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("papergrid"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Default location for the sheet store when settings don't name one.
    pub fn default_store_path() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("papergrid"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheets.db")
    }

    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(Self::default_store_path)
    }

    /// Load settings, falling back to full defaults when the file is
    /// missing or unreadable. A corrupt file never blocks startup.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path().ok_or("no config directory available")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(&path, json).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ai.provider, AiProvider::None);
        assert!(!settings.ai.provider.is_enabled());
        assert!(settings.store_path.is_none());
    }

    #[test]
    fn test_effective_model_falls_back_to_provider_default() {
        let mut ai = AiSettings::default();
        ai.provider = AiProvider::OpenAI;
        assert_eq!(ai.effective_model(), "gpt-4o-mini");
        ai.model = "gpt-4o".to_string();
        assert_eq!(ai.effective_model(), "gpt-4o");
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        let parsed: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.ai.provider, AiProvider::None);

        let result: Result<Settings, _> = serde_json::from_str("{not json");
        assert!(result.is_err()); // load() maps this to Default
    }

    #[test]
    fn test_provider_round_trip() {
        let json = serde_json::to_string(&AiProvider::OpenAI).unwrap();
        assert_eq!(json, "\"openai\"");
        let back: AiProvider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AiProvider::OpenAI);
    }
}
