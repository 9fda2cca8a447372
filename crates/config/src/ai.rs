// AI configuration and secrets management
//
// API keys are stored securely using:
// 1. System keychain (preferred)
// 2. Environment variables (fallback for CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::{AiProvider, AiSettings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "papergrid";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the environment variable name for a provider
fn env_var_name(provider: &str) -> String {
    format!("PAPERGRID_{}_KEY", provider.to_uppercase())
}

/// Get the keychain account name for a provider
fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Get an API key for the specified provider
///
/// Checks in order:
/// 1. System keychain
/// 2. Environment variable (PAPERGRID_OPENAI_KEY, etc.)
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    let env_name = env_var_name(provider);
    if let Ok(key) = env::var(&env_name) {
        if !key.is_empty() {
            return KeyLookup {
                key: Some(key),
                source: KeySource::Environment,
            };
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// Store an API key in the system keychain
#[cfg(feature = "keychain")]
pub fn set_api_key(provider: &str, key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;
    entry
        .set_password(key)
        .map_err(|e| format!("Failed to store key in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(_provider: &str, _key: &str) -> Result<(), String> {
    Err("Keychain support not enabled. Set PAPERGRID_<PROVIDER>_KEY environment variable instead."
        .to_string())
}

// ============================================================================
// Resolved AI Configuration (single source of truth)
// ============================================================================

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiConfigStatus {
    /// AI is disabled (provider = None)
    Disabled,
    /// Configuration is valid and usable
    Ready,
    /// Provider is configured but the API key is missing
    MissingKey,
}

impl AiConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The effective AI configuration, fully resolved from all sources.
/// This is the single source of truth for runtime AI behavior.
#[derive(Debug, Clone)]
pub struct ResolvedAiConfig {
    pub provider: AiProvider,
    /// Effective model (settings value or provider default)
    pub model: String,
    /// Endpoint for the Local provider
    pub endpoint: Option<String>,
    /// API key (if available and provider needs one)
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: AiConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

impl ResolvedAiConfig {
    /// Resolve the effective AI configuration from settings.
    pub fn from_settings(settings: &AiSettings) -> Self {
        let provider = settings.provider;

        if !provider.is_enabled() {
            return Self {
                provider,
                model: String::new(),
                endpoint: None,
                api_key: None,
                key_source: KeySource::None,
                status: AiConfigStatus::Disabled,
                blocking_reason: Some("AI is disabled in settings".to_string()),
            };
        }

        let model = settings.effective_model().to_string();
        let endpoint = if matches!(provider, AiProvider::Local) {
            Some(settings.effective_endpoint().to_string())
        } else {
            None
        };

        let (api_key, key_source, status, blocking_reason) = if provider.needs_api_key() {
            let lookup = get_api_key(provider.name());
            match lookup.key {
                Some(key) => (Some(key), lookup.source, AiConfigStatus::Ready, None),
                None => (
                    None,
                    KeySource::None,
                    AiConfigStatus::MissingKey,
                    Some(format!(
                        "No API key found. Set via keychain or {}",
                        env_var_name(provider.name())
                    )),
                ),
            }
        } else {
            (None, KeySource::None, AiConfigStatus::Ready, None)
        };

        Self {
            provider,
            model,
            endpoint,
            api_key,
            key_source,
            status,
            blocking_reason,
        }
    }

    /// Load settings and resolve in one call (convenience method)
    pub fn load() -> Self {
        let settings = crate::settings::Settings::load();
        Self::from_settings(&settings.ai)
    }
}

// ============================================================================
// Diagnostics (for the CLI doctor command)
// ============================================================================

#[derive(Debug)]
pub struct Diagnostics {
    pub provider: String,
    pub model: String,
    pub status: AiConfigStatus,
    pub key_present: bool,
    pub key_source: KeySource,
    pub endpoint: Option<String>,
    pub blocking_reason: Option<String>,
}

impl Diagnostics {
    pub fn from_resolved(config: &ResolvedAiConfig) -> Self {
        Self {
            provider: config.provider.name().to_string(),
            model: config.model.clone(),
            status: config.status,
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            endpoint: config.endpoint.clone(),
            blocking_reason: config.blocking_reason.clone(),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Configuration")?;
        writeln!(f, "──────────────────────────────")?;
        writeln!(f, "Provider:    {}", self.provider)?;
        writeln!(f, "Status:      {}", self.status.as_str())?;
        writeln!(f, "Model:       {}", self.model)?;
        writeln!(
            f,
            "Key present: {}",
            if self.key_present { "yes" } else { "no" }
        )?;
        writeln!(f, "Key source:  {}", self.key_source.as_str())?;
        if let Some(endpoint) = &self.endpoint {
            writeln!(f, "Endpoint:    {}", endpoint)?;
        }
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "Blocked:     {}", reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("openai"), "PAPERGRID_OPENAI_KEY");
        assert_eq!(env_var_name("OpenAI"), "PAPERGRID_OPENAI_KEY");
    }

    #[test]
    fn test_keychain_account() {
        assert_eq!(keychain_account("openai"), "ai/openai");
        assert_eq!(keychain_account("OpenAI"), "ai/openai");
    }

    #[test]
    fn test_key_lookup_from_env() {
        env::set_var("PAPERGRID_TESTPROVIDER_KEY", "test-key-123");

        let lookup = get_api_key("testprovider");
        assert_eq!(lookup.source, KeySource::Environment);
        assert_eq!(lookup.key, Some("test-key-123".to_string()));

        env::remove_var("PAPERGRID_TESTPROVIDER_KEY");
    }

    #[test]
    fn test_key_lookup_missing() {
        let lookup = get_api_key("nonexistent_provider_xyz");
        assert_eq!(lookup.source, KeySource::None);
        assert!(lookup.key.is_none());
    }

    #[test]
    fn test_disabled_provider_resolves_disabled() {
        let config = ResolvedAiConfig::from_settings(&AiSettings::default());
        assert_eq!(config.status, AiConfigStatus::Disabled);
        assert!(!config.status.is_ready());
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let settings = AiSettings {
            provider: AiProvider::Local,
            ..AiSettings::default()
        };
        let config = ResolvedAiConfig::from_settings(&settings);
        assert_eq!(config.status, AiConfigStatus::Ready);
        assert!(config.endpoint.is_some());
        assert!(config.api_key.is_none());
    }
}
