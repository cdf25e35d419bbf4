use serde::{Deserialize, Serialize};
use ts_rs::TS;
use tokio::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use keyring::Entry;
use tracing::{debug, warn};

use crate::shared::error::{AppError, AppResult};

const KEYRING_SERVICE: &str = "unit-converter";
const KEYRING_API_KEY: &str = "gemini_api_key";
const MASK: &str = "********";

/// Environment variables checked (in order) for the model API key
pub const API_KEY_ENV_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "settings.ts")]
pub struct AppSettings {
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "settings.ts")]
#[serde(default)]
pub struct AiSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub request_timeout_secs: u64,
    /// Secret. Lives in the keyring, never on disk.
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "settings.ts")]
#[serde(default)]
pub struct UserPreferences {
    pub default_category: String,
    pub default_input: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.1,
            request_timeout_secs: 30,
            api_key: String::new(),
        }
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_category: "Length".to_string(),
            default_input: "1".to_string(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            preferences: UserPreferences::default(),
        }
    }
}

impl AppSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        ProjectDirs::from("com", "antigravity", "unit-converter")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
    }

    /// Load settings from the default location, then the keyring, then the environment
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        let mut settings = Self::load_from(&path).await?;
        settings.load_secrets_from_keyring();
        settings.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Read a settings file; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            debug!(path = %path.display(), "[Settings] No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await
            .map_err(|e| AppError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings: the secret to the keyring, the rest to `path`
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        self.save_secrets_to_keyring()?;
        self.save_to(path).await
    }

    /// Write settings to `path` with secrets removed
    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await
                .map_err(|e| AppError::Io(format!("Failed to create config directory: {}", e)))?;
        }

        let mut disk_copy = self.clone();
        disk_copy.clear_secrets();

        let content = serde_json::to_string_pretty(&disk_copy)?;

        fs::write(path, content).await
            .map_err(|e| AppError::Io(format!("Failed to write settings file: {}", e)))
    }

    /// Environment wins over keyring and file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());

        if let Some(key) = from_env {
            self.ai.api_key = key;
        }
    }

    /// Natural-language conversions are only offered when a key is configured
    pub fn ai_available(&self) -> bool {
        !self.ai.api_key.trim().is_empty() && self.ai.api_key != MASK
    }

    /// Return a copy of settings with secrets masked (for frontend/logging)
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        if !copy.ai.api_key.is_empty() {
            copy.ai.api_key = MASK.to_string();
        }
        copy
    }

    fn clear_secrets(&mut self) {
        self.ai.api_key = String::new();
    }

    fn load_secrets_from_keyring(&mut self) {
        let entry = match Entry::new(KEYRING_SERVICE, KEYRING_API_KEY) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "[Settings] Failed to access keyring");
                return;
            }
        };

        match entry.get_password() {
            Ok(key) => self.ai.api_key = key,
            Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "[Settings] Keyring error for {}", KEYRING_API_KEY),
        }
    }

    fn save_secrets_to_keyring(&self) -> AppResult<()> {
        let value = self.ai.api_key.as_str();
        if value.is_empty() || value == MASK {
            return Ok(()); // Don't save empty/masked
        }
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_API_KEY)?;
        entry.set_password(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("settings.json")).await.unwrap();

        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.ai.model, "gemini-2.5-flash");
        assert!(!settings.ai_available());
    }

    #[tokio::test]
    async fn test_save_strips_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.ai.api_key = "secret-key".to_string();
        settings.preferences.default_category = "Mass".to_string();
        settings.save_to(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret-key"));

        let reloaded = AppSettings::load_from(&path).await.unwrap();
        assert_eq!(reloaded.preferences.default_category, "Mass");
        assert!(reloaded.ai.api_key.is_empty());
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "ai": { "model": "gemini-2.0-flash" } }"#).unwrap();

        let settings = AppSettings::load_from(&path).await.unwrap();
        assert_eq!(settings.ai.model, "gemini-2.0-flash");
        assert_eq!(settings.ai.temperature, 0.1);
        assert_eq!(settings.preferences.default_input, "1");
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppSettings::load_from(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_save_puts_key_in_keyring_only() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = AppSettings::default();
        settings.ai.api_key = "stored-key".to_string();
        settings.save(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("stored-key"));
        assert!(raw.contains("gemini-2.5-flash"));

        // A masked copy never overwrites the stored secret
        settings.masked().save(&path).await.unwrap();
    }

    #[test]
    fn test_env_override_and_masking() {
        let mut settings = AppSettings::default();
        settings.apply_env_overrides(|name| match name {
            "API_KEY" => Some("   ".to_string()),
            "GEMINI_API_KEY" => Some("from-env".to_string()),
            _ => None,
        });

        assert_eq!(settings.ai.api_key, "from-env");
        assert!(settings.ai_available());

        let masked = settings.masked();
        assert_eq!(masked.ai.api_key, MASK);
        assert!(!masked.ai_available());
    }
}
