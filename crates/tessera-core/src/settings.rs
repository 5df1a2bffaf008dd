use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

fn default_ai_timeout() -> u64 {
    60
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

// --- Collaboration Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// When present at startup, collaboration starts right away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            interval_ms: default_interval(),
            request_timeout_ms: default_request_timeout(),
            session_token: None,
            user_id: None,
        }
    }
}

fn default_interval() -> u64 {
    3_000
}

fn default_request_timeout() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

// --- Storage ---

/// Resolve the settings directory (~/.tessera/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tessera")
}

pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

pub fn read_settings() -> Settings {
    read_settings_from(&settings_path())
}

/// Missing or unreadable files fall back to defaults.
pub fn read_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &Settings) -> Result<(), String> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("openai", "gpt-4o", "sk-1", true)]
    #[case("openai", "gpt-4o", "", false)]
    #[case("ollama", "llama3", "", true)]
    #[case("", "gpt-4o", "sk-1", false)]
    #[case("anthropic", "", "key", false)]
    fn ai_configured_requires_provider_model_and_key(
        #[case] provider: &str,
        #[case] model: &str,
        #[case] key: &str,
        #[case] expected: bool,
    ) {
        let settings = AiSettings {
            provider: provider.into(),
            model: model.into(),
            api_key: key.into(),
            ..Default::default()
        };
        assert_eq!(ai_configured(&settings), expected);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"sync":{"endpoint":"https://x/sync"}}"#).unwrap();
        assert_eq!(settings.sync.interval_ms, 3_000);
        assert_eq!(settings.sync.request_timeout_ms, 10_000);
        assert_eq!(settings.ai.timeout_secs, 60);
        assert!(settings.sync.session_token.is_none());
    }

    #[test]
    fn settings_survive_a_write_and_read() {
        let path = std::env::temp_dir()
            .join(format!("tessera-settings-{}", uuid::Uuid::new_v4()))
            .join("settings.json");
        let mut settings = Settings::default();
        settings.ai.provider = "ollama".into();
        settings.sync.session_token = Some("tok".into());
        write_settings_to(&path, &settings).unwrap();
        assert_eq!(read_settings_from(&path), settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_reads_as_default() {
        let path = std::env::temp_dir().join("tessera-does-not-exist/settings.json");
        assert_eq!(read_settings_from(&path), Settings::default());
    }
}
