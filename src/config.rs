use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::chat::Provider;
use crate::core::reminder::DetailLevel;

pub const APP_NAME: &str = "figureout";

fn default_reminders_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_NAME)
}

/// Where settings live unless a path is given explicitly.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_NAME)
        .join("settings.json")
}

/// Settings that persist across launches.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Settings {
    pub detail_level: DetailLevel,
    pub api_key: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub reminders_directory: PathBuf,
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::default(),
            api_key: String::new(),
            provider: Provider::default(),
            model: None,
            base_url: None,
            reminders_directory: default_reminders_dir(),
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Read settings, falling back to defaults when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json"));
        assert_eq!(settings.detail_level.get(), 3);
        assert!(!settings.has_api_key());
        assert_eq!(settings.provider, Provider::OpenAi);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            detail_level: DetailLevel::new(5),
            api_key: "sk-test".into(),
            provider: Provider::Anthropic,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "detail_level": 9, "unknown": true }"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.detail_level.get(), 5);
        assert_eq!(settings.api_key, "");
    }

    #[test]
    fn out_of_range_detail_keeps_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "detail_level": 300, "api_key": "sk-keep" }"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.detail_level.get(), 5);
        assert_eq!(settings.api_key, "sk-keep");

        std::fs::write(&path, r#"{ "detail_level": -1, "api_key": "sk-keep" }"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.detail_level.get(), 1);
        assert_eq!(settings.api_key, "sk-keep");
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
