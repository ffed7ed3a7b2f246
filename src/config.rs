use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_ICON_NAME: &str = "folder";
pub const DEFAULT_APPLET_ID: &str = "dirmenu";

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn home_dir_fallback() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| home_dir_fallback().join(".config"))
        .join("dirmenu")
}

pub fn settings_file(applet_id: &str) -> PathBuf {
    config_root().join(format!("{applet_id}.json"))
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

pub fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// The four properties the panel host persists for one applet instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AppletSettings {
    #[serde(default)]
    pub base_directory: String,
    #[serde(default)]
    pub icon_name: String,
    #[serde(default)]
    pub file_pattern: String,
    #[serde(default)]
    pub hidden_files: bool,
}

impl AppletSettings {
    /// Directory the root menu lists. Empty means the home directory;
    /// `file://` URIs are converted to paths.
    pub fn base_directory_path(&self) -> PathBuf {
        resolve_base_directory(&self.base_directory)
    }

    pub fn effective_icon_name(&self) -> &str {
        if self.icon_name.trim().is_empty() {
            DEFAULT_ICON_NAME
        } else {
            &self.icon_name
        }
    }

    /// Canonical stored form: always a concrete path.
    pub fn set_base_directory(&mut self, value: &str) {
        self.base_directory = resolve_base_directory(value).display().to_string();
    }

    /// Tooltip text: the base directory with the home prefix shown as `~`.
    pub fn display_name(&self) -> String {
        display_path(&self.base_directory_path())
    }
}

pub fn resolve_base_directory(value: &str) -> PathBuf {
    let value = value.trim();
    if value.is_empty() {
        return home_dir_fallback();
    }
    if value.starts_with("file://") {
        match Url::parse(value).map(|url| url.to_file_path()) {
            Ok(Ok(path)) => return path,
            _ => tracing::debug!(uri = value, "not a local file URI, using it as a path"),
        }
    }
    if value == "~" {
        return home_dir_fallback();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home_dir_fallback().join(rest);
    }
    PathBuf::from(value)
}

pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if path == home {
            return "~".to_string();
        }
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

pub fn load_settings(applet_id: &str) -> AppletSettings {
    load_json(&settings_file(applet_id))
}

pub fn save_settings(applet_id: &str, settings: &AppletSettings) -> Result<()> {
    save_json(&settings_file(applet_id), settings)
}
