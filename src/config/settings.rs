// src/config/settings.rs
//! Runtime-adjustable settings (models, headless, human-in-the-loop).
//!
//! Requests take a snapshot; `SettingsHandle::update` is the only mutation path.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

use super::Config;

const ENV_PATH: &str = "SETTINGS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Model used for task descriptions and plans.
    pub analysis_model: String,
    /// Model driving the browser agent.
    pub llm_model: String,
    pub headless: bool,
    pub enable_human_in_loop: bool,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            analysis_model: cfg.analysis_model.clone(),
            llm_model: cfg.llm_model.clone(),
            headless: cfg.headless,
            enable_human_in_loop: false,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub analysis_model: Option<String>,
    pub llm_model: Option<String>,
    pub headless: Option<bool>,
    pub enable_human_in_loop: Option<bool>,
}

/// On-disk settings file: initial values plus the model picker list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub available_models: Vec<String>,
    #[serde(flatten)]
    pub overrides: SettingsUpdate,
}

#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
    available_models: Arc<Vec<String>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings, available_models: Vec<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            available_models: Arc::new(clean_list(available_models)),
        }
    }

    /// Build from env config, overlaid with the settings file when one exists.
    pub fn load(cfg: &Config) -> Result<Self> {
        let mut settings = Settings::from_config(cfg);
        let file = load_settings_file_default()?.unwrap_or_default();
        apply(&mut settings, file.overrides);
        let mut models = file.available_models;
        models.push(settings.analysis_model.clone());
        models.push(settings.llm_model.clone());
        Ok(Self::new(settings, models))
    }

    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    pub fn update(&self, update: SettingsUpdate) -> Settings {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard, update);
        info!(
            analysis_model = %guard.analysis_model,
            llm_model = %guard.llm_model,
            headless = guard.headless,
            human_loop = guard.enable_human_in_loop,
            "settings updated"
        );
        guard.clone()
    }
}

fn apply(settings: &mut Settings, update: SettingsUpdate) {
    if let Some(m) = update.analysis_model.filter(|m| !m.trim().is_empty()) {
        settings.analysis_model = m.trim().to_string();
    }
    if let Some(m) = update.llm_model.filter(|m| !m.trim().is_empty()) {
        settings.llm_model = m.trim().to_string();
    }
    if let Some(h) = update.headless {
        settings.headless = h;
    }
    if let Some(h) = update.enable_human_in_loop {
        settings.enable_human_in_loop = h;
    }
}

/// Load a settings file from an explicit path. Supports TOML or JSON formats.
pub fn load_settings_from(path: &Path) -> Result<SettingsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_settings(&content, ext.as_str())
}

/// Load settings using env var + fallbacks:
/// 1) $SETTINGS_PATH
/// 2) config/settings.toml
/// 3) config/settings.json
pub fn load_settings_file_default() -> Result<Option<SettingsFile>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb).map(Some);
        }
        return Err(anyhow!("SETTINGS_PATH points to non-existent path"));
    }
    for candidate in ["config/settings.toml", "config/settings.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_settings_from(&p).map(Some);
        }
    }
    Ok(None)
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<SettingsFile> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("parsing JSON settings");
    }
    toml::from_str(s).context("parsing TOML settings")
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
