use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use client_core::{images::IMAGE_DIR_NAME, RefreshPolicy};
use shared::protocol::DEFAULT_COLLECTION;
use tracing::warn;

const SETTINGS_FILE: &str = "roster.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub store_url: String,
    pub collection: String,
    pub image_dir: PathBuf,
    pub refresh_after_save: RefreshPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:8787".into(),
            collection: DEFAULT_COLLECTION.into(),
            image_dir: default_image_dir(),
            refresh_after_save: RefreshPolicy::default(),
        }
    }
}

fn default_image_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roster")
        .join(IMAGE_DIR_NAME)
}

/// Loads settings from `path` (which must exist) or from `roster.toml` in
/// the working directory when present, then applies the environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let file_contents = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?,
        ),
        None => fs::read_to_string(SETTINGS_FILE).ok(),
    };
    Ok(resolve_settings(file_contents.as_deref(), |key| {
        std::env::var(key).ok()
    }))
}

/// Defaults, then file keys, then `ROSTER_*`, then `APP__*` variables.
pub(crate) fn resolve_settings(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("store_url") {
                    settings.store_url = v.clone();
                }
                if let Some(v) = file_cfg.get("collection") {
                    settings.collection = v.clone();
                }
                if let Some(v) = file_cfg.get("image_dir") {
                    settings.image_dir = PathBuf::from(v);
                }
                if let Some(v) = file_cfg.get("refresh_after_save") {
                    apply_refresh_policy(&mut settings, v);
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable settings file"),
        }
    }

    for key in ["ROSTER_STORE_URL", "APP__STORE_URL"] {
        if let Some(v) = env(key) {
            settings.store_url = v;
        }
    }
    for key in ["ROSTER_COLLECTION", "APP__COLLECTION"] {
        if let Some(v) = env(key) {
            settings.collection = v;
        }
    }
    for key in ["ROSTER_IMAGE_DIR", "APP__IMAGE_DIR"] {
        if let Some(v) = env(key) {
            settings.image_dir = PathBuf::from(v);
        }
    }
    for key in ["ROSTER_REFRESH", "APP__REFRESH_AFTER_SAVE"] {
        if let Some(v) = env(key) {
            apply_refresh_policy(&mut settings, &v);
        }
    }

    settings
}

fn apply_refresh_policy(settings: &mut ClientSettings, raw: &str) {
    match raw.parse() {
        Ok(policy) => settings.refresh_after_save = policy,
        Err(error) => warn!(%error, "keeping refresh policy {:?}", settings.refresh_after_save),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
