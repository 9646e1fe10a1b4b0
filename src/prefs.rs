use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const THEME_KEY: &str = "revisionRandomiserTheme";
pub const DEFAULT_PREFS_FILE: &str = ".revision-randomiser-prefs.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// A flat string key-value file. Drawing never reads it.
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read prefs: {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).with_context(|| format!("parse prefs: {}", self.path.display()))
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value.to_string());
        let text = serde_json::to_string_pretty(&all).context("serialize prefs")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("write prefs: {}", self.path.display()))?;
        Ok(())
    }

    /// The stored theme; anything unreadable or unrecognised counts as dark.
    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .ok()
            .flatten()
            .and_then(|v| Theme::parse(&v))
            .unwrap_or_default()
    }

    pub fn toggle_theme(&self) -> anyhow::Result<Theme> {
        let next = self.theme().toggled();
        self.set(THEME_KEY, next.as_str())?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_defaults_to_dark_and_toggles_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PrefsStore::new(dir.path().join(DEFAULT_PREFS_FILE));
        assert_eq!(store.theme(), Theme::Dark);

        assert_eq!(store.toggle_theme().expect("toggle"), Theme::Light);
        assert_eq!(
            PrefsStore::new(store.path()).get(THEME_KEY).expect("get"),
            Some("light".to_string())
        );
        assert_eq!(store.toggle_theme().expect("toggle"), Theme::Dark);
    }

    #[test]
    fn other_keys_survive_and_garbage_reads_as_dark() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PrefsStore::new(dir.path().join("prefs.json"));
        store.set("other", "kept").expect("set");
        store.set(THEME_KEY, "sepia").expect("set");
        assert_eq!(store.theme(), Theme::Dark);
        store.toggle_theme().expect("toggle");
        assert_eq!(store.get("other").expect("get"), Some("kept".to_string()));
    }
}
