//! Lightweight UI preferences persisted to a string key-value store.
//!
//! Only theme, sort key, active view and calendar mode are stored here.
//! Tasks and projects are never cached locally.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::calendar::CalendarMode;
use crate::filter::SortKey;
use crate::view::View;

pub const THEME_KEY: &str = "theme";
pub const SORT_KEY: &str = "sort";
pub const VIEW_KEY: &str = "view";
pub const CALENDAR_MODE_KEY: &str = "calendar_mode";

/// Synchronous string key-value storage scoped to the application.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
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

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub theme: Theme,
    pub sort_by: SortKey,
    pub current_view: View,
    pub calendar_mode: CalendarMode,
}

impl Preferences {
    /// Missing or unrecognised values fall back to the defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            theme: read_pref(store, THEME_KEY, Theme::parse).unwrap_or(defaults.theme),
            sort_by: read_pref(store, SORT_KEY, SortKey::parse).unwrap_or(defaults.sort_by),
            current_view: read_pref(store, VIEW_KEY, View::parse)
                .unwrap_or(defaults.current_view),
            calendar_mode: read_pref(store, CALENDAR_MODE_KEY, CalendarMode::parse)
                .unwrap_or(defaults.calendar_mode),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        store.set(THEME_KEY, self.theme.as_str())?;
        store.set(SORT_KEY, self.sort_by.as_str())?;
        store.set(VIEW_KEY, self.current_view.as_str())?;
        store.set(CALENDAR_MODE_KEY, self.calendar_mode.as_str())?;
        Ok(())
    }
}

fn read_pref<T>(store: &dyn KeyValueStore, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = store.get(key)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unrecognised preference value");
    }
    parsed
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences kept in a small TOML table inside the data directory.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePreferences {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("preferences.toml");
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            match toml::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(values) => values,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "preferences file unreadable; starting fresh");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!(file = %path.display(), count = values.len(), "opened preferences");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());
        let serialized = toml::to_string(&*values).context("failed to encode preferences")?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }
}
