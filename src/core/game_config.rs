//! Line-based `key=value` game configuration file
//!
//! `#` starts a comment, lines without `=` are skipped. Values are typed on
//! parse: `true`/`false` become booleans, anything containing `.` is tried as
//! a float, everything else as an integer; values that fit none of these are
//! kept as strings. A value wrapped in double quotes is always a string.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{CivError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if raw.contains('.') {
            if let Ok(f) = raw.parse::<f64>() {
                if f.is_finite() {
                    return Self::Float(f);
                }
            }
        } else if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        Self::Str(raw.to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text written to the file. Strings that would come back as another
    /// type, or lose whitespace or a `#`, are quoted.
    fn encode(&self) -> String {
        match self {
            Self::Str(s) if needs_quotes(s) => format!("\"{}\"", s),
            other => other.to_string(),
        }
    }
}

fn needs_quotes(s: &str) -> bool {
    s.contains('#') || s.starts_with('"') || ConfigValue::parse(s) != ConfigValue::Str(s.to_string())
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            // Display never uses exponent form; integral values still need a '.'
            Self::Float(v) => {
                let text = v.to_string();
                if text.contains('.') {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Ordered typed key/value store backing the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigStore {
    entries: BTreeMap<String, ConfigValue>,
    /// Source text of parsed values, before typing
    #[serde(skip)]
    raw: BTreeMap<String, String>,
}

impl PartialEq for ConfigStore {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut store = Self::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains('#') {
                continue;
            }
            let value = value.trim_start();
            let (typed, text) = match value.strip_prefix('"').and_then(|v| v.rfind('"').map(|end| &v[..end])) {
                Some(quoted) => (ConfigValue::Str(quoted.to_string()), quoted),
                None => {
                    let text = value.find('#').map_or(value, |idx| &value[..idx]).trim();
                    (ConfigValue::parse(text), text)
                }
            };
            store.raw.insert(key.to_string(), text.to_string());
            store.entries.insert(key.to_string(), typed);
        }
        store
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(&value.encode());
            out.push('\n');
        }
        out
    }

    /// Rejects values the text format cannot hold: non-finite floats, line
    /// breaks, and keys with `=` or `#`.
    pub fn set(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        let key = key.trim();
        if key.is_empty() || key.contains(['=', '#', '\n', '\r']) {
            return Err(CivError::InvalidArgument(format!("invalid config key '{}'", key)));
        }
        match &value {
            ConfigValue::Float(f) if !f.is_finite() => {
                return Err(CivError::InvalidArgument(format!("{} must be finite, got {}", key, f)));
            }
            ConfigValue::Str(s) if s.contains(['\n', '\r']) => {
                return Err(CivError::InvalidArgument(format!("{} contains a line break", key)));
            }
            _ => {}
        }
        self.raw.remove(key);
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// The value as written in the source file, or its text form when set
    /// programmatically
    pub fn text(&self, key: &str) -> Option<String> {
        match self.raw.get(key) {
            Some(raw) => Some(raw.clone()),
            None => self.entries.get(key).map(ToString::to_string),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.raw.remove(key);
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }
}

/// The recognised game options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: String,
    pub version: String,
    pub start_year: i32,
    pub difficulty: i32,
    pub enable_fuzzy_logic: bool,
    pub enable_dependency_tracking: bool,
    /// Seconds of simulation time between autosaves; 0 disables
    pub autosave_interval: i32,
    pub max_event_log: i32,
}

pub const CONFIG_FLAG_FUZZY_LOGIC: u32 = 1 << 0;
pub const CONFIG_FLAG_DEPENDENCY_TRACKING: u32 = 1 << 1;

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name: "New World".to_string(),
            version: "0.1.0".to_string(),
            start_year: -4000,
            difficulty: 1,
            enable_fuzzy_logic: false,
            enable_dependency_tracking: false,
            autosave_interval: 0,
            max_event_log: 10_000,
        }
    }
}

impl GameConfig {
    /// Build from a store; unknown keys are ignored, wrongly typed keys are
    /// rejected.
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = store.text("name") {
            config.name = v;
        }
        if let Some(v) = store.text("version") {
            config.version = v;
        }
        config.start_year = int_option(store, "start_year", config.start_year)?;
        config.difficulty = int_option(store, "difficulty", config.difficulty)?;
        config.autosave_interval = int_option(store, "autosave_interval", config.autosave_interval)?;
        config.max_event_log = int_option(store, "max_event_log", config.max_event_log)?;
        config.enable_fuzzy_logic = bool_option(store, "enable_fuzzy_logic", config.enable_fuzzy_logic)?;
        config.enable_dependency_tracking =
            bool_option(store, "enable_dependency_tracking", config.enable_dependency_tracking)?;

        if config.autosave_interval < 0 {
            return Err(CivError::InvalidArgument(format!(
                "autosave_interval ({}) must be >= 0",
                config.autosave_interval
            )));
        }
        Ok(config)
    }

    pub fn to_store(&self) -> Result<ConfigStore> {
        let mut store = ConfigStore::new();
        store.set("name", ConfigValue::Str(self.name.clone()))?;
        store.set("version", ConfigValue::Str(self.version.clone()))?;
        store.set("start_year", ConfigValue::Int(self.start_year as i64))?;
        store.set("difficulty", ConfigValue::Int(self.difficulty as i64))?;
        store.set("enable_fuzzy_logic", ConfigValue::Bool(self.enable_fuzzy_logic))?;
        store.set(
            "enable_dependency_tracking",
            ConfigValue::Bool(self.enable_dependency_tracking),
        )?;
        store.set("autosave_interval", ConfigValue::Int(self.autosave_interval as i64))?;
        store.set("max_event_log", ConfigValue::Int(self.max_event_log as i64))?;
        Ok(store)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_store(&ConfigStore::load(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_store()?.save(path)
    }

    /// Packed boolean options as stored in the save header
    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.enable_fuzzy_logic {
            flags |= CONFIG_FLAG_FUZZY_LOGIC;
        }
        if self.enable_dependency_tracking {
            flags |= CONFIG_FLAG_DEPENDENCY_TRACKING;
        }
        flags
    }

    pub fn apply_flags(&mut self, flags: u32) {
        self.enable_fuzzy_logic = flags & CONFIG_FLAG_FUZZY_LOGIC != 0;
        self.enable_dependency_tracking = flags & CONFIG_FLAG_DEPENDENCY_TRACKING != 0;
    }
}

fn int_option(store: &ConfigStore, key: &str, default: i32) -> Result<i32> {
    match store.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_int()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| CivError::InvalidArgument(format!("{} must be an integer, got {}", key, v))),
    }
}

fn bool_option(store: &ConfigStore, key: &str, default: bool) -> Result<bool> {
    match store.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| CivError::InvalidArgument(format!("{} must be true/false, got {}", key, v))),
    }
}
