use crate::error::HelpError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, rc::Rc};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};
use url::Url;

/// Tunables for a viewer session. Every field has a default, so a partial (or
/// empty) TOML file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Root of the help web application. Every relative endpoint is resolved
    /// against it, so it should end with a `/`.
    pub base_url: String,
    pub search_hits_max: usize,
    pub type_ahead_hits_max: usize,
    pub type_ahead_cache_size: usize,
    pub full_search_cache_size: usize,
    /// Quiet period applied to a type-ahead keystroke while another query is
    /// still in flight.
    pub debounce_ms: u64,
    /// Hints are only synthesized while the typed text is shorter than this.
    pub hint_max_query_chars: usize,
    pub hint_proposals_max: usize,
    pub group_depth: usize,
    /// Upper bound on `numeric_path` re-requests during deep-link resolution.
    pub numeric_path_max_hops: usize,
    pub book_scope_by_default: bool,
    pub right_to_left: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            base_url: "http://localhost/help/".to_string(),
            search_hits_max: 500,
            type_ahead_hits_max: 7,
            type_ahead_cache_size: 7,
            full_search_cache_size: 3,
            debounce_ms: 99,
            hint_max_query_chars: 36,
            hint_proposals_max: 3,
            group_depth: 9,
            numeric_path_max_hops: 4,
            book_scope_by_default: false,
            right_to_left: false,
        }
    }
}

impl ViewerConfig {
    pub fn base(&self) -> Result<Url, HelpError> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Resolve a viewer-relative endpoint such as `advanced/tocfragment`.
    pub fn resolve(&self, relative: &str) -> Result<Url, HelpError> {
        Ok(self.base()?.join(relative)?)
    }

    /// Check the values that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<(), HelpError> {
        self.base()?;
        if self.type_ahead_cache_size == 0 || self.full_search_cache_size == 0 {
            return Err(HelpError::Config(
                "search cache sizes must be at least 1".to_string(),
            ));
        }
        if self.group_depth == 0 {
            return Err(HelpError::Config("group_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<ViewerConfig, HelpError>;
    fn set_config(&self, config: &ViewerConfig) -> Result<(), HelpError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<ViewerConfig, HelpError> {
        tracing::debug!("Attempting to read viewer config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ViewerConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let config: ViewerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn set_config(&self, config: &ViewerConfig) -> Result<(), HelpError> {
        tracing::debug!("Attempting to write viewer config to: {:?}", &self.path);
        config.validate()?;
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// Small key/value store standing in for the browser's client-side
/// persistence. The viewer only uses it for the one-shot `book-scope` marker.
pub trait ClientState {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

impl<T: ClientState> ClientState for Rc<T> {
    fn get(&self, key: &str) -> Option<String> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.as_ref().set(key, value)
    }
}

pub const BOOK_SCOPE_MARKER: &str = "book-scope";

#[derive(Debug, Default)]
pub struct MemoryClientState {
    values: Mutex<BTreeMap<String, String>>,
}

impl ClientState for MemoryClientState {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }
}
