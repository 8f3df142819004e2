pub mod editor;
pub mod error;
pub mod filter;
pub mod forest;
pub mod ids;
pub mod index;
pub mod seed;
pub mod session;
pub mod store;
pub mod users;

pub use error::{Error, Result};
pub use forest::TagForest;
pub use index::TagIndex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filter::{TagMatchMode, VisibilityPolicy};

// --- Types ---

/// A node in the tag forest.
///
/// Children are shared handles: cloning a tag is shallow, and the editor
/// copies only the nodes along the path to whatever it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<Tag>>,
}

impl Tag {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Tag>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True if this tag or any of its descendants has the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.id == id || self.children.iter().any(|c| c.contains(id))
    }
}

/// Example output attached to a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum SampleResult {
    Image(String),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub prompt_text: String,
    pub ai_model: String,
    /// Tag ids. Treated as a set; ids of deleted tags are kept and simply
    /// stop resolving to a name.
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: bool,
    /// User id of the author.
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_result: Option<SampleResult>,
}

impl Prompt {
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t == tag_id)
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    pub email: String,
}

// --- Settings ---

/// Resolve the data directory (~/.prompthub/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".prompthub")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

impl AiSettings {
    /// Apply `PROMPTHUB_AI_PROVIDER`, `PROMPTHUB_AI_MODEL` and
    /// `PROMPTHUB_API_KEY` (or plain `API_KEY`) from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(provider) = non_empty("PROMPTHUB_AI_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = non_empty("PROMPTHUB_AI_MODEL") {
            self.model = model;
        }
        if let Some(key) = non_empty("PROMPTHUB_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.api_key = key;
        }
        self
    }
}

/// Filter and index behaviour for a library session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LibrarySettings {
    pub tag_match_mode: TagMatchMode,
    pub visibility_policy: VisibilityPolicy,
    /// Fail on duplicate tag ids instead of letting the last one win.
    pub strict_tag_index: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub ai: AiSettings,
    pub library: LibrarySettings,
}

pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn read_settings() -> Settings {
    read_settings_from(&settings_path())
}

/// Missing or unreadable settings fall back to defaults.
pub fn read_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(Error::from));
    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("ignoring settings at {}: {}", path.display(), e);
            Settings::default()
        }
    }
}

pub fn write_settings(settings: &Settings) -> Result<()> {
    write_settings_to(&settings_path(), settings)
}

/// Write settings via temp file + rename so readers never see a partial file.
pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
