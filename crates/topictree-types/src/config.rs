//! Configuration loading for topictree.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/topictree/config.toml.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TopicTreeError;

/// What happens to the descendants of a pruned node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PruneMode {
    /// Remove the node and its edges; descendants without another path to a
    /// root are left as disconnected fragments (default)
    #[default]
    Discard,
    /// Remove the node and connect its children to its parents
    Reattach,
}

impl fmt::Display for PruneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneMode::Discard => write!(f, "discard"),
            PruneMode::Reattach => write!(f, "reattach"),
        }
    }
}

impl FromStr for PruneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard" => Ok(PruneMode::Discard),
            "reattach" => Ok(PruneMode::Reattach),
            other => Err(format!("unknown prune mode '{}' (expected discard or reattach)", other)),
        }
    }
}

/// Tree generation settings: ranking, resolution, compression and pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum number of terms kept per text
    #[serde(default = "default_top_terms")]
    pub top_terms: usize,

    /// Minimum outgoing edges a non-root ancestor needs to survive compression
    #[serde(default = "default_min_children")]
    pub min_children: usize,

    /// Node labels removed after compression
    #[serde(default)]
    pub prune: Vec<String>,

    /// Treatment of the descendants of pruned nodes
    #[serde(default)]
    pub prune_mode: PruneMode,

    /// Separator between a label's short name and its qualifiers
    #[serde(default = "default_name_separator")]
    pub name_separator: String,

    /// Maximum taxonomy lookups in flight at once
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Time allowed for resolving a single term (ms)
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_top_terms() -> usize {
    10
}

fn default_min_children() -> usize {
    2
}

fn default_name_separator() -> String {
    ".".to_string()
}

fn default_max_concurrent_lookups() -> usize {
    4
}

fn default_lookup_timeout_ms() -> u64 {
    5000
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            top_terms: default_top_terms(),
            min_children: default_min_children(),
            prune: Vec::new(),
            prune_mode: PruneMode::default(),
            name_separator: default_name_separator(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl TreeConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.top_terms == 0 {
            return Err("top_terms must be > 0".to_string());
        }
        if self.min_children == 0 {
            return Err("min_children must be > 0".to_string());
        }
        if self.name_separator.is_empty() {
            return Err("name_separator must not be empty".to_string());
        }
        if self.max_concurrent_lookups == 0 {
            return Err("max_concurrent_lookups must be > 0".to_string());
        }
        if self.lookup_timeout_ms == 0 {
            return Err("lookup_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Term extraction settings for plain-text and TEI corpora.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// File extensions read from a corpus directory
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Stopwords added to the built-in English list
    #[serde(default)]
    pub extra_stopwords: Vec<String>,

    /// Drop tokens the taxonomy has no senses for
    #[serde(default = "default_true")]
    pub require_known_terms: bool,

    /// File extensions read as TEI XML, one text per section
    #[serde(default = "default_tei_extensions")]
    pub tei_extensions: Vec<String>,

    /// Local name of the TEI elements that become texts (must carry `xml:id`)
    #[serde(default = "default_tei_element")]
    pub tei_element: String,

    /// Local names of TEI elements whose content is left out, e.g. `note`
    #[serde(default)]
    pub tei_skip_elements: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

fn default_tei_extensions() -> Vec<String> {
    vec!["xml".to_string()]
}

fn default_tei_element() -> String {
    "div".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            extra_stopwords: Vec::new(),
            require_known_terms: default_true(),
            tei_extensions: default_tei_extensions(),
            tei_element: default_tei_element(),
            tei_skip_elements: Vec::new(),
        }
    }
}

impl ExtractionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tei_element.trim().is_empty() {
            return Err("tei_element must not be empty".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Taxonomy file (TOML or JSON)
    #[serde(default)]
    pub taxonomy_path: Option<String>,

    /// Tree generation settings
    #[serde(default)]
    pub tree: TreeConfig,

    /// Term extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            taxonomy_path: None,
            tree: TreeConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/topictree/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TOPICTREE_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TopicTreeError> {
        let config_dir = ProjectDirs::from("", "", "topictree")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| TopicTreeError::Config(e.to_string()))?
            .set_default("tree.top_terms", default_top_terms() as i64)
            .map_err(|e| TopicTreeError::Config(e.to_string()))?
            .set_default("tree.min_children", default_min_children() as i64)
            .map_err(|e| TopicTreeError::Config(e.to_string()))?
            .set_default("tree.name_separator", default_name_separator())
            .map_err(|e| TopicTreeError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: TOPICTREE_LOG_LEVEL, TOPICTREE_TREE__TOP_TERMS, TOPICTREE_TREE__PRUNE=a,b
        builder = builder.add_source(
            Environment::with_prefix("TOPICTREE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("tree.prune")
                .with_list_parse_key("extraction.extensions")
                .with_list_parse_key("extraction.extra_stopwords")
                .with_list_parse_key("extraction.tei_extensions")
                .with_list_parse_key("extraction.tei_skip_elements"),
        );

        let config = builder
            .build()
            .map_err(|e| TopicTreeError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TopicTreeError::Config(e.to_string()))?;

        settings.tree.validate().map_err(TopicTreeError::Config)?;
        settings
            .extraction
            .validate()
            .map_err(TopicTreeError::Config)?;
        Ok(settings)
    }
}
