//! Lexical taxonomy port.
//!
//! The tree engine never talks to a concrete lexical database. It asks a
//! [`Taxonomy`] for the senses of a word and the hypernyms of a sense, both
//! ordered from most to least common. [`StaticTaxonomy`] is the file-backed
//! implementation shipped with the workspace.
//!
//! ## File format
//!
//! ```toml
//! [words]
//! dog = ["dog.n.01", "frump.n.01"]
//!
//! [hypernyms]
//! "dog.n.01" = ["canine.n.02", "domestic_animal.n.01"]
//! "canine.n.02" = ["carnivore.n.01"]
//! ```
//!
//! The same two tables are accepted as a JSON object.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TreeError;

/// One sense of a word, identified by a globally unique label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sense {
    label: String,
}

impl Sense {
    /// Create a sense from its label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// The sense label, e.g. `dog.n.01`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Read-only "is-a" oracle consulted during hypernym resolution.
///
/// Implementations must return senses and hypernyms ordered by commonness;
/// resolution always follows the first entry.
pub trait Taxonomy: Send + Sync {
    /// Known senses of `word`, most common first. Empty if unknown.
    fn senses(&self, word: &str) -> Result<Vec<Sense>, TreeError>;

    /// Hypernyms of `sense`, most common first. Empty at a root.
    fn hypernyms(&self, sense: &Sense) -> Result<Vec<Sense>, TreeError>;
}

/// In-memory taxonomy loaded from a TOML or JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticTaxonomy {
    /// Word -> sense labels
    #[serde(default)]
    words: HashMap<String, Vec<String>>,
    /// Sense label -> hypernym labels
    #[serde(default)]
    hypernyms: HashMap<String, Vec<String>>,
}

impl StaticTaxonomy {
    /// Create an empty taxonomy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the senses of a word (builder style).
    pub fn with_word<S: Into<String>>(
        mut self,
        word: impl Into<String>,
        senses: impl IntoIterator<Item = S>,
    ) -> Self {
        self.add_word(word, senses);
        self
    }

    /// Add the hypernyms of a sense (builder style).
    pub fn with_hypernyms<S: Into<String>>(
        mut self,
        sense: impl Into<String>,
        hypernyms: impl IntoIterator<Item = S>,
    ) -> Self {
        self.add_hypernyms(sense, hypernyms);
        self
    }

    /// Set the senses of a word, replacing any previous entry.
    pub fn add_word<S: Into<String>>(
        &mut self,
        word: impl Into<String>,
        senses: impl IntoIterator<Item = S>,
    ) {
        self.words
            .insert(word.into(), senses.into_iter().map(Into::into).collect());
    }

    /// Set the hypernyms of a sense, replacing any previous entry.
    pub fn add_hypernyms<S: Into<String>>(
        &mut self,
        sense: impl Into<String>,
        hypernyms: impl IntoIterator<Item = S>,
    ) {
        self.hypernyms
            .insert(sense.into(), hypernyms.into_iter().map(Into::into).collect());
    }

    /// Add a whole path at once: `word` gets `path[0]` as its first sense
    /// and each sense in `path` gets the next one as its first hypernym.
    ///
    /// Existing entries keep their order; new senses are appended.
    pub fn add_path(&mut self, word: &str, path: &[&str]) {
        let Some(first) = path.first() else {
            return;
        };
        push_unique(self.words.entry(word.to_string()).or_default(), first);
        for pair in path.windows(2) {
            push_unique(self.hypernyms.entry(pair[0].to_string()).or_default(), pair[1]);
        }
    }

    /// Parse a taxonomy from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, TreeError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a taxonomy from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, TreeError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a taxonomy file. `.json` files are read as JSON, anything else
    /// as TOML.
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let taxonomy = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        debug!(
            path = %path.display(),
            words = taxonomy.word_count(),
            senses = taxonomy.sense_count(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Number of words with at least one entry.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Number of senses with hypernym entries.
    pub fn sense_count(&self) -> usize {
        self.hypernyms.len()
    }
}

fn push_unique(list: &mut Vec<String>, label: &str) {
    if !list.iter().any(|l| l == label) {
        list.push(label.to_string());
    }
}

impl Taxonomy for StaticTaxonomy {
    fn senses(&self, word: &str) -> Result<Vec<Sense>, TreeError> {
        Ok(self
            .words
            .get(word)
            .map(|labels| labels.iter().map(Sense::new).collect())
            .unwrap_or_default())
    }

    fn hypernyms(&self, sense: &Sense) -> Result<Vec<Sense>, TreeError> {
        Ok(self
            .hypernyms
            .get(sense.label())
            .map(|labels| labels.iter().map(Sense::new).collect())
            .unwrap_or_default())
    }
}
