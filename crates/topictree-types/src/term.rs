//! Term counts per text and the merged corpus term record.
//!
//! A [`TextTerms`] holds the raw counts produced for one text by the
//! tokenization layer. A [`TermRecord`] merges many of them into the
//! `term -> text -> stats` shape used for ranking.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::TopicTreeError;

/// Identifier of a text unit within the corpus.
pub type TextId = String;

/// Pre-counted corpus input: `text_id -> term -> raw count`.
pub type CorpusCounts = BTreeMap<TextId, BTreeMap<String, u32>>;

/// Count and augmented frequency of one term in one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermStats {
    /// Raw occurrence count
    pub count: u32,
    /// Count divided by the largest count of any term in the same text
    pub frequency: f64,
}

/// Raw term counts for a single text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTerms {
    /// Text identifier
    pub text_id: TextId,
    /// Term -> raw count
    pub counts: BTreeMap<String, u32>,
}

impl TextTerms {
    /// Create an empty set of counts for a text.
    pub fn new(text_id: impl Into<TextId>) -> Self {
        Self {
            text_id: text_id.into(),
            counts: BTreeMap::new(),
        }
    }

    /// Create counts for a text from `(term, count)` pairs.
    pub fn with_counts<S, I>(text_id: impl Into<TextId>, counts: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, u32)>,
    {
        let mut terms = Self::new(text_id);
        for (term, count) in counts {
            terms.add_count(term, count);
        }
        terms
    }

    /// Record one more occurrence of `term`.
    pub fn add(&mut self, term: impl Into<String>) {
        self.add_count(term, 1);
    }

    /// Record `count` occurrences of `term`.
    pub fn add_count(&mut self, term: impl Into<String>, count: u32) {
        let entry = self.counts.entry(term.into()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Largest raw count of any term in this text.
    pub fn max_count(&self) -> u32 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    /// Number of distinct terms with a non-zero count.
    pub fn len(&self) -> usize {
        self.counts.values().filter(|c| **c > 0).count()
    }

    /// Check if the text contributed no terms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Augmented term frequencies for this text.
    ///
    /// Each count is normalized by the text's maximum count, so the most
    /// frequent term always has a frequency of exactly 1.0. Zero counts are
    /// skipped.
    pub fn term_stats(&self) -> BTreeMap<String, TermStats> {
        let max = self.max_count();
        if max == 0 {
            return BTreeMap::new();
        }

        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(term, count)| {
                let stats = TermStats {
                    count: *count,
                    frequency: f64::from(*count) / f64::from(max),
                };
                (term.clone(), stats)
            })
            .collect()
    }
}

/// Term statistics merged across every text of a corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermRecord {
    terms: BTreeMap<String, BTreeMap<TextId, TermStats>>,
    text_ids: BTreeSet<TextId>,
    text_count: usize,
}

impl TermRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a sequence of per-text counts.
    pub fn from_texts<'a, I>(texts: I) -> Result<Self, TopicTreeError>
    where
        I: IntoIterator<Item = &'a TextTerms>,
    {
        let mut record = Self::new();
        for text in texts {
            record.add_text(text)?;
        }
        Ok(record)
    }

    /// Build a record from pre-counted `text -> term -> count` input.
    pub fn from_counts(counts: &CorpusCounts) -> Result<Self, TopicTreeError> {
        let texts: Vec<TextTerms> = counts
            .iter()
            .map(|(text_id, terms)| {
                TextTerms::with_counts(text_id.clone(), terms.iter().map(|(t, c)| (t.clone(), *c)))
            })
            .collect();
        Self::from_texts(&texts)
    }

    /// Merge one text's counts into the record.
    ///
    /// Every added text counts toward the corpus size, including texts that
    /// contributed no terms.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a text with the same id was already added.
    pub fn add_text(&mut self, text: &TextTerms) -> Result<(), TopicTreeError> {
        if !self.text_ids.insert(text.text_id.clone()) {
            return Err(TopicTreeError::InvalidInput(format!(
                "duplicate text id: {}",
                text.text_id
            )));
        }

        for (term, stats) in text.term_stats() {
            self.terms
                .entry(term)
                .or_default()
                .insert(text.text_id.clone(), stats);
        }

        self.text_count = self.text_count.max(self.text_ids.len());
        Ok(())
    }

    /// Declare the corpus-wide text count when it exceeds the texts added.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `count` is smaller than the number of texts
    /// already added.
    pub fn set_text_count(&mut self, count: usize) -> Result<(), TopicTreeError> {
        if count < self.text_ids.len() {
            return Err(TopicTreeError::InvalidInput(format!(
                "text count {} is smaller than the {} texts recorded",
                count,
                self.text_ids.len()
            )));
        }
        self.text_count = count;
        Ok(())
    }

    /// Total number of texts in the corpus.
    pub fn text_count(&self) -> usize {
        self.text_count
    }

    /// Identifiers of the texts merged so far.
    pub fn text_ids(&self) -> impl Iterator<Item = &TextId> {
        self.text_ids.iter()
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Iterate `(term, text -> stats)` in term order.
    pub fn terms(&self) -> impl Iterator<Item = (&String, &BTreeMap<TextId, TermStats>)> {
        self.terms.iter()
    }

    /// Per-text statistics for one term.
    pub fn get(&self, term: &str) -> Option<&BTreeMap<TextId, TermStats>> {
        self.terms.get(term)
    }

    /// Number of texts containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.terms.get(term).map_or(0, BTreeMap::len)
    }

    /// Check if no terms were recorded.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
