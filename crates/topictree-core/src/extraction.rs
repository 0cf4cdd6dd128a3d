//! Plain-text term extraction.
//!
//! Turns the raw content of a text into [`TextTerms`]: lowercase word and
//! punctuation runs, minus stopwords, minus anything that is not purely
//! alphabetic, and optionally minus words the taxonomy does not know.
//! TEI documents are first split into their sections, one text each.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use topictree_types::{ExtractionConfig, TextId, TextTerms};

use crate::error::TreeError;
use crate::taxonomy::Taxonomy;
use crate::tei::TeiReader;

/// Built-in English stopword list.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "else", "every",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "might", "more", "most", "must", "my", "myself", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out",
    "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "upon", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

/// Extracts per-text term counts from plain text.
pub struct TermExtractor {
    stopwords: HashSet<String>,
    taxonomy: Option<Arc<dyn Taxonomy>>,
    tei: TeiReader,
}

impl TermExtractor {
    /// Create an extractor from configuration.
    ///
    /// No taxonomy filter is applied until one is attached with
    /// [`TermExtractor::with_taxonomy`].
    pub fn new(config: &ExtractionConfig) -> Self {
        let stopwords = STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(config.extra_stopwords.iter().map(|w| w.to_lowercase()))
            .collect();

        Self {
            stopwords,
            taxonomy: None,
            tei: TeiReader::new(config),
        }
    }

    /// Drop tokens that `taxonomy` has no senses for.
    pub fn with_taxonomy(mut self, taxonomy: Arc<dyn Taxonomy>) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    /// Count the valid terms of one text.
    pub fn extract(&self, text_id: impl Into<TextId>, content: &str) -> TextTerms {
        let mut terms = TextTerms::new(text_id);
        let mut known: HashMap<String, bool> = HashMap::new();

        for token in tokenize(content) {
            if !self.is_candidate(&token) {
                continue;
            }

            let is_known = match known.get(&token) {
                Some(k) => *k,
                None => {
                    let k = self.is_known(&token);
                    known.insert(token.clone(), k);
                    k
                }
            };

            if is_known {
                terms.add(token);
            }
        }

        debug!(
            text_id = %terms.text_id,
            distinct_terms = terms.len(),
            "Extracted terms"
        );
        terms
    }

    /// Count the valid terms of every section of a TEI document.
    ///
    /// Section texts are identified as `<document_id>-<xml:id>`.
    pub fn extract_tei(&self, document_id: &str, xml: &str) -> Result<Vec<TextTerms>, TreeError> {
        let sections = self.tei.sections(xml)?;
        debug!(document_id = %document_id, sections = sections.len(), "Split TEI document");

        Ok(sections
            .into_iter()
            .map(|section| {
                self.extract(format!("{}-{}", document_id, section.xml_id), &section.content)
            })
            .collect())
    }

    /// Check if a word is a stopword for this extractor.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    fn is_candidate(&self, token: &str) -> bool {
        !self.is_stop_word(token) && token.chars().all(|c| c.is_ascii_alphabetic())
    }

    fn is_known(&self, token: &str) -> bool {
        let Some(taxonomy) = &self.taxonomy else {
            return true;
        };

        match taxonomy.senses(token) {
            Ok(senses) => !senses.is_empty(),
            Err(e) => {
                debug!(token = %token, error = %e, "Taxonomy check failed, dropping token");
                false
            }
        }
    }
}

/// Split text into lowercase runs of word characters and runs of
/// punctuation, discarding whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        let is_word = c.is_alphanumeric() || c == '_';
        if !current.is_empty() && is_word != current_is_word {
            tokens.push(std::mem::take(&mut current));
        }
        current_is_word = is_word;
        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::StaticTaxonomy;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(tokenize("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_splits_punctuation() {
        assert_eq!(
            tokenize("Good muffins cost $3.88 in New York."),
            vec!["good", "muffins", "cost", "$", "3", ".", "88", "in", "new", "york", "."]
        );
    }

    #[test]
    fn test_tokenize_keeps_punctuation_runs() {
        assert_eq!(tokenize("wait... what?!"), vec!["wait", "...", "what", "?!"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("   \n\t").is_empty());
    }

    #[test]
    fn test_extract_counts_terms() {
        let extractor = TermExtractor::new(&ExtractionConfig::default());
        let terms = extractor.extract("t1", "The dog chased the fox. The dog won!");

        assert_eq!(terms.text_id, "t1");
        assert_eq!(terms.counts["dog"], 2);
        assert_eq!(terms.counts["fox"], 1);
        assert!(!terms.counts.contains_key("the"));
        assert!(!terms.counts.contains_key("."));
    }

    #[test]
    fn test_extract_drops_non_alphabetic() {
        let extractor = TermExtractor::new(&ExtractionConfig::default());
        let terms = extractor.extract("t1", "year 1066 caf\u{e9} snake_case ships");

        assert!(terms.counts.contains_key("year"));
        assert!(terms.counts.contains_key("ships"));
        assert!(!terms.counts.contains_key("1066"));
        assert!(!terms.counts.contains_key("caf\u{e9}"));
        assert!(!terms.counts.contains_key("snake_case"));
    }

    #[test]
    fn test_extra_stopwords() {
        let config = ExtractionConfig {
            extra_stopwords: vec!["Thee".to_string()],
            ..ExtractionConfig::default()
        };
        let extractor = TermExtractor::new(&config);

        assert!(extractor.is_stop_word("thee"));
        assert!(extractor.is_stop_word("the"));
        assert!(extractor.extract("t1", "thee and thou").counts.contains_key("thou"));
    }

    #[test]
    fn test_extract_requires_known_terms() {
        let taxonomy = StaticTaxonomy::new()
            .with_word("dog", ["dog.n.01"])
            .with_word("fox", ["fox.n.01"]);
        let extractor =
            TermExtractor::new(&ExtractionConfig::default()).with_taxonomy(Arc::new(taxonomy));

        let terms = extractor.extract("t1", "quick brown fox jumps over lazy dog dog");

        assert_eq!(terms.counts.len(), 2);
        assert_eq!(terms.counts["dog"], 2);
        assert_eq!(terms.counts["fox"], 1);
    }

    #[test]
    fn test_most_frequent_extracted_term_has_unit_frequency() {
        let extractor = TermExtractor::new(&ExtractionConfig::default());
        let terms = extractor.extract("t1", "whale whale whale ship ship sea");
        let stats = terms.term_stats();

        assert_eq!(stats["whale"].frequency, 1.0);
        assert!((stats["sea"].frequency - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_extract_tei_one_text_per_section() {
        let extractor = TermExtractor::new(&ExtractionConfig::default());
        let xml = r#"<TEI><text><body>
            <div xml:id="d1"><p>whale whale ship</p></div>
            <div xml:id="d2"><p>The sea.</p></div>
        </body></text></TEI>"#;

        let texts = extractor.extract_tei("logbook", xml).unwrap();

        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].text_id, "logbook-d1");
        assert_eq!(texts[0].counts["whale"], 2);
        assert_eq!(texts[1].text_id, "logbook-d2");
        assert_eq!(texts[1].counts.len(), 1);
    }
}
