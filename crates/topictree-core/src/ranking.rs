//! TF-IDF term ranking.
//!
//! Scores every (term, text) pair of a [`TermRecord`] and keeps the top K
//! terms of each text.
//!
//! - TF is the augmented frequency carried by the record (count divided by
//!   the text's maximum count).
//! - IDF is `ln(N / df)` with `N` the corpus text count and `df` the number
//!   of texts containing the term. A term in every text scores 0.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use topictree_types::{TermRecord, TextId};

/// Top-ranked terms of each text, best first.
pub type TopTermSet = BTreeMap<TextId, Vec<ScoredTerm>>;

/// A term's statistics in one text together with its TF-IDF score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTerm {
    /// The term
    pub term: String,
    /// Text the statistics belong to
    pub text_id: TextId,
    /// Raw count in the text
    pub count: u32,
    /// Augmented frequency in the text
    pub frequency: f64,
    /// `frequency * idf(term)`
    pub tf_idf: f64,
}

/// Inverse document frequency, `ln(text_count / document_frequency)`.
///
/// Returns `None` when the term occurs in no text (or the corpus is empty),
/// where the ratio is undefined.
pub fn idf(text_count: usize, document_frequency: usize) -> Option<f64> {
    if document_frequency == 0 || text_count == 0 {
        return None;
    }
    Some((text_count as f64 / document_frequency as f64).ln())
}

/// Heap entry ordered by rank: higher score first, then smaller term.
///
/// The heap holds whole terms, so two terms with the same score are two
/// distinct entries.
#[derive(Debug)]
struct Ranked(ScoredTerm);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .tf_idf
            .total_cmp(&other.0.tf_idf)
            .then_with(|| other.0.term.cmp(&self.0.term))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Selects the most salient terms of each text.
#[derive(Debug, Clone)]
pub struct TermRanker {
    top_k: usize,
}

impl TermRanker {
    /// Create a ranker keeping at most `top_k` terms per text.
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Maximum number of terms kept per text.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Score every (term, text) pair in the record.
    ///
    /// Terms without a defined IDF are excluded and logged.
    pub fn score(&self, record: &TermRecord) -> Vec<ScoredTerm> {
        let text_count = record.text_count();
        let mut scored = Vec::new();

        for (term, texts) in record.terms() {
            let Some(term_idf) = idf(text_count, texts.len()) else {
                warn!(term = %term, "Term occurs in no text, excluding from ranking");
                continue;
            };

            for (text_id, stats) in texts {
                scored.push(ScoredTerm {
                    term: term.clone(),
                    text_id: text_id.clone(),
                    count: stats.count,
                    frequency: stats.frequency,
                    tf_idf: stats.frequency * term_idf,
                });
            }
        }

        scored
    }

    /// Keep the `top_k` best terms of each text.
    ///
    /// Ties on score are broken by term, so the result does not depend on
    /// the order terms are visited in.
    #[instrument(skip(self, record), fields(top_k = self.top_k, texts = record.text_count()))]
    pub fn rank(&self, record: &TermRecord) -> TopTermSet {
        let mut heaps: BTreeMap<TextId, BinaryHeap<Reverse<Ranked>>> = BTreeMap::new();

        for candidate in self.score(record) {
            let heap = heaps.entry(candidate.text_id.clone()).or_default();
            offer(heap, candidate, self.top_k);
        }

        let top_terms: TopTermSet = heaps
            .into_iter()
            .map(|(text_id, heap)| (text_id, into_ranked_vec(heap)))
            .collect();

        debug!(
            texts = top_terms.len(),
            terms = top_terms.values().map(Vec::len).sum::<usize>(),
            "Ranked terms"
        );
        top_terms
    }
}

/// Offer a candidate to a bounded min-heap of size `k`.
fn offer(heap: &mut BinaryHeap<Reverse<Ranked>>, candidate: ScoredTerm, k: usize) {
    if k == 0 {
        return;
    }

    if heap.len() < k {
        heap.push(Reverse(Ranked(candidate)));
        return;
    }

    let candidate = Ranked(candidate);
    let replaces_minimum = heap
        .peek()
        .is_some_and(|Reverse(minimum)| candidate > *minimum);

    if replaces_minimum {
        heap.pop();
        heap.push(Reverse(candidate));
    }
}

fn into_ranked_vec(heap: BinaryHeap<Reverse<Ranked>>) -> Vec<ScoredTerm> {
    // Ascending order of Reverse<_> is descending rank.
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(Ranked(term))| term)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use topictree_types::TextTerms;

    fn record(texts: &[TextTerms]) -> TermRecord {
        TermRecord::from_texts(texts).unwrap()
    }

    fn scored(term: &str, tf_idf: f64) -> ScoredTerm {
        ScoredTerm {
            term: term.to_string(),
            text_id: "t".to_string(),
            count: 1,
            frequency: 1.0,
            tf_idf,
        }
    }

    fn select(candidates: Vec<ScoredTerm>, k: usize) -> Vec<String> {
        let mut heap = BinaryHeap::new();
        for c in candidates {
            offer(&mut heap, c, k);
        }
        into_ranked_vec(heap).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn test_idf_values() {
        assert_eq!(idf(2, 2), Some(0.0));
        assert!((idf(2, 1).unwrap() - 2f64.ln()).abs() < 1e-12);
        assert_eq!(idf(3, 0), None);
        assert_eq!(idf(0, 0), None);
    }

    #[test]
    fn test_idf_non_negative() {
        for n in 1..20 {
            for df in 1..=n {
                let value = idf(n, df).unwrap();
                assert!(value >= 0.0);
                assert_eq!(value == 0.0, df == n);
            }
        }
    }

    #[test]
    fn test_rare_term_outranks_ubiquitous_term() {
        let texts = [
            TextTerms::with_counts("t1", [("dog", 2), ("fox", 1)]),
            TextTerms::with_counts("t2", [("dog", 3)]),
        ];
        let record = record(&texts);
        let scores = TermRanker::new(1).score(&record);

        let dog = scores
            .iter()
            .find(|s| s.term == "dog" && s.text_id == "t1")
            .unwrap();
        let fox = scores.iter().find(|s| s.term == "fox").unwrap();
        assert_eq!(dog.frequency, 1.0);
        assert_eq!(dog.tf_idf, 0.0);
        assert!((fox.frequency - 0.5).abs() < f64::EPSILON);
        assert!((fox.tf_idf - 0.5 * 2f64.ln()).abs() < 1e-12);

        let top = TermRanker::new(1).rank(&record);
        assert_eq!(top["t1"].len(), 1);
        assert_eq!(top["t1"][0].term, "fox");
        assert_eq!(top["t2"][0].term, "dog");
    }

    #[test]
    fn test_rank_bounds() {
        let texts = [
            TextTerms::with_counts("t1", [("a", 5), ("b", 4), ("c", 3), ("d", 2)]),
            TextTerms::with_counts("t2", [("a", 1)]),
            TextTerms::with_counts("t3", [("e", 1), ("f", 2)]),
        ];
        let record = record(&texts);

        for k in 1..6 {
            let top = TermRanker::new(k).rank(&record);
            for text in &texts {
                let kept = top.get(&text.text_id).map_or(0, Vec::len);
                assert!(kept <= k);
                assert_eq!(kept, k.min(text.len()));
            }
        }
    }

    #[test]
    fn test_rank_sorted_descending() {
        let texts = [
            TextTerms::with_counts("t1", [("a", 5), ("b", 4), ("c", 3), ("d", 2)]),
            TextTerms::with_counts("t2", [("z", 1)]),
        ];
        let top = TermRanker::new(3).rank(&record(&texts));

        let terms: Vec<&str> = top["t1"].iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["a", "b", "c"]);
        for pair in top["t1"].windows(2) {
            assert!(pair[0].tf_idf >= pair[1].tf_idf);
        }
    }

    #[test]
    fn test_tied_scores_keep_both_terms() {
        let kept = select(vec![scored("cat", 0.5), scored("bat", 0.5)], 2);
        assert_eq!(kept, vec!["bat", "cat"]);
    }

    #[test]
    fn test_tie_break_independent_of_order() {
        let forward = select(
            vec![scored("ant", 0.3), scored("bee", 0.3), scored("cow", 0.3), scored("elk", 0.9)],
            2,
        );
        let backward = select(
            vec![scored("elk", 0.9), scored("cow", 0.3), scored("bee", 0.3), scored("ant", 0.3)],
            2,
        );
        assert_eq!(forward, vec!["elk", "ant"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_strictly_greater_replaces_minimum() {
        let kept = select(vec![scored("low", 0.1), scored("mid", 0.2), scored("high", 0.3)], 2);
        assert_eq!(kept, vec!["high", "mid"]);
    }

    #[test]
    fn test_zero_k_keeps_nothing() {
        let texts = [TextTerms::with_counts("t1", [("a", 1)])];
        let top = TermRanker::new(0).rank(&record(&texts));
        assert!(top.values().all(Vec::is_empty));
    }

    #[test]
    fn test_empty_record() {
        let top = TermRanker::new(5).rank(&TermRecord::new());
        assert!(top.is_empty());
    }

    #[test]
    fn test_declared_text_count_raises_idf() {
        let texts = [TextTerms::with_counts("t1", [("dog", 1)])];
        let mut record = record(&texts);
        record.set_text_count(4).unwrap();

        let scores = TermRanker::new(1).score(&record);
        assert!((scores[0].tf_idf - 4f64.ln()).abs() < 1e-12);
    }
}
