//! Hypernym chain resolution.
//!
//! A term is mapped to a single root-to-leaf path through the taxonomy by
//! always taking the first (most common) sense of the word and then the first
//! hypernym of each sense until a sense has none. Words with several
//! unrelated senses are therefore reduced to their most common one, and a
//! taxonomy with a different sense ordering yields different chains.
//!
//! Chains depend only on the term, so they are memoized for the whole run and
//! shared between texts through `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use topictree_types::TextId;

use crate::error::TreeError;
use crate::ranking::TopTermSet;
use crate::taxonomy::Taxonomy;

/// Ancestor path of a term, root first and the term itself last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChainLabels")]
pub struct HypernymChain {
    labels: Vec<String>,
}

/// Unchecked serialized form of a [`HypernymChain`].
#[derive(Deserialize)]
struct ChainLabels {
    labels: Vec<String>,
}

impl TryFrom<ChainLabels> for HypernymChain {
    type Error = TreeError;

    fn try_from(raw: ChainLabels) -> Result<Self, Self::Error> {
        Self::new(raw.labels)
    }
}

impl HypernymChain {
    /// Build a chain from root-first labels.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `labels` is empty.
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self, TreeError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(TreeError::InvalidInput(
                "hypernym chain must have at least one label".to_string(),
            ));
        }
        Ok(Self { labels })
    }

    /// The original term (the leaf).
    pub fn term(&self) -> &str {
        self.leaf()
    }

    /// Most general label.
    pub fn root(&self) -> &str {
        &self.labels[0]
    }

    /// Most specific label, the original term.
    pub fn leaf(&self) -> &str {
        &self.labels[self.labels.len() - 1]
    }

    /// All labels, root first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels in the chain.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; a chain holds at least its term.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Consecutive `(hypernym, hyponym)` pairs, root first.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }
}

/// Result of resolving a batch of terms.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Term -> resolved chain
    pub chains: BTreeMap<String, Arc<HypernymChain>>,
    /// Term -> reason it could not be resolved
    pub failures: BTreeMap<String, String>,
}

impl Resolution {
    fn record(&mut self, term: String, result: Result<Arc<HypernymChain>, TreeError>) {
        match result {
            Ok(chain) => {
                self.chains.insert(term, chain);
            }
            Err(e) => {
                warn!(term = %term, error = %e, "Term could not be resolved");
                self.failures.insert(term, e.to_string());
            }
        }
    }
}

/// Chains used by each text: `text -> term -> chain`.
pub type ChainsByText = BTreeMap<TextId, BTreeMap<String, Arc<HypernymChain>>>;

/// Group resolved chains by the texts whose top terms they came from.
///
/// Terms that failed to resolve are left out.
pub fn chains_by_text(top_terms: &TopTermSet, resolution: &Resolution) -> ChainsByText {
    top_terms
        .iter()
        .map(|(text_id, terms)| {
            let chains = terms
                .iter()
                .filter_map(|scored| {
                    resolution
                        .chains
                        .get(&scored.term)
                        .map(|chain| (scored.term.clone(), Arc::clone(chain)))
                })
                .collect();
            (text_id.clone(), chains)
        })
        .collect()
}

/// Memoizing term -> chain resolver over an injected taxonomy.
pub struct HypernymResolver {
    taxonomy: Arc<dyn Taxonomy>,
    cache: Mutex<HashMap<String, Arc<HypernymChain>>>,
}

impl HypernymResolver {
    /// Create a resolver over `taxonomy`.
    pub fn new(taxonomy: Arc<dyn Taxonomy>) -> Self {
        Self {
            taxonomy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a term to its chain, reusing a cached chain when present.
    ///
    /// # Errors
    ///
    /// Propagates taxonomy lookup failures and reports a revisited sense as
    /// `TaxonomyCycle`. Failures are not cached.
    pub fn resolve(&self, term: &str) -> Result<Arc<HypernymChain>, TreeError> {
        if let Some(chain) = self.cached(term) {
            return Ok(chain);
        }

        let chain = Arc::new(self.walk(term)?);

        if let Ok(mut cache) = self.cache.lock() {
            let shared = cache
                .entry(term.to_string())
                .or_insert_with(|| Arc::clone(&chain));
            return Ok(Arc::clone(shared));
        }
        Ok(chain)
    }

    /// Number of memoized chains.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    fn cached(&self, term: &str) -> Option<Arc<HypernymChain>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(term).cloned())
    }

    fn walk(&self, term: &str) -> Result<HypernymChain, TreeError> {
        let mut labels = vec![term.to_string()];
        let mut seen: HashSet<String> = HashSet::from([term.to_string()]);

        let mut current = self.taxonomy.senses(term)?.into_iter().next();
        while let Some(sense) = current {
            if !seen.insert(sense.label().to_string()) {
                return Err(TreeError::TaxonomyCycle {
                    term: term.to_string(),
                    sense: sense.label().to_string(),
                });
            }
            labels.push(sense.label().to_string());
            current = self.taxonomy.hypernyms(&sense)?.into_iter().next();
        }

        labels.reverse();
        debug!(term = %term, depth = labels.len(), "Resolved hypernym chain");
        Ok(HypernymChain { labels })
    }

    /// Resolve every distinct top term, one after another.
    #[instrument(skip(self, top_terms))]
    pub fn resolve_all(&self, top_terms: &TopTermSet) -> Resolution {
        let terms: BTreeSet<&str> = top_terms
            .values()
            .flatten()
            .map(|scored| scored.term.as_str())
            .collect();

        let mut resolution = Resolution::default();
        for term in terms {
            resolution.record(term.to_string(), self.resolve(term));
        }
        resolution
    }

    /// Resolve distinct terms on the blocking pool.
    ///
    /// At most `max_concurrent` lookups run at once and each one is given
    /// `timeout` to finish; a lookup that runs out of time is a failure for
    /// that term only.
    #[instrument(skip(self, terms))]
    pub async fn resolve_many<I>(
        self: &Arc<Self>,
        terms: I,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Resolution
    where
        I: IntoIterator<Item = String>,
    {
        let unique: BTreeSet<String> = terms.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for term in unique {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let resolver = Arc::clone(self);

            tasks.spawn(async move {
                let lookup_term = term.clone();
                // The permit lives as long as the blocking lookup, which keeps
                // running after a timeout.
                let lookup = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    resolver.resolve(&lookup_term)
                });

                let result = match tokio::time::timeout(timeout, lookup).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(TreeError::Lookup {
                        term: term.clone(),
                        reason: format!("lookup task failed: {}", e),
                    }),
                    Err(_) => Err(TreeError::LookupTimeout(term.clone())),
                };
                (term, result)
            });
        }

        let mut resolution = Resolution::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((term, result)) => resolution.record(term, result),
                Err(e) => warn!(error = %e, "Resolution task failed"),
            }
        }

        debug!(
            resolved = resolution.chains.len(),
            failed = resolution.failures.len(),
            "Resolved term batch"
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::ScoredTerm;
    use crate::taxonomy::{Sense, StaticTaxonomy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn animals() -> StaticTaxonomy {
        StaticTaxonomy::new()
            .with_word("dog", ["dog.n.01", "frump.n.01"])
            .with_word("fox", ["fox.n.01"])
            .with_hypernyms("dog.n.01", ["canine.n.02", "domestic_animal.n.01"])
            .with_hypernyms("fox.n.01", ["canine.n.02"])
            .with_hypernyms("canine.n.02", ["carnivore.n.01"])
            .with_hypernyms("frump.n.01", ["person.n.01"])
    }

    /// Taxonomy that counts lookups and fails for one word.
    struct CountingTaxonomy {
        inner: StaticTaxonomy,
        lookups: AtomicUsize,
        failing: &'static str,
    }

    impl Taxonomy for CountingTaxonomy {
        fn senses(&self, word: &str) -> Result<Vec<Sense>, TreeError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if word == self.failing {
                return Err(TreeError::Lookup {
                    term: word.to_string(),
                    reason: "database unavailable".to_string(),
                });
            }
            self.inner.senses(word)
        }

        fn hypernyms(&self, sense: &Sense) -> Result<Vec<Sense>, TreeError> {
            self.inner.hypernyms(sense)
        }
    }

    /// Taxonomy that sleeps in every lookup and records peak concurrency.
    #[derive(Default)]
    struct InFlightTaxonomy {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Taxonomy for InFlightTaxonomy {
        fn senses(&self, _word: &str) -> Result<Vec<Sense>, TreeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(120));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        fn hypernyms(&self, _sense: &Sense) -> Result<Vec<Sense>, TreeError> {
            Ok(Vec::new())
        }
    }

    /// Taxonomy whose lookups never finish in time.
    struct SlowTaxonomy;

    impl Taxonomy for SlowTaxonomy {
        fn senses(&self, word: &str) -> Result<Vec<Sense>, TreeError> {
            if word == "slow" {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(Vec::new())
        }

        fn hypernyms(&self, _sense: &Sense) -> Result<Vec<Sense>, TreeError> {
            Ok(Vec::new())
        }
    }

    fn top_terms(entries: &[(&str, &str)]) -> TopTermSet {
        let mut set = TopTermSet::new();
        for (text, term) in entries {
            set.entry(text.to_string()).or_default().push(ScoredTerm {
                term: term.to_string(),
                text_id: text.to_string(),
                count: 1,
                frequency: 1.0,
                tf_idf: 0.5,
            });
        }
        set
    }

    #[test]
    fn test_chain_follows_first_sense_and_hypernym() {
        let resolver = HypernymResolver::new(Arc::new(animals()));
        let chain = resolver.resolve("dog").unwrap();

        assert_eq!(
            chain.labels(),
            &["carnivore.n.01", "canine.n.02", "dog.n.01", "dog"]
        );
        assert_eq!(chain.root(), "carnivore.n.01");
        assert_eq!(chain.leaf(), "dog");
        assert_eq!(chain.term(), "dog");
    }

    #[test]
    fn test_unknown_word_is_single_node_chain() {
        let resolver = HypernymResolver::new(Arc::new(animals()));
        let chain = resolver.resolve("unicorn").unwrap();

        assert_eq!(chain.labels(), &["unicorn"]);
        assert_eq!(chain.root(), chain.leaf());
        assert_eq!(chain.edges().count(), 0);
    }

    #[test]
    fn test_chain_edges_root_first() {
        let chain = HypernymChain::new(["a", "b", "c"]).unwrap();
        let edges: Vec<_> = chain.edges().collect();
        assert_eq!(edges, vec![("a", "b"), ("b", "c")]);
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_empty());
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(HypernymChain::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_deserialize_checks_labels() {
        let chain: HypernymChain =
            serde_json::from_str(r#"{"labels": ["animal.n.01", "dog"]}"#).unwrap();
        assert_eq!(chain.root(), "animal.n.01");
        assert_eq!(chain.leaf(), "dog");

        let empty = serde_json::from_str::<HypernymChain>(r#"{"labels": []}"#);
        assert!(empty.is_err());
    }

    #[test]
    fn test_cache_reuses_chain() {
        let taxonomy = Arc::new(CountingTaxonomy {
            inner: animals(),
            lookups: AtomicUsize::new(0),
            failing: "",
        });
        let resolver = HypernymResolver::new(taxonomy.clone());

        let first = resolver.resolve("fox").unwrap();
        let second = resolver.resolve("fox").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(taxonomy.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_count(), 1);
    }

    #[test]
    fn test_cycle_detected() {
        let taxonomy = StaticTaxonomy::new()
            .with_word("loop", ["a.n.01"])
            .with_hypernyms("a.n.01", ["b.n.01"])
            .with_hypernyms("b.n.01", ["a.n.01"]);
        let resolver = HypernymResolver::new(Arc::new(taxonomy));

        match resolver.resolve("loop") {
            Err(TreeError::TaxonomyCycle { term, sense }) => {
                assert_eq!(term, "loop");
                assert_eq!(sense, "a.n.01");
            }
            other => panic!("Expected TaxonomyCycle, got {:?}", other),
        }
        assert_eq!(resolver.cached_count(), 0);
    }

    #[test]
    fn test_sense_named_like_word_is_a_cycle() {
        let taxonomy = StaticTaxonomy::new().with_word("echo", ["echo"]);
        let resolver = HypernymResolver::new(Arc::new(taxonomy));
        assert!(matches!(
            resolver.resolve("echo"),
            Err(TreeError::TaxonomyCycle { .. })
        ));
    }

    #[test]
    fn test_resolve_all_drops_failures() {
        let taxonomy = Arc::new(CountingTaxonomy {
            inner: animals(),
            lookups: AtomicUsize::new(0),
            failing: "fox",
        });
        let resolver = HypernymResolver::new(taxonomy);
        let top = top_terms(&[("t1", "dog"), ("t1", "fox"), ("t2", "dog")]);

        let resolution = resolver.resolve_all(&top);

        assert_eq!(resolution.chains.len(), 1);
        assert!(resolution.failures["fox"].contains("database unavailable"));

        let by_text = chains_by_text(&top, &resolution);
        assert_eq!(by_text["t1"].len(), 1);
        assert!(Arc::ptr_eq(&by_text["t1"]["dog"], &by_text["t2"]["dog"]));
    }

    #[tokio::test]
    async fn test_resolve_many_matches_sequential() {
        let resolver = Arc::new(HypernymResolver::new(Arc::new(animals())));
        let terms = vec!["dog".to_string(), "fox".to_string(), "dog".to_string()];

        let resolution = resolver
            .resolve_many(terms, 2, Duration::from_secs(5))
            .await;

        assert_eq!(resolution.chains.len(), 2);
        assert!(resolution.failures.is_empty());
        assert_eq!(
            resolution.chains["fox"].labels(),
            &["carnivore.n.01", "canine.n.02", "fox.n.01", "fox"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resolve_many_times_out_single_term() {
        let resolver = Arc::new(HypernymResolver::new(Arc::new(SlowTaxonomy)));
        let terms = vec!["slow".to_string(), "fast".to_string()];

        let resolution = resolver
            .resolve_many(terms, 2, Duration::from_millis(50))
            .await;

        assert!(resolution.chains.contains_key("fast"));
        assert!(resolution.failures["slow"].contains("timed out"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_lookups_keep_concurrency_bound() {
        let taxonomy = Arc::new(InFlightTaxonomy::default());
        let resolver = Arc::new(HypernymResolver::new(taxonomy.clone()));
        let terms = ["a", "b", "c", "d"].map(String::from);

        let resolution = resolver
            .resolve_many(terms, 1, Duration::from_millis(20))
            .await;

        assert_eq!(resolution.failures.len(), 4);
        assert!(resolution.failures.values().all(|r| r.contains("timed out")));
        assert_eq!(taxonomy.peak.load(Ordering::SeqCst), 1);
    }
}
