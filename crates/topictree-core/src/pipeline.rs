//! End-to-end topic tree generation.
//!
//! Runs the stages in order over one [`TermRecord`]:
//! rank -> resolve -> assemble -> compress -> prune -> annotate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use topictree_core::{StaticTaxonomy, TopicTreeGenerator};
//! use topictree_types::{TermRecord, TreeConfig};
//!
//! let taxonomy = Arc::new(StaticTaxonomy::load(path)?);
//! let generator = TopicTreeGenerator::new(taxonomy, TreeConfig::default())?;
//! let generated = generator.generate(&record).await;
//! println!("{} nodes", generated.tree.node_count());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use topictree_types::{TermRecord, TreeConfig};

use crate::annotate::annotate;
use crate::compress::{prune, CompressionStats, TreeCompressor};
use crate::error::TreeError;
use crate::ranking::{TermRanker, TopTermSet};
use crate::resolver::{chains_by_text, ChainsByText, HypernymResolver, Resolution};
use crate::taxonomy::Taxonomy;
use crate::tree::TopicTree;

/// Summary of one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Texts in the corpus
    pub texts: usize,
    /// Distinct top terms across all texts
    pub top_terms: usize,
    /// Top terms that resolved to a chain
    pub resolved_terms: usize,
    /// Term -> reason it could not be resolved
    pub failures: BTreeMap<String, String>,
    /// Compression counters
    pub compression: CompressionStats,
    /// Nodes removed by pruning
    pub pruned: usize,
    /// Nodes in the finished tree
    pub nodes: usize,
    /// Edges in the finished tree
    pub edges: usize,
}

/// Output of [`TopicTreeGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GeneratedTree {
    /// Compressed, pruned and annotated tree
    pub tree: TopicTree,
    /// Ranked terms per text
    pub top_terms: TopTermSet,
    /// Chains used per text
    pub chains: ChainsByText,
    /// Run summary
    pub report: GenerationReport,
}

/// Builds annotated topic trees from term records.
pub struct TopicTreeGenerator {
    resolver: Arc<HypernymResolver>,
    config: TreeConfig,
}

impl TopicTreeGenerator {
    /// Create a generator over `taxonomy`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(taxonomy: Arc<dyn Taxonomy>, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate().map_err(TreeError::InvalidConfig)?;
        Ok(Self {
            resolver: Arc::new(HypernymResolver::new(taxonomy)),
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Rank the record's terms without building a tree.
    pub fn rank(&self, record: &TermRecord) -> TopTermSet {
        TermRanker::new(self.config.top_terms).rank(record)
    }

    /// Run the whole pipeline, resolving terms concurrently.
    ///
    /// Terms that fail to resolve are reported and left out; a tree is always
    /// produced from whatever resolved.
    #[instrument(skip_all, fields(texts = record.text_count()))]
    pub async fn generate(&self, record: &TermRecord) -> GeneratedTree {
        let top_terms = self.rank(record);
        let terms = top_terms
            .values()
            .flatten()
            .map(|scored| scored.term.clone());

        let resolution = self
            .resolver
            .resolve_many(
                terms,
                self.config.max_concurrent_lookups,
                Duration::from_millis(self.config.lookup_timeout_ms),
            )
            .await;

        self.build(record, top_terms, resolution)
    }

    /// Run the whole pipeline on the calling thread.
    #[instrument(skip_all, fields(texts = record.text_count()))]
    pub fn generate_sequential(&self, record: &TermRecord) -> GeneratedTree {
        let top_terms = self.rank(record);
        let resolution = self.resolver.resolve_all(&top_terms);
        self.build(record, top_terms, resolution)
    }

    fn build(
        &self,
        record: &TermRecord,
        top_terms: TopTermSet,
        resolution: Resolution,
    ) -> GeneratedTree {
        let chains = chains_by_text(&top_terms, &resolution);
        let mut tree = TopicTree::from_chains(resolution.chains.values().map(Arc::as_ref));
        info!(
            nodes = tree.node_count(),
            edges = tree.edge_count(),
            "Assembled topic tree"
        );

        let compression = TreeCompressor::new(self.config.min_children, &self.config.name_separator)
            .compress(&mut tree);
        let pruned = prune(&mut tree, &self.config.prune, self.config.prune_mode);
        annotate(&mut tree, &chains);

        let report = GenerationReport {
            texts: record.text_count(),
            top_terms: resolution.chains.len() + resolution.failures.len(),
            resolved_terms: resolution.chains.len(),
            failures: resolution.failures,
            compression,
            pruned,
            nodes: tree.node_count(),
            edges: tree.edge_count(),
        };
        info!(
            nodes = report.nodes,
            edges = report.edges,
            failures = report.failures.len(),
            "Generated topic tree"
        );

        GeneratedTree {
            tree,
            top_terms,
            chains,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::StaticTaxonomy;
    use topictree_types::{PruneMode, TextTerms};

    fn taxonomy() -> Arc<StaticTaxonomy> {
        let mut taxonomy = StaticTaxonomy::new();
        taxonomy.add_path("dog", &["dog.n.01", "canine.n.02", "carnivore.n.01", "animal.n.01"]);
        taxonomy.add_path("fox", &["fox.n.01", "canine.n.02", "carnivore.n.01", "animal.n.01"]);
        taxonomy.add_path("cat", &["cat.n.01", "feline.n.01", "carnivore.n.01", "animal.n.01"]);
        taxonomy.add_path("ship", &["ship.n.01", "vessel.n.02", "artifact.n.01"]);
        Arc::new(taxonomy)
    }

    fn record() -> TermRecord {
        TermRecord::from_texts(&[
            TextTerms::with_counts("t1", [("dog", 2), ("fox", 1)]),
            TextTerms::with_counts("t2", [("dog", 3), ("cat", 1)]),
            TextTerms::with_counts("t3", [("ship", 4), ("unicorn", 1)]),
        ])
        .unwrap()
    }

    fn config() -> TreeConfig {
        TreeConfig {
            top_terms: 2,
            ..TreeConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TreeConfig {
            min_children: 0,
            ..TreeConfig::default()
        };
        assert!(matches!(
            TopicTreeGenerator::new(taxonomy(), config),
            Err(TreeError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_builds_annotated_tree() {
        let generator = TopicTreeGenerator::new(taxonomy(), config()).unwrap();
        let generated = generator.generate(&record()).await;
        let tree = &generated.tree;

        assert!(tree.contains("carnivore.n.01"));
        assert!(tree.contains("dog"));
        assert!(tree.contains("unicorn"));
        assert!(generated.report.failures.is_empty());
        assert_eq!(generated.report.texts, 3);

        let carnivore = tree.node("carnivore.n.01").unwrap();
        assert!(carnivore.texts.contains("t1"));
        assert!(carnivore.texts.contains("t2"));
        assert!(!carnivore.texts.contains("t3"));
        assert!(carnivore.count as usize >= carnivore.texts.len());
        assert!(generated.report.compression.nodes_after <= generated.report.compression.nodes_before);
    }

    #[tokio::test]
    async fn test_concurrent_and_sequential_agree() {
        let generator = TopicTreeGenerator::new(taxonomy(), config()).unwrap();
        let concurrent = generator.generate(&record()).await;
        let sequential = generator.generate_sequential(&record());

        assert_eq!(concurrent.tree.edges(), sequential.tree.edges());
        assert_eq!(concurrent.tree.nodes(), sequential.tree.nodes());
    }

    #[test]
    fn test_prune_from_config() {
        let config = TreeConfig {
            prune: vec!["animal.n.01".to_string()],
            prune_mode: PruneMode::Discard,
            ..config()
        };
        let generator = TopicTreeGenerator::new(taxonomy(), config).unwrap();
        let generated = generator.generate_sequential(&record());

        assert!(!generated.tree.contains("animal.n.01"));
        assert_eq!(generated.report.pruned, 1);
    }

    #[test]
    fn test_empty_record() {
        let generator = TopicTreeGenerator::new(taxonomy(), config()).unwrap();
        let generated = generator.generate_sequential(&TermRecord::new());

        assert!(generated.tree.is_empty());
        assert!(generated.top_terms.is_empty());
    }
}
