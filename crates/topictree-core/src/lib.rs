//! # topictree-core
//!
//! Builds a hierarchical topic tree summarizing a text corpus.
//!
//! The most salient terms of each text are selected by TF-IDF, mapped to
//! their ancestor chains in a lexical taxonomy, merged into one directed
//! graph and compressed with the castanet algorithm.
//!
//! ## Features
//! - Bounded top-K TF-IDF ranking with deterministic tie-breaking
//! - Memoized hypernym resolution behind an injectable [`Taxonomy`] port
//! - Concurrent, timeout-bounded taxonomy lookups
//! - Two-phase castanet compression and configurable pruning
//! - Plain-text and TEI XML term extraction
//! - Per-node text annotation
//! - Node-link JSON and Graphviz DOT export

pub mod annotate;
pub mod compress;
pub mod error;
pub mod export;
pub mod extraction;
pub mod pipeline;
pub mod ranking;
pub mod resolver;
pub mod taxonomy;
pub mod tei;
pub mod tree;

pub use annotate::annotate;
pub use compress::{names_overlap, prune, short_name, CompressionStats, TreeCompressor};
pub use error::TreeError;
pub use export::{to_dot, to_node_link_json, NodeLinkGraph};
pub use extraction::{tokenize, TermExtractor};
pub use pipeline::{GeneratedTree, GenerationReport, TopicTreeGenerator};
pub use ranking::{idf, ScoredTerm, TermRanker, TopTermSet};
pub use resolver::{chains_by_text, ChainsByText, HypernymChain, HypernymResolver, Resolution};
pub use taxonomy::{Sense, StaticTaxonomy, Taxonomy};
pub use tei::{TeiReader, TeiSection};
pub use tree::{TopicNode, TopicTree};
