//! # topictree-types
//!
//! Shared domain types for the topictree workspace.
//!
//! This crate defines the records exchanged between the corpus readers and
//! the tree engine:
//! - Term records: per-text raw counts and augmented frequencies
//! - Settings: layered configuration for the engine and the CLI
//!
//! ## Usage
//!
//! ```rust
//! use topictree_types::{TermRecord, TextTerms};
//!
//! let mut record = TermRecord::new();
//! record
//!     .add_text(&TextTerms::with_counts("t1", [("dog", 2), ("fox", 1)]))
//!     .unwrap();
//! assert_eq!(record.text_count(), 1);
//! ```

pub mod config;
pub mod error;
pub mod term;

pub use config::{ExtractionConfig, PruneMode, Settings, TreeConfig};
pub use error::TopicTreeError;
pub use term::{CorpusCounts, TermRecord, TermStats, TextId, TextTerms};
