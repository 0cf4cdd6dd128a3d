//! Castanet tree compression and pruning.
//!
//! Compression runs two phases over the assembled tree, each seeded from the
//! nodes flagged as leaves when the phase starts:
//!
//! 1. **Low-branching collapse.** Walking up from a leaf, any non-root
//!    ancestor with fewer than `min_children` children is spliced out and the
//!    walk restarts from the leaf.
//! 2. **Redundant-name collapse.** Walking up from a leaf, a node whose short
//!    name overlaps its parent's short name is merged into the parent.
//!
//! Both walks use explicit worklists. Seeds removed by an earlier step are
//! skipped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use topictree_types::PruneMode;

use crate::tree::TopicTree;

/// Counters reported by [`TreeCompressor::compress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Nodes before compression
    pub nodes_before: usize,
    /// Nodes after compression
    pub nodes_after: usize,
    /// Ancestors spliced out in phase 1
    pub low_branching_collapsed: usize,
    /// Full phase 1 passes, including the final one that changed nothing
    pub low_branching_passes: usize,
    /// Children merged into a parent in phase 2
    pub redundant_merged: usize,
}

/// Display name of a label: the part before the first `separator`, or the
/// whole label when the separator does not occur.
pub fn short_name<'a>(label: &'a str, separator: &str) -> &'a str {
    if separator.is_empty() {
        return label;
    }
    label
        .split_once(separator)
        .map_or(label, |(head, _)| head)
}

/// Check if two labels are lexical variants: one short name contains the
/// other. Empty short names never match.
pub fn names_overlap(a: &str, b: &str, separator: &str) -> bool {
    let a = short_name(a, separator);
    let b = short_name(b, separator);
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Castanet compressor.
#[derive(Debug, Clone)]
pub struct TreeCompressor {
    min_children: usize,
    separator: String,
}

impl Default for TreeCompressor {
    fn default() -> Self {
        Self::new(2, ".")
    }
}

impl TreeCompressor {
    /// Create a compressor.
    pub fn new(min_children: usize, separator: impl Into<String>) -> Self {
        Self {
            min_children,
            separator: separator.into(),
        }
    }

    /// Run both phases.
    #[instrument(skip(self, tree), fields(min_children = self.min_children, nodes = tree.node_count()))]
    pub fn compress(&self, tree: &mut TopicTree) -> CompressionStats {
        let mut stats = CompressionStats {
            nodes_before: tree.node_count(),
            ..CompressionStats::default()
        };

        loop {
            stats.low_branching_passes += 1;
            let collapsed: usize = tree
                .leaves()
                .iter()
                .map(|leaf| self.collapse_low_branching(tree, leaf))
                .sum();
            stats.low_branching_collapsed += collapsed;
            if collapsed == 0 {
                break;
            }
        }

        stats.redundant_merged = tree
            .leaves()
            .iter()
            .map(|leaf| self.collapse_redundant_names(tree, leaf))
            .sum();

        stats.nodes_after = tree.node_count();
        info!(
            before = stats.nodes_before,
            after = stats.nodes_after,
            collapsed = stats.low_branching_collapsed,
            merged = stats.redundant_merged,
            "Compressed topic tree"
        );
        stats
    }

    /// Phase 1 from one seed. Returns the number of ancestors spliced out.
    pub fn collapse_low_branching(&self, tree: &mut TopicTree, seed: &str) -> usize {
        let mut collapsed = 0;

        'restart: loop {
            if !tree.contains(seed) {
                return collapsed;
            }

            let mut visited: HashSet<String> = HashSet::new();
            let mut pending = tree.predecessors(seed);
            pending.reverse();

            while let Some(parent) = pending.pop() {
                if !tree.contains(&parent) || !visited.insert(parent.clone()) {
                    continue;
                }

                let is_root = tree.in_degree(&parent) == 0;
                if tree.out_degree(&parent) < self.min_children && !is_root {
                    tree.splice_out(&parent);
                    collapsed += 1;
                    debug!(seed = %seed, collapsed = %parent, "Collapsed low-branching ancestor");
                    continue 'restart;
                }

                pending.extend(tree.predecessors(&parent).into_iter().rev());
            }

            return collapsed;
        }
    }

    /// Phase 2 from one seed. Returns the number of nodes merged away.
    pub fn collapse_redundant_names(&self, tree: &mut TopicTree, seed: &str) -> usize {
        let mut merged = 0;
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending = vec![seed.to_string()];

        while let Some(node) = pending.pop() {
            if !tree.contains(&node) || !visited.insert(node.clone()) {
                continue;
            }

            let parents = tree.predecessors(&node);
            for parent in &parents {
                if tree.contains(&node) && names_overlap(&node, parent, &self.separator) {
                    tree.merge_into(&node, parent);
                    merged += 1;
                    debug!(child = %node, parent = %parent, "Merged redundant child");
                }
            }
            pending.extend(parents.into_iter().rev());
        }

        merged
    }
}

/// Remove the named nodes. Absent labels are skipped.
///
/// In [`PruneMode::Discard`] the descendants of a pruned node keep their
/// other edges and may be left disconnected; in [`PruneMode::Reattach`] they
/// are connected to the pruned node's parents. Returns the number of nodes
/// removed.
#[instrument(skip(tree, labels))]
pub fn prune<S: AsRef<str>>(tree: &mut TopicTree, labels: &[S], mode: PruneMode) -> usize {
    let mut removed = 0;
    for label in labels {
        let label = label.as_ref();
        let done = match mode {
            PruneMode::Discard => tree.remove_node(label).is_some(),
            PruneMode::Reattach => tree.splice_out(label),
        };
        if done {
            removed += 1;
            debug!(label = %label, mode = %mode, "Pruned node");
        }
    }
    if removed > 0 {
        info!(removed, mode = %mode, "Pruned topic tree");
    }
    removed
}
