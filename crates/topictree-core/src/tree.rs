//! The topic tree graph.
//!
//! Nodes are taxonomy labels, edges run from the more general label to the
//! more specific one. Chains sharing a prefix land on the same nodes by label
//! equality, so the structure is in general a forest of trees.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use topictree_types::TextId;

use crate::resolver::HypernymChain;

/// A node of the topic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNode {
    /// Taxonomy label (globally unique)
    pub label: String,
    /// Top of at least one inserted chain
    pub is_root: bool,
    /// Bottom (original term) of at least one inserted chain
    pub is_leaf: bool,
    /// Texts whose chains pass through this node
    pub texts: BTreeSet<TextId>,
    /// Number of chains passing through this node
    pub count: u32,
}

impl TopicNode {
    /// Create an unflagged, unannotated node.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            is_root: false,
            is_leaf: false,
            texts: BTreeSet::new(),
            count: 0,
        }
    }
}

/// Directed topic graph keyed by label.
#[derive(Debug, Clone, Default)]
pub struct TopicTree {
    graph: StableDiGraph<TopicNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TopicTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a sequence of chains.
    pub fn from_chains<'a, I>(chains: I) -> Self
    where
        I: IntoIterator<Item = &'a HypernymChain>,
    {
        let mut tree = Self::new();
        for chain in chains {
            tree.insert(chain);
        }
        tree
    }

    /// Insert a chain: add its missing nodes and edges, flag its first label
    /// as a root and its last label as a leaf.
    ///
    /// Flags are never cleared. An edge that would close a cycle is refused
    /// and logged.
    pub fn insert(&mut self, chain: &HypernymChain) {
        for label in chain.labels() {
            self.add_node(label);
        }
        for (parent, child) in chain.edges() {
            self.add_edge(parent, child);
        }

        if let Some(node) = self.node_mut(chain.root()) {
            node.is_root = true;
        }
        if let Some(node) = self.node_mut(chain.leaf()) {
            node.is_leaf = true;
        }
    }

    /// Insert a simple path of labels without touching the flags.
    pub fn add_path(&mut self, labels: &[&str]) {
        for label in labels {
            self.add_node(label);
        }
        for pair in labels.windows(2) {
            self.add_edge(pair[0], pair[1]);
        }
    }

    /// Add a node if absent; returns true if it was added.
    pub fn add_node(&mut self, label: &str) -> bool {
        if self.index.contains_key(label) {
            return false;
        }
        let idx = self.graph.add_node(TopicNode::new(label));
        self.index.insert(label.to_string(), idx);
        true
    }

    /// Add a `parent -> child` edge if both nodes exist and the edge is
    /// absent. Self-loops and edges closing a cycle are refused.
    ///
    /// Returns true if the edge was added.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.index.get(parent), self.index.get(child)) else {
            return false;
        };
        if self.graph.find_edge(from, to).is_some() {
            return false;
        }
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            warn!(parent = %parent, child = %child, "Refusing edge that would create a cycle");
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Remove a node and its incident edges. Absent labels are a no-op.
    ///
    /// Returns the removed node.
    pub fn remove_node(&mut self, label: &str) -> Option<TopicNode> {
        let idx = self.index.remove(label)?;
        self.graph.remove_node(idx)
    }

    /// Remove a node after connecting each of its children to each of its
    /// parents. Absent labels are a no-op.
    ///
    /// Returns true if the node was removed.
    pub fn splice_out(&mut self, label: &str) -> bool {
        if !self.contains(label) {
            return false;
        }
        let parents = self.predecessors(label);
        let children = self.successors(label);
        self.remove_node(label);

        for parent in &parents {
            for child in &children {
                self.add_edge(parent, child);
            }
        }
        debug!(label = %label, parents = parents.len(), children = children.len(), "Spliced out node");
        true
    }

    /// Remove `child` after moving its children under `parent`.
    ///
    /// Other parents of `child` lose their edge to it. Absent labels are a
    /// no-op; returns true if `child` was removed.
    pub fn merge_into(&mut self, child: &str, parent: &str) -> bool {
        if child == parent || !self.contains(child) || !self.contains(parent) {
            return false;
        }
        let grandchildren = self.successors(child);
        self.remove_node(child);

        for grandchild in &grandchildren {
            self.add_edge(parent, grandchild);
        }
        debug!(child = %child, parent = %parent, "Merged node into parent");
        true
    }

    /// Check if `label` is currently a node.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Check if the `parent -> child` edge exists.
    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        match (self.index.get(parent), self.index.get(child)) {
            (Some(&from), Some(&to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// Look up a node by label.
    pub fn node(&self, label: &str) -> Option<&TopicNode> {
        self.index
            .get(label)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Look up a node by label for mutation.
    pub fn node_mut(&mut self, label: &str) -> Option<&mut TopicNode> {
        let idx = *self.index.get(label)?;
        self.graph.node_weight_mut(idx)
    }

    /// All nodes, in label order.
    pub fn nodes(&self) -> Vec<&TopicNode> {
        let mut nodes: Vec<&TopicNode> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.label.cmp(&b.label));
        nodes
    }

    /// All nodes for mutation, in no particular order.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut TopicNode> {
        self.graph.node_weights_mut()
    }

    /// All `(parent, child)` edges, sorted.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_references()
            .filter_map(|edge| {
                let parent = self.graph.node_weight(edge.source())?;
                let child = self.graph.node_weight(edge.target())?;
                Some((parent.label.as_str(), child.label.as_str()))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Labels with an edge into `label`, sorted.
    pub fn predecessors(&self, label: &str) -> Vec<String> {
        self.neighbors(label, Direction::Incoming)
    }

    /// Labels `label` has an edge to, sorted.
    pub fn successors(&self, label: &str) -> Vec<String> {
        self.neighbors(label, Direction::Outgoing)
    }

    /// Number of incoming edges (0 for absent labels).
    pub fn in_degree(&self, label: &str) -> usize {
        self.degree(label, Direction::Incoming)
    }

    /// Number of outgoing edges (0 for absent labels).
    pub fn out_degree(&self, label: &str) -> usize {
        self.degree(label, Direction::Outgoing)
    }

    /// Labels of nodes flagged as leaves, sorted.
    pub fn leaves(&self) -> Vec<String> {
        self.labels_where(|node| node.is_leaf)
    }

    /// Labels of nodes flagged as roots, sorted.
    pub fn roots(&self) -> Vec<String> {
        self.labels_where(|node| node.is_root)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn neighbors(&self, label: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(label) else {
            return Vec::new();
        };
        let mut labels: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).map(|node| node.label.clone()))
            .collect();
        labels.sort_unstable();
        labels
    }

    fn degree(&self, label: &str, direction: Direction) -> usize {
        self.index.get(label).map_or(0, |&idx| {
            self.graph.neighbors_directed(idx, direction).count()
        })
    }

    fn labels_where(&self, predicate: impl Fn(&TopicNode) -> bool) -> Vec<String> {
        let mut labels: Vec<String> = self
            .graph
            .node_weights()
            .filter(|node| predicate(node))
            .map(|node| node.label.clone())
            .collect();
        labels.sort_unstable();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(labels: &[&str]) -> HypernymChain {
        HypernymChain::new(labels.iter().copied()).unwrap()
    }

    #[test]
    fn test_insert_flags_and_edges() {
        let mut tree = TopicTree::new();
        let c = chain(&["animal.n.01", "canine.n.02", "dog.n.01", "dog"]);
        tree.insert(&c);

        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.edge_count(), 3);
        assert!(tree.node("animal.n.01").unwrap().is_root);
        assert!(tree.node("dog").unwrap().is_leaf);
        assert!(!tree.node("canine.n.02").unwrap().is_root);
        assert!(!tree.node("canine.n.02").unwrap().is_leaf);
        for (parent, child) in c.edges() {
            assert!(tree.has_edge(parent, child));
        }
    }

    #[test]
    fn test_shared_prefix_merges_nodes() {
        let tree = TopicTree::from_chains(&[
            chain(&["animal", "canine", "dog"]),
            chain(&["animal", "canine", "fox"]),
        ]);

        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.edge_count(), 3);
        assert_eq!(tree.successors("canine"), vec!["dog", "fox"]);
        assert_eq!(tree.out_degree("canine"), 2);
        assert_eq!(tree.roots(), vec!["animal"]);
        assert_eq!(tree.leaves(), vec!["dog", "fox"]);
    }

    #[test]
    fn test_edges_sorted_and_skip_removed_nodes() {
        let mut tree = TopicTree::new();
        tree.add_path(&["b", "d"]);
        tree.add_path(&["a", "c"]);
        tree.add_path(&["a", "b"]);
        assert_eq!(tree.edges(), vec![("a", "b"), ("a", "c"), ("b", "d")]);

        tree.remove_node("b");
        assert_eq!(tree.edges(), vec![("a", "c")]);
    }

    #[test]
    fn test_flags_are_monotonic() {
        let mut tree = TopicTree::new();
        tree.insert(&chain(&["animal", "dog"]));
        tree.insert(&chain(&["dog", "puppy"]));

        let dog = tree.node("dog").unwrap();
        assert!(dog.is_leaf);
        assert!(dog.is_root);
        assert!(tree.node("animal").unwrap().is_root);
    }

    #[test]
    fn test_single_label_chain() {
        let mut tree = TopicTree::new();
        tree.insert(&chain(&["unicorn"]));

        let node = tree.node("unicorn").unwrap();
        assert!(node.is_root && node.is_leaf);
        assert_eq!(tree.edge_count(), 0);
    }

    #[test]
    fn test_forest_of_roots() {
        let tree = TopicTree::from_chains(&[chain(&["animal", "dog"]), chain(&["artifact", "ship"])]);
        assert_eq!(tree.roots(), vec!["animal", "artifact"]);
    }

    #[test]
    fn test_cycle_refused() {
        let mut tree = TopicTree::new();
        tree.add_path(&["a", "b", "c"]);

        assert!(!tree.add_edge("c", "a"));
        assert!(!tree.add_edge("b", "b"));
        assert_eq!(tree.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_edge_ignored() {
        let mut tree = TopicTree::new();
        tree.add_path(&["a", "b"]);
        assert!(!tree.add_edge("a", "b"));
        assert!(!tree.add_edge("a", "missing"));
        assert_eq!(tree.edge_count(), 1);
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut tree = TopicTree::new();
        tree.add_path(&["a", "b", "c"]);

        let removed = tree.remove_node("b").unwrap();
        assert_eq!(removed.label, "b");
        assert!(!tree.contains("b"));
        assert_eq!(tree.edge_count(), 0);
        assert!(tree.remove_node("b").is_none());
    }

    #[test]
    fn test_splice_out_reconnects_all_parents() {
        let mut tree = TopicTree::new();
        tree.add_path(&["p1", "mid", "c1"]);
        tree.add_path(&["p2", "mid", "c2"]);

        assert!(tree.splice_out("mid"));
        assert_eq!(
            tree.edges(),
            vec![("p1", "c1"), ("p1", "c2"), ("p2", "c1"), ("p2", "c2")]
        );
        assert!(!tree.splice_out("mid"));
    }

    #[test]
    fn test_merge_into_moves_children() {
        let mut tree = TopicTree::new();
        tree.add_path(&["dog.n.01", "dog", "puppy"]);

        assert!(tree.merge_into("dog", "dog.n.01"));
        assert_eq!(tree.edges(), vec![("dog.n.01", "puppy")]);
        assert!(!tree.merge_into("dog", "dog.n.01"));
    }

    #[test]
    fn test_degree_of_absent_label() {
        let tree = TopicTree::new();
        assert_eq!(tree.in_degree("x"), 0);
        assert_eq!(tree.out_degree("x"), 0);
        assert!(tree.predecessors("x").is_empty());
        assert!(tree.is_empty());
    }
}
