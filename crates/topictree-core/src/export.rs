//! Topic tree serialization.
//!
//! Two formats are written:
//! - node-link JSON (`directed`, `multigraph`, `graph`, `nodes`, `links`),
//!   readable by common graph libraries;
//! - Graphviz DOT with boxed, filled nodes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::tree::{TopicNode, TopicTree};

/// Node entry of the node-link document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkNode {
    /// Node label
    pub id: String,
    /// Attributes, written inline next to `id`
    #[serde(flatten)]
    pub node: NodeAttributes,
}

/// Annotated attributes of an exported node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// First label of some hypernym chain
    pub is_root: bool,
    /// Last label of some hypernym chain (a ranked term)
    pub is_leaf: bool,
    /// Texts whose chains pass through the node, sorted
    pub texts: Vec<String>,
    /// Number of chains passing through the node
    pub count: u32,
}

impl From<&TopicNode> for NodeLinkNode {
    fn from(node: &TopicNode) -> Self {
        Self {
            id: node.label.clone(),
            node: NodeAttributes {
                is_root: node.is_root,
                is_leaf: node.is_leaf,
                texts: node.texts.iter().cloned().collect(),
                count: node.count,
            },
        }
    }
}

/// Edge entry of the node-link document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkEdge {
    /// Label of the more general node
    pub source: String,
    /// Label of the more specific node
    pub target: String,
}

/// Node-link graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    /// Always `true`, edges run general to specific
    pub directed: bool,
    /// Always `false`, at most one edge per node pair
    pub multigraph: bool,
    /// Graph-level attributes (empty)
    pub graph: BTreeMap<String, serde_json::Value>,
    /// Nodes sorted by label
    pub nodes: Vec<NodeLinkNode>,
    /// Edges sorted by `(source, target)`
    pub links: Vec<NodeLinkEdge>,
}

impl NodeLinkGraph {
    /// Snapshot a tree. Nodes and links are sorted by label.
    pub fn from_tree(tree: &TopicTree) -> Self {
        Self {
            directed: true,
            multigraph: false,
            graph: BTreeMap::new(),
            nodes: tree.nodes().into_iter().map(NodeLinkNode::from).collect(),
            links: tree
                .edges()
                .into_iter()
                .map(|(source, target)| NodeLinkEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
        }
    }
}

/// Serialize a tree as pretty-printed node-link JSON.
pub fn to_node_link_json(tree: &TopicTree) -> Result<String, TreeError> {
    Ok(serde_json::to_string_pretty(&NodeLinkGraph::from_tree(tree))?)
}

/// Render a tree as a Graphviz DOT digraph.
pub fn to_dot(tree: &TopicTree) -> String {
    let mut out = String::from("digraph topictree {\n");
    out.push_str("    node [shape=box, style=filled, fillcolor=lemonchiffon];\n");

    for node in tree.nodes() {
        let _ = writeln!(
            out,
            "    \"{}\" [count={}, texts={}];",
            escape(&node.label),
            node.count,
            node.texts.len()
        );
    }
    for (parent, child) in tree.edges() {
        let _ = writeln!(out, "    \"{}\" -> \"{}\";", escape(parent), escape(child));
    }

    out.push_str("}\n");
    out
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
