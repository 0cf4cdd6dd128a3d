//! Per-node occurrence statistics.

use tracing::{debug, instrument};

use crate::resolver::ChainsByText;
use crate::tree::TopicTree;

/// Record which texts reach each node and how many chains pass through it.
///
/// Previous annotations are cleared first. Chain labels that are no longer in
/// the tree (collapsed, merged or pruned) are skipped. A text is stored once
/// per node, but `count` grows by one for every chain, so `count` can exceed
/// the number of texts.
#[instrument(skip_all, fields(texts = chains.len()))]
pub fn annotate(tree: &mut TopicTree, chains: &ChainsByText) {
    for node in tree.nodes_mut() {
        node.texts.clear();
        node.count = 0;
    }

    let mut visits = 0usize;
    for (text_id, text_chains) in chains {
        for chain in text_chains.values() {
            for label in chain.labels() {
                if let Some(node) = tree.node_mut(label) {
                    node.texts.insert(text_id.clone());
                    node.count += 1;
                    visits += 1;
                }
            }
        }
    }

    debug!(visits, "Annotated topic tree");
}
