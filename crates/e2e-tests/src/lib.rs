//! End-to-end test infrastructure for topictree.
//!
//! Provides a shared TestHarness over a temporary corpus directory plus
//! generators for synthetic taxonomies and term records.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use topictree_core::{StaticTaxonomy, Taxonomy, TopicTree};
use topictree_types::{TermRecord, TextTerms};

/// Small animal and artifact taxonomy shared by the E2E tests.
pub const ANIMAL_TAXONOMY: &str = r#"
[words]
dog = ["dog.n.01", "frump.n.01"]
hound = ["hound.n.01"]
fox = ["fox.n.01"]
cat = ["cat.n.01"]
lion = ["lion.n.01"]
ship = ["ship.n.01"]
boat = ["boat.n.01"]

[hypernyms]
"dog.n.01" = ["canine.n.02", "domestic_animal.n.01"]
"hound.n.01" = ["dog.n.01"]
"fox.n.01" = ["canine.n.02"]
"canine.n.02" = ["carnivore.n.01"]
"cat.n.01" = ["feline.n.01"]
"lion.n.01" = ["big_cat.n.01"]
"big_cat.n.01" = ["feline.n.01"]
"feline.n.01" = ["carnivore.n.01"]
"carnivore.n.01" = ["placental.n.01"]
"placental.n.01" = ["animal.n.01"]
"frump.n.01" = ["person.n.01"]
"ship.n.01" = ["vessel.n.02"]
"boat.n.01" = ["vessel.n.02"]
"vessel.n.02" = ["craft.n.02"]
"craft.n.02" = ["artifact.n.01"]
"#;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory with a `corpus/` subdirectory and a taxonomy file.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Directory of corpus texts
    pub corpus_dir: PathBuf,
    /// Path of the taxonomy file
    pub taxonomy_path: PathBuf,
}

impl TestHarness {
    /// Create a harness with an empty corpus and [`ANIMAL_TAXONOMY`].
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let corpus_dir = temp_dir.path().join("corpus");
        let taxonomy_path = temp_dir.path().join("taxonomy.toml");

        std::fs::create_dir_all(&corpus_dir).expect("Failed to create corpus dir");
        std::fs::write(&taxonomy_path, ANIMAL_TAXONOMY).expect("Failed to write taxonomy");

        Self {
            _temp_dir: temp_dir,
            corpus_dir,
            taxonomy_path,
        }
    }

    /// Write one text into the corpus as `<text_id>.txt`.
    pub fn write_text(&self, text_id: &str, content: &str) -> PathBuf {
        let path = self.corpus_dir.join(format!("{}.txt", text_id));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create text dir");
        }
        std::fs::write(&path, content).expect("Failed to write text");
        path
    }

    /// Path for an output file inside the temp directory.
    pub fn output_path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Load the harness taxonomy.
    pub fn taxonomy(&self) -> Arc<dyn Taxonomy> {
        Arc::new(StaticTaxonomy::load(&self.taxonomy_path).expect("Failed to load taxonomy"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a term record from `(text_id, [(term, count)])` pairs.
pub fn record_from(texts: &[(&str, Vec<(&str, u32)>)]) -> TermRecord {
    let texts: Vec<TextTerms> = texts
        .iter()
        .map(|(text_id, counts)| TextTerms::with_counts(*text_id, counts.iter().copied()))
        .collect();
    TermRecord::from_texts(&texts).expect("Failed to build term record")
}

/// Synthetic taxonomy together with the words it knows.
pub struct SyntheticTaxonomy {
    pub taxonomy: StaticTaxonomy,
    pub words: Vec<String>,
}

/// Generate a random forest-shaped taxonomy.
///
/// `roots` trees of the given `depth`, each node having between 1 and
/// `fanout` children. Every deepest sense gets a word; some inner senses do
/// too, so that a term can sit above another term.
pub fn random_taxonomy(rng: &mut StdRng, roots: usize, depth: usize, fanout: usize) -> SyntheticTaxonomy {
    let mut taxonomy = StaticTaxonomy::new();
    let mut words = Vec::new();
    let mut next_id = 0usize;
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    for r in 0..roots {
        queue.push_back((format!("root{}.n.01", r), 0));
    }

    while let Some((sense, level)) = queue.pop_front() {
        let is_deepest = level == depth;
        if is_deepest || (level > 0 && rng.random_range(0..4) == 0) {
            let word = format!("w{}", words.len());
            taxonomy.add_word(word.clone(), [sense.clone()]);
            words.push(word);
        }
        if is_deepest {
            continue;
        }

        for _ in 0..rng.random_range(1..=fanout.max(1)) {
            next_id += 1;
            let child = format!("s{}x.n.01", next_id);
            taxonomy.add_hypernyms(child.clone(), [sense.clone()]);
            queue.push_back((child, level + 1));
        }
    }

    SyntheticTaxonomy { taxonomy, words }
}

/// Generate a random term record over `words`.
pub fn random_record(
    rng: &mut StdRng,
    words: &[String],
    texts: usize,
    terms_per_text: usize,
) -> TermRecord {
    let mut record = TermRecord::new();
    for t in 0..texts {
        let mut text = TextTerms::new(format!("text{:03}", t));
        for _ in 0..terms_per_text {
            if words.is_empty() {
                break;
            }
            let word = &words[rng.random_range(0..words.len())];
            text.add_count(word.clone(), rng.random_range(1..10));
        }
        record.add_text(&text).expect("Text ids are unique");
    }
    record
}

/// Check that the tree has no directed cycle (Kahn's algorithm).
pub fn is_acyclic(tree: &TopicTree) -> bool {
    let mut in_degree: HashMap<String, usize> = tree
        .nodes()
        .into_iter()
        .map(|node| (node.label.clone(), tree.in_degree(&node.label)))
        .collect();
    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(label, _)| label.clone())
        .collect();

    let mut visited = 0;
    while let Some(label) = ready.pop() {
        visited += 1;
        for child in tree.successors(&label) {
            if let Some(degree) = in_degree.get_mut(&child) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(child);
                }
            }
        }
    }
    visited == tree.node_count()
}

/// Snapshot of a tree as sorted owned edges, for comparisons.
pub fn edge_list(tree: &TopicTree) -> Vec<(String, String)> {
    tree.edges()
        .into_iter()
        .map(|(parent, child)| (parent.to_string(), child.to_string()))
        .collect()
}

/// Label -> (count, texts) snapshot, for comparisons.
pub fn annotations(tree: &TopicTree) -> BTreeMap<String, (u32, Vec<String>)> {
    tree.nodes()
        .into_iter()
        .map(|node| {
            (
                node.label.clone(),
                (node.count, node.texts.iter().cloned().collect()),
            )
        })
        .collect()
}
