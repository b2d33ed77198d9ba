use crate::error::{RagError, Result};
use ndarray::Array1;
use rustc_hash::FxHashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Entry {
    pub id: String,
    pub content: String,
    pub embedding: Array1<f32>,
}

/// A named set of entries sharing one embedding dimension.
#[derive(Debug, Default)]
pub struct Collection {
    name: String,
    entries: Vec<Entry>,
    dim: Option<usize>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Collection {
            name: name.into(),
            entries: Vec::new(),
            dim: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Rejects duplicate ids and embeddings whose dimension differs from
    /// the first entry's.
    pub fn insert(&mut self, id: String, content: String, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(RagError::IndexWrite(format!("entry '{id}' has an empty embedding")));
        }
        if let Some(dim) = self.dim {
            if embedding.len() != dim {
                return Err(RagError::IndexWrite(format!(
                    "entry '{id}' has dimension {}, collection '{}' expects {dim}",
                    embedding.len(),
                    self.name
                )));
            }
        }
        if self.entries.iter().any(|entry| entry.id == id) {
            return Err(RagError::IndexWrite(format!(
                "id '{id}' already exists in collection '{}'",
                self.name
            )));
        }

        self.dim = Some(embedding.len());
        self.entries.push(Entry {
            id,
            content,
            embedding: Array1::from(embedding),
        });
        Ok(())
    }

    /// Entries ranked by cosine similarity to `query`, best first.
    /// Ties keep insertion order, so the lowest id wins.
    ///
    /// A query that is empty, holds a non-finite value, or does not match the
    /// collection's dimension is rejected instead of ranked.
    pub fn query(&self, query: &[f32], top_k: usize) -> Result<Vec<&Entry>> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyIndex(self.name.clone()));
        }
        if query.is_empty() || query.iter().any(|value| !value.is_finite()) {
            return Err(RagError::Embedding(format!(
                "query for collection '{}' is empty or has a non-numeric element",
                self.name
            )));
        }
        if let Some(dim) = self.dim {
            if query.len() != dim {
                return Err(RagError::Embedding(format!(
                    "query has dimension {}, collection '{}' expects {dim}",
                    query.len(),
                    self.name
                )));
            }
        }

        let query = Array1::from(query.to_vec());
        let mut similarities: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, &query), entry))
            .collect();

        // stable sort
        similarities.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(collection = %self.name, best = similarities[0].0, "similarity search");

        Ok(similarities
            .into_iter()
            .take(top_k)
            .map(|(_, entry)| entry)
            .collect())
    }
}

/// In-process stand-in for a vector database client: collections by name.
#[derive(Debug, Default)]
pub struct VectorDB {
    collections: FxHashMap<String, Collection>,
}

impl VectorDB {
    pub fn new() -> Self {
        VectorDB {
            collections: FxHashMap::default(),
        }
    }

    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn delete_collection(&mut self, name: &str) -> bool {
        self.collections.remove(name).is_some()
    }

    /// Drops any collection with the same name and returns a fresh one.
    pub fn create_or_replace_collection(&mut self, name: &str) -> &mut Collection {
        if self.delete_collection(name) {
            debug!(collection = name, "dropped existing collection");
        }
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }
}

/// Cosine similarity in [-1, 1]. A zero vector scores 0.0 against anything,
/// so it only wins a ranking when every other entry scores at most 0.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let dot_product = a.dot(b);
    let norm_a = (a.dot(a)).sqrt();
    let norm_b = (b.dot(b)).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
