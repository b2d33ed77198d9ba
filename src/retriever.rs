use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::vector_db::VectorDB;
use tracing::{debug, info, warn};

/// Corpus index: one named collection built from a fixed document list.
pub struct Retriever {
    vector_db: VectorDB,
    embedder: Box<dyn Embedder>,
    collection_name: String,
}

impl Retriever {
    pub fn new(embedder: Box<dyn Embedder>, collection_name: impl Into<String>) -> Self {
        Retriever {
            vector_db: VectorDB::new(),
            embedder,
            collection_name: collection_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.vector_db
            .collection(&self.collection_name)
            .map_or(0, |collection| collection.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<String> {
        self.vector_db
            .collection(&self.collection_name)
            .map(|collection| collection.entries().iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Replaces the collection with exactly `documents`, ids "0".."N-1".
    ///
    /// The previous collection is dropped before the embedder is called, so a
    /// failed rebuild leaves an empty collection rather than stale entries.
    /// Embeddings are validated before anything is written. A rejected insert
    /// stops the build and leaves the collection partially populated.
    pub fn build(&mut self, documents: &[String]) -> Result<usize> {
        debug!(existing = ?self.vector_db.list_collections(), "replacing collection");
        let collection = self.vector_db.create_or_replace_collection(&self.collection_name);

        let embeddings = self.embedder.embed(documents)?;
        validate_embeddings(&embeddings, documents.len())?;

        for (i, (document, embedding)) in documents.iter().zip(embeddings).enumerate() {
            if let Err(e) = collection.insert(i.to_string(), document.clone(), embedding) {
                warn!(collection = %self.collection_name, error = %e, "error adding documents and embeddings");
                return Err(e);
            }
        }

        info!(collection = %self.collection_name, documents = documents.len(), "collection built");
        Ok(documents.len())
    }

    /// Text of the single entry closest to `query_text`.
    pub fn retrieve(&self, query_text: &str) -> Result<String> {
        self.retrieve_top(query_text, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmptyIndex(self.collection_name.clone()))
    }

    pub fn retrieve_top(&self, query_text: &str, top_k: usize) -> Result<Vec<String>> {
        let collection = match self.vector_db.collection(&self.collection_name) {
            Some(collection) if !collection.is_empty() => collection,
            _ => return Err(RagError::EmptyIndex(self.collection_name.clone())),
        };

        let query_embeddings = self.embedder.embed(&[query_text.to_string()])?;
        validate_embeddings(&query_embeddings, 1)?;

        Ok(collection
            .query(&query_embeddings[0], top_k)?
            .into_iter()
            .map(|entry| entry.content.clone())
            .collect())
    }
}

fn validate_embeddings(embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
    if embeddings.len() != expected {
        return Err(RagError::Embedding(format!(
            "got {} embeddings for {expected} texts",
            embeddings.len()
        )));
    }
    for (i, embedding) in embeddings.iter().enumerate() {
        if embedding.is_empty() {
            return Err(RagError::Embedding(format!("embedding {i} is empty")));
        }
        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(RagError::Embedding(format!("embedding {i} has a non-numeric element")));
        }
    }
    Ok(())
}
