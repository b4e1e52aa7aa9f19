//! Local token-overlap corpus index
//!
//! The last link of the corpus chain. Documents are split into paragraph
//! chunks; a chunk scores the fraction of the query's content words it
//! contains. Cheap, dependency-free, and always available.

use super::{term_set, BackendError, CorpusSearch};
use async_trait::async_trait;
use sdk::types::Fragment;
use std::collections::HashSet;
use std::path::Path;

const MAX_CHUNK_CHARS: usize = 1200;

#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    terms: HashSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TokenOverlapIndex {
    chunks: Vec<Chunk>,
    vocabulary: HashSet<String>,
    documents: usize,
}

impl TokenOverlapIndex {
    pub fn from_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for doc in documents {
            index.add_document(doc.as_ref());
        }
        index
    }

    /// Index every `.txt` and `.md` file under `dir`. A missing directory
    /// yields an empty index.
    pub fn load_dir(dir: &Path) -> std::io::Result<Self> {
        let mut index = Self::default();
        if !dir.exists() {
            tracing::warn!("Corpus directory {:?} does not exist", dir);
            return Ok(index);
        }

        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_text = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "txt" | "md"))
                    .unwrap_or(false);
                if !is_text {
                    continue;
                }
                match std::fs::read_to_string(&path) {
                    Ok(text) => index.add_document(&text),
                    Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
                }
            }
        }

        tracing::info!(
            "Indexed {} documents ({} chunks) from {:?}",
            index.documents,
            index.chunks.len(),
            dir
        );
        Ok(index)
    }

    fn add_document(&mut self, text: &str) {
        let mut added = false;
        for chunk in split_chunks(text) {
            let terms = term_set(&chunk);
            if terms.is_empty() {
                continue;
            }
            self.vocabulary.extend(terms.iter().cloned());
            self.chunks.push(Chunk { text: chunk, terms });
            added = true;
        }
        if added {
            self.documents += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents
    }

    /// Whether `word` appears anywhere in the corpus (case-insensitive)
    pub fn mentions(&self, word: &str) -> bool {
        self.vocabulary.contains(&word.to_lowercase())
    }

    /// Score every chunk against `query`; `(score, chunk index)` best first
    fn rank(&self, query: &str) -> Vec<(f32, usize)> {
        let query_terms = term_set(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(i, chunk)| {
                let hits = query_terms.intersection(&chunk.terms).count();
                (hits > 0).then(|| (hits as f32 / query_terms.len() as f32, i))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }
}

/// Paragraphs, with long paragraphs cut at sentence boundaries
fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() <= MAX_CHUNK_CHARS {
            chunks.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        for sentence in paragraph.split_inclusive(['.', '!', '?']) {
            if !current.is_empty() && current.len() + sentence.len() > MAX_CHUNK_CHARS {
                chunks.push(current.trim().to_string());
                current.clear();
            }
            current.push_str(sentence);
        }
        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }
    }
    chunks
}

#[async_trait]
impl CorpusSearch for TokenOverlapIndex {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Fragment>, BackendError> {
        Ok(self
            .rank(query)
            .into_iter()
            .filter(|(score, _)| *score >= threshold)
            .take(top_k)
            .map(|(score, i)| Fragment::corpus(self.chunks[i].text.clone(), score))
            .collect())
    }
}
