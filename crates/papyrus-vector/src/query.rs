//! Semantic query adapter.
//!
//! Embeds a free-text query with the same model used at ingestion time,
//! runs the similarity search, and groups chunk-level hits into one entry
//! per logical document.

use std::collections::HashMap;

use tracing::debug;

use crate::{EmbeddingClient, Result, ScoredHit, VectorStore};

/// One logical document assembled from its matching chunks.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GroupedDocument {
    pub document_id: String,
    pub title: String,
    pub date: String,
    pub authors: String,
    pub abstract_text: String,
    pub keywords: String,
    pub category: String,

    /// Every matching chunk, in hit order
    pub contents: Vec<String>,

    /// Best score over the document's hits
    pub score: f32,
}

/// Embed `query` and search the given partitions, returning chunk hits
/// ordered by descending similarity.
pub async fn search_documents(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingClient,
    query: &str,
    partitions: &[String],
    limit: usize,
    filter: Option<(String, String)>,
) -> Result<Vec<ScoredHit>> {
    let query_vector = embedder.embed(query).await?;
    let mut hits = store.search(&query_vector, partitions, limit, filter).await?;

    // The store returns hits ranked already; sort defensively so callers
    // can rely on descending order regardless of backend.
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    debug!(hits = hits.len(), query, "similarity search finished");
    Ok(hits)
}

/// Group chunk-level hits by document id.
///
/// Produces exactly one entry per distinct id. Metadata comes from the
/// first-seen hit, contents accumulate in hit order, and the entry keeps
/// the maximum score over its hits. Entry order follows first appearance,
/// which for descending input is descending best-score order.
pub fn group_by_document(hits: Vec<ScoredHit>) -> Vec<GroupedDocument> {
    let mut grouped: Vec<GroupedDocument> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        match index.get(&hit.document_id) {
            Some(&at) => {
                let entry = &mut grouped[at];
                entry.contents.push(hit.content);
                if hit.score > entry.score {
                    entry.score = hit.score;
                }
            }
            None => {
                index.insert(hit.document_id.clone(), grouped.len());
                grouped.push(GroupedDocument {
                    document_id: hit.document_id,
                    title: hit.title,
                    date: hit.date,
                    authors: hit.authors,
                    abstract_text: hit.abstract_text,
                    keywords: hit.keywords,
                    category: hit.category,
                    contents: vec![hit.content],
                    score: hit.score,
                });
            }
        }
    }

    grouped
}
