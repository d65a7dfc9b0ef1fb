//! Qdrant implementation of the vector store handle.
//!
//! Partitions are modeled as an indexed `partition` payload field scoped by
//! filter, so one collection can hold several logical groupings. Inserted
//! rows are buffered in the handle and written by [`flush`](crate::VectorStore::flush)
//! with `wait(true)`; a crash loses at most the rows buffered since the
//! last flush.

use std::sync::Mutex;

use async_trait::async_trait;
use papyrus_core::VectorStoreConfig;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, HnswConfigDiffBuilder, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{ChunkRow, Result, ScoredHit, VectorError, VectorStore};

/// Qdrant vector store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
    ef_construct: usize,
    buffer: Mutex<Vec<PointStruct>>,
}

impl QdrantStore {
    /// Open a new connection from config
    pub fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .build()
            .map_err(|e| VectorError::StoreError(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.dimension,
            ef_construct: config.index_clusters,
            buffer: Mutex::new(Vec::new()),
        })
    }

    fn payload_map(row: &ChunkRow) -> std::collections::HashMap<String, qdrant_client::qdrant::Value> {
        serde_json::to_value(row)
            .unwrap_or_default()
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.into()))
            .collect()
    }

    fn scoped_filter(partitions: &[String], extra: Option<(String, String)>) -> Option<Filter> {
        let mut filter = Filter::default();

        match partitions {
            [] => {}
            [single] => filter
                .must
                .push(Condition::matches("partition", single.clone())),
            many => {
                filter.should = many
                    .iter()
                    .map(|p| Condition::matches("partition", p.clone()))
                    .collect();
            }
        }

        if let Some((field, value)) = extra {
            filter.must.push(Condition::matches(field, value));
        }

        if filter.must.is_empty() && filter.should.is_empty() {
            None
        } else {
            Some(filter)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorError::StoreError(format!("Failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(
                            self.dimension as u64,
                            Distance::Dot,
                        ))
                        .hnsw_config(
                            HnswConfigDiffBuilder::default().ef_construct(self.ef_construct as u64),
                        ),
                )
                .await
                .map_err(|e| {
                    VectorError::StoreError(format!("Failed to create collection: {e}"))
                })?;

            info!(collection = %self.collection, dimension = self.dimension, "created collection");
        }

        Ok(())
    }

    async fn ensure_partition(&self, partition: &str) -> Result<()> {
        // Partitions are payload values; an index on the field keeps the
        // scoped searches cheap. Creating the same index twice is a no-op
        // server side.
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                "partition",
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| VectorError::StoreError(format!("Failed to index partition field: {e}")))?;

        debug!(partition, "partition ready");
        Ok(())
    }

    async fn insert(&self, row: ChunkRow) -> Result<()> {
        if row.content_vector.len() != self.dimension {
            return Err(VectorError::StoreError(format!(
                "Vector dimension {} does not match collection schema {}",
                row.content_vector.len(),
                self.dimension
            )));
        }

        let point = PointStruct::new(
            Uuid::new_v4().to_string(),
            row.content_vector.clone(),
            Self::payload_map(&row),
        );

        self.buffer
            .lock()
            .map_err(|_| VectorError::StoreError("Insert buffer poisoned".to_string()))?
            .push(point);

        Ok(())
    }

    async fn flush(&self) -> Result<usize> {
        let points = {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|_| VectorError::StoreError("Insert buffer poisoned".to_string()))?;
            std::mem::take(&mut *buffer)
        };

        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorError::StoreError(format!("Failed to upsert vectors: {e}")))?;

        debug!(count, collection = %self.collection, "flushed rows");
        Ok(count)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        partitions: &[String],
        limit: usize,
        filter: Option<(String, String)>,
    ) -> Result<Vec<ScoredHit>> {
        let mut request = SearchPointsBuilder::new(
            &self.collection,
            query_vector.to_vec(),
            limit as u64,
        )
        .with_payload(true);

        if let Some(filter) = Self::scoped_filter(partitions, filter) {
            request = request.filter(filter);
        }

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorError::SearchError(format!("Vector search failed: {e}")))?;

        let text = |payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
                    key: &str| {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default()
        };

        let hits = results
            .result
            .into_iter()
            .map(|point| ScoredHit {
                document_id: text(&point.payload, "documentId"),
                title: text(&point.payload, "title"),
                date: text(&point.payload, "date"),
                authors: text(&point.payload, "authors"),
                abstract_text: text(&point.payload, "abstract"),
                keywords: text(&point.payload, "keywords"),
                category: text(&point.payload, "category"),
                content: text(&point.payload, "content"),
                score: point.score,
            })
            .collect();

        Ok(hits)
    }

    async fn candidate_point_ids(&self, document_id: &str) -> Result<Vec<String>> {
        use qdrant_client::qdrant::point_id::PointIdOptions;

        let filter = Filter::must([Condition::matches(
            "documentId",
            document_id.to_string(),
        )]);

        let mut ids = Vec::new();
        let mut offset = None;

        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .filter(filter.clone())
                .limit(256)
                .with_payload(false);
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(|e| VectorError::StoreError(format!("Failed to scroll points: {e}")))?;

            for point in page.result {
                match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Uuid(uuid)) => ids.push(uuid),
                    Some(PointIdOptions::Num(num)) => ids.push(num.to_string()),
                    None => {}
                }
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_filter_is_none_without_conditions() {
        assert!(QdrantStore::scoped_filter(&[], None).is_none());
    }

    #[test]
    fn scoped_filter_single_partition_is_a_must() {
        let filter = QdrantStore::scoped_filter(&["papers".to_string()], None).unwrap();
        assert_eq!(filter.must.len(), 1);
        assert!(filter.should.is_empty());
    }

    #[test]
    fn scoped_filter_many_partitions_are_shoulds() {
        let partitions = vec!["papers".to_string(), "notes".to_string()];
        let filter = QdrantStore::scoped_filter(&partitions, None).unwrap();
        assert_eq!(filter.should.len(), 2);
    }

    #[test]
    fn scoped_filter_extra_condition_is_a_must() {
        let filter = QdrantStore::scoped_filter(
            &["papers".to_string()],
            Some(("category".to_string(), "gravity".to_string())),
        )
        .unwrap();
        assert_eq!(filter.must.len(), 2);
    }
}
