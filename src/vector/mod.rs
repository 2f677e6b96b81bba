/// Vector index module
///
/// Stores fixed-dimension float32 embeddings as hashes under the `vectors`
/// namespace and answers cosine KNN queries through the store's search index.

mod codec;


use crate::cache::{KeyNamespacer, VECTOR_NAMESPACE};
use crate::config::VectorIndexConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{CacheBackend, VectorIndexSchema, METADATA_FIELD, VECTOR_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use codec::{cosine_similarity, decode_vector, encode_vector};

/// A stored vector with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Item key (without prefix or namespace)
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: Option<Value>,
}

/// One similarity search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Item key (without prefix or namespace)
    pub key: String,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub metadata: Option<Value>,
}

/// Approximate-nearest-neighbor index over the shared store
pub struct VectorIndex {
    backend: Arc<dyn CacheBackend>,
    keys: KeyNamespacer,
    schema: VectorIndexSchema,
}

impl VectorIndex {
    /// Build the index handle and make sure the search index exists.
    /// No vector operation is possible until this has succeeded.
    pub async fn new(
        backend: Arc<dyn CacheBackend>,
        keys: KeyNamespacer,
        config: &VectorIndexConfig,
    ) -> StoreResult<Self> {
        if config.dimension == 0 {
            return Err(StoreError::Config("Vector dimension must be greater than 0".to_string()));
        }

        let schema = VectorIndexSchema {
            name: config.index_name.clone(),
            key_prefix: keys.full_key("", Some(VECTOR_NAMESPACE))?,
            dimension: config.dimension,
        };

        let index = VectorIndex { backend, keys, schema };
        index.initialize().await.inspect_err(|e| {
            error!(index = %index.schema.name, "Failed to initialize vector index: {}", e)
        })?;
        Ok(index)
    }

    /// Create the search index unless it already exists
    pub async fn initialize(&self) -> StoreResult<()> {
        let name = &self.schema.name;

        if self.backend.index_exists(name).await.map_err(into_index_error)? {
            info!("Vector index {} already exists", name);
            return Ok(());
        }

        match self.backend.create_vector_index(&self.schema).await {
            Ok(()) => {
                info!(
                    "Created vector index {} (dim {}, prefix {})",
                    name, self.schema.dimension, self.schema.key_prefix
                );
                Ok(())
            }
            // Another process may have created it between the check and the create
            Err(e) => match self.backend.index_exists(name).await {
                Ok(true) => {
                    warn!("Vector index {} appeared during creation: {}", name, e);
                    Ok(())
                }
                _ => Err(into_index_error(e)),
            },
        }
    }

    pub fn dimension(&self) -> usize {
        self.schema.dimension
    }

    pub fn index_name(&self) -> &str {
        &self.schema.name
    }

    /// Insert or replace the vector and metadata stored under `key`
    pub async fn store_vector(&self, key: &str, vector: &[f32], metadata: Option<&Value>) -> StoreResult<()> {
        self.check_vector(vector)?;

        let full_key = self.keys.full_key(key, Some(VECTOR_NAMESPACE))?;
        let fields = vec![
            (VECTOR_FIELD.to_string(), encode_vector(vector)),
            (METADATA_FIELD.to_string(), serde_json::to_vec(&metadata)?),
        ];

        debug!("Storing vector for key: {} (dimensions: {})", key, vector.len());

        self.backend
            .hset(&full_key, fields)
            .await
            .inspect_err(|e| error!(key = %full_key, "Failed to store vector: {}", e))?;
        Ok(())
    }

    /// Exact-key lookup
    pub async fn get_vector(&self, key: &str) -> StoreResult<Option<VectorRecord>> {
        let full_key = self.keys.full_key(key, Some(VECTOR_NAMESPACE))?;
        let fields = self.backend
            .hgetall(&full_key)
            .await
            .inspect_err(|e| error!(key = %full_key, "Failed to read vector: {}", e))?;

        let Some(raw_vector) = fields.get(VECTOR_FIELD) else {
            return Ok(None);
        };

        Ok(Some(VectorRecord {
            key: key.to_string(),
            vector: decode_vector(raw_vector)?,
            metadata: match fields.get(METADATA_FIELD) {
                Some(raw) => serde_json::from_slice(raw)?,
                None => None,
            },
        }))
    }

    /// Up to `limit` records with similarity `>= score_threshold`, best first
    pub async fn search_similar_vectors(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> StoreResult<Vec<VectorMatch>> {
        self.check_vector(query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Performing vector search with limit: {}", limit);

        let hits = self.backend
            .knn_search(&self.schema.name, &encode_vector(query), limit)
            .await
            .inspect_err(|e| error!(index = %self.schema.name, "Vector search failed: {}", e))?;

        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            // the index reports cosine distance
            let score = 1.0 - hit.distance;
            if score < score_threshold {
                continue;
            }

            let metadata = match hit.metadata.as_deref() {
                Some(raw) => serde_json::from_str(raw)?,
                None => None,
            };

            let key = self.keys
                .strip(&hit.key, Some(VECTOR_NAMESPACE))
                .unwrap_or(&hit.key)
                .to_string();

            matches.push(VectorMatch { key, score, metadata });
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);

        debug!("Vector search returned {} matches above {}", matches.len(), score_threshold);
        Ok(matches)
    }

    /// Replace only the metadata of an existing record.
    /// Returns false, writing nothing, when the record does not exist.
    pub async fn update_vector_metadata(&self, key: &str, metadata: &Value) -> StoreResult<bool> {
        let full_key = self.keys.full_key(key, Some(VECTOR_NAMESPACE))?;

        // existence check and write are one command, so a concurrent delete
        // cannot leave behind a hash without a vector
        let updated = self.backend
            .hset_existing(&full_key, vec![(METADATA_FIELD.to_string(), serde_json::to_vec(metadata)?)])
            .await
            .inspect_err(|e| error!(key = %full_key, "Failed to update vector metadata: {}", e))?;

        if !updated {
            debug!("No vector stored for key: {}, metadata not updated", key);
        }
        Ok(updated)
    }

    /// Remove a record; deleting an absent key is not an error
    pub async fn delete_vector(&self, key: &str) -> StoreResult<()> {
        let full_key = self.keys.full_key(key, Some(VECTOR_NAMESPACE))?;
        let deleted = self.backend
            .del(vec![full_key.clone()])
            .await
            .inspect_err(|e| error!(key = %full_key, "Failed to delete vector: {}", e))?;

        debug!("Deleted vector for key: {} (existed: {})", key, deleted > 0);
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> StoreResult<()> {
        if vector.len() != self.schema.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.schema.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(StoreError::InvalidArgument("Vector contains NaN or infinite values".to_string()));
        }
        Ok(())
    }
}

fn into_index_error(e: StoreError) -> StoreError {
    match e {
        StoreError::VectorIndex(_) => e,
        other => StoreError::VectorIndex(other.to_string()),
    }
}
