use anyhow::Result;
use async_trait::async_trait;

/// A point ready to be written into a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PointToUpsert {
    /// UUID string; writing an existing id replaces that point.
    pub id: String,
    pub vector: Vec<f32>,
    /// JSON object stored as the point payload.
    pub payload: serde_json::Value,
}

/// A search hit with its distance to the query (smaller is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub distance: f32,
    pub payload: serde_json::Value,
}

/// Exact-match restriction on a string payload field.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadFilter {
    pub key: String,
    pub value: String,
}

impl PayloadFilter {
    pub fn matches(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Creates the backing collection if it does not exist yet.
    async fn initialize_collection(&self) -> Result<()>;

    /// Inserts or replaces points by id.
    async fn upsert_points(&self, points: &[PointToUpsert]) -> Result<()>;

    /// Nearest neighbours of `query_vector`, ordered by ascending distance.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<PayloadFilter>,
    ) -> Result<Vec<ScoredRecord>>;

    async fn count(&self) -> Result<u64>;

    /// Drops the collection. Returns `false` when there was nothing to drop.
    async fn delete_collection(&self) -> Result<bool>;

    /// Vector dimension this collection accepts.
    fn dimension(&self) -> usize;

    fn collection_name(&self) -> String;
}
