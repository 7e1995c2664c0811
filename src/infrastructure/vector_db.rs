use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;

pub use qdrant_client; // Re-export for tests and callers building their own client
use self::qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind as QdrantValueKind, vectors_config::Config as VectorsConfigKind,
    CollectionInfo, Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParams,
    VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};

use crate::config::Metric;
use crate::domain::errors::LibraryError;
use crate::domain::vector_repository::{PayloadFilter, PointToUpsert, ScoredRecord, VectorRepository};

impl From<Metric> for Distance {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Cosine => Distance::Cosine,
            Metric::Euclid => Distance::Euclid,
            Metric::Dot => Distance::Dot,
        }
    }
}

/// Converts a Qdrant score into a distance where smaller means closer.
pub fn score_to_distance(metric: Metric, score: f32) -> f32 {
    match metric {
        Metric::Cosine => 1.0 - score,
        Metric::Euclid => score,
        Metric::Dot => -score,
    }
}

/// One Qdrant collection.
pub struct VectorDb {
    client: Qdrant,
    collection_name: String,
    vector_size: usize,
    metric: Metric,
}

impl VectorDb {
    /// # Arguments
    ///
    /// * `client` - A connected Qdrant client.
    /// * `collection_name` - The collection this instance reads and writes.
    /// * `vector_size` - Dimension of the vectors stored in the collection.
    /// * `metric` - Distance metric used when the collection is created.
    pub fn new(client: Qdrant, collection_name: String, vector_size: usize, metric: Metric) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if vector_size == 0 {
            return Err(anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self {
            client,
            collection_name,
            vector_size,
            metric,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.vector_size {
            return Err(LibraryError::DimensionMismatch {
                collection: self.collection_name.clone(),
                expected: self.vector_size,
                actual,
            }
            .into());
        }
        Ok(())
    }

    async fn create_collection_internal(&self) -> Result<()> {
        log::info!(
            "Creating collection '{}' with size {} and distance {:?}...",
            self.collection_name,
            self.vector_size,
            self.metric
        );
        let distance: Distance = self.metric.into();
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(self.vector_size as u64, distance));

        self.client
            .create_collection(create_builder)
            .await
            .with_context(|| format!("Failed to create collection '{}'", self.collection_name))?;
        log::info!("Successfully created collection '{}'.", self.collection_name);
        Ok(())
    }

    /// Rejects an existing collection whose vector size or distance differs from ours.
    fn check_existing_params(&self, params: &VectorParams) -> Result<()> {
        self.check_dimension(params.size as usize)?;
        let expected: Distance = self.metric.into();
        if params.distance != expected as i32 {
            let actual = Distance::try_from(params.distance)
                .map(|d| format!("{:?}", d))
                .unwrap_or_else(|_| params.distance.to_string());
            return Err(LibraryError::MetricMismatch {
                collection: self.collection_name.clone(),
                expected: format!("{:?}", expected),
                actual,
            }
            .into());
        }
        Ok(())
    }

    fn to_point(&self, point: &PointToUpsert) -> Result<PointStruct> {
        self.check_dimension(point.vector.len())?;
        let payload = Payload::try_from(point.payload.clone())
            .map_err(|e| anyhow!("Payload for point {} is not a JSON object: {}", point.id, e))?;
        Ok(PointStruct::new(point.id.clone(), point.vector.clone(), payload))
    }
}

/// Vector parameters of a collection with a single unnamed vector.
fn single_vector_params(info: CollectionInfo) -> Option<VectorParams> {
    match info.config?.params?.vectors_config?.config? {
        VectorsConfigKind::Params(params) => Some(params),
        VectorsConfigKind::ParamsMap(_) => None,
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn qdrant_value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(QdrantValueKind::NullValue(_)) | None => serde_json::Value::Null,
        Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantValueKind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(QdrantValueKind::StructValue(s)) => qdrant_payload_to_json(s.fields),
    }
}

/// Converts a Qdrant payload map back into a JSON object.
pub fn qdrant_payload_to_json(payload: HashMap<String, QdrantValue>) -> serde_json::Value {
    let map = payload
        .into_iter()
        .map(|(key, value)| (key, qdrant_value_to_json(value)))
        .collect();
    serde_json::Value::Object(map)
}

#[async_trait]
impl VectorRepository for VectorDb {
    async fn initialize_collection(&self) -> Result<()> {
        log::info!("Checking if collection '{}' exists...", self.collection_name);
        let exists = self
            .client
            .collection_exists(self.collection_name.as_str())
            .await
            .with_context(|| format!("Failed to query collection '{}'", self.collection_name))?;
        if exists {
            log::info!("Collection '{}' already exists.", self.collection_name);
            let info = self
                .client
                .collection_info(self.collection_name.as_str())
                .await
                .with_context(|| format!("Failed to read collection '{}'", self.collection_name))?;
            match info.result.and_then(single_vector_params) {
                Some(params) => self.check_existing_params(&params)?,
                None => log::warn!(
                    "Collection '{}' has no single vector config; skipping parameter check.",
                    self.collection_name
                ),
            }
            return Ok(());
        }
        self.create_collection_internal().await
    }

    async fn upsert_points(&self, points: &[PointToUpsert]) -> Result<()> {
        if points.is_empty() {
            log::info!("No points provided for upsert.");
            return Ok(());
        }

        let qdrant_points = points
            .iter()
            .map(|p| self.to_point(p))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Upserting {} points into collection '{}'...",
            qdrant_points.len(),
            self.collection_name
        );
        let response = self
            .client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.clone(), qdrant_points).wait(true))
            .await
            .with_context(|| format!("Qdrant upsert into '{}' failed", self.collection_name))?;
        log::debug!("Upsert response: {:?}", response);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<PayloadFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        self.check_dimension(query_vector.len())?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        log::info!("Searching in collection '{}' with limit {}...", self.collection_name, limit);
        let mut request = SearchPointsBuilder::new(self.collection_name.clone(), query_vector, limit as u64)
            .with_payload(true);
        if let Some(filter) = filter {
            log::debug!("Restricting search to {} = {:?}", filter.key, filter.value);
            request = request.filter(Filter::must([Condition::matches(filter.key, filter.value)]));
        }

        let response = self
            .client
            .search_points(request)
            .await
            .with_context(|| format!("Qdrant search in '{}' failed", self.collection_name))?;

        let mut records: Vec<ScoredRecord> = response
            .result
            .into_iter()
            .map(|point| ScoredRecord {
                id: point_id_to_string(point.id),
                distance: score_to_distance(self.metric, point.score),
                payload: qdrant_payload_to_json(point.payload),
            })
            .collect();
        records.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        log::info!("Search returned {} results.", records.len());
        Ok(records)
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await
            .with_context(|| format!("Failed to count points in '{}'", self.collection_name))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn delete_collection(&self) -> Result<bool> {
        let exists = self.client.collection_exists(self.collection_name.as_str()).await?;
        if !exists {
            log::warn!("Collection '{}' does not exist, nothing to delete.", self.collection_name);
            return Ok(false);
        }
        self.client
            .delete_collection(self.collection_name.as_str())
            .await
            .with_context(|| format!("Failed to delete collection '{}'", self.collection_name))?;
        log::info!("Deleted collection '{}'.", self.collection_name);
        Ok(true)
    }

    fn dimension(&self) -> usize {
        self.vector_size
    }

    fn collection_name(&self) -> String {
        self.collection_name.clone()
    }
}
