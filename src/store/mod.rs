//! Vector store facade
//!
//! Narrow key/value + vector-search abstraction the pipeline persists
//! through. Rows are scalar maps plus named fixed-dimension float
//! vectors; similarity search is cosine over a single vector field.
//! Two implementations share the contract: `SledVectorStore` (durable)
//! and `MemoryVectorStore` (mock mode and tests).

mod memory;
mod sled_store;
pub mod vector;

pub use memory::MemoryVectorStore;
pub use sled_store::SledVectorStore;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PipelineError;

/// Well-known tables and vector fields.
pub mod tables {
    pub const BURN_REQUESTS: &str = "burn_requests";
    pub const WEATHER_SNAPSHOTS: &str = "weather_snapshots";
    pub const DISPERSION_RESULTS: &str = "dispersion_results";
    pub const SCHEDULES: &str = "schedules";
    pub const CONFLICTS: &str = "conflicts";
    pub const AGENT_EVENTS: &str = "agent_events";
    pub const BURN_OUTCOMES: &str = "burn_outcomes";

    pub const FIELD_WEATHER_VEC: &str = "vector_128";
    pub const FIELD_PLUME_VEC: &str = "vector_64";
    pub const FIELD_OUTCOME_VEC: &str = "vector_32";
}

/// A stored row: primary id, scalar fields, named vectors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Row {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub vectors: HashMap<String, Vec<f32>>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn with_vector(mut self, field: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(field.to_string(), vector);
        self
    }

    /// Scalar field as &str, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Scalar field as f64, if present and numeric.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// Row ordering for `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    IdAsc,
    IdDesc,
}

/// A nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub row: Row,
    /// Cosine similarity in [-1, 1], descending across results.
    pub similarity: f32,
}

/// Store/retrieve scalar rows and fixed-dimension float vectors.
///
/// Contracts:
/// - Vector dimensions are fixed per `(table, field)` — the first write
///   establishes the dimension and later mismatches fail with a shape
///   error.
/// - `nearest` tolerates empty tables and zero-magnitude probes by
///   returning an empty result.
/// - Writes are durable before return; reads are read-your-writes.
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite a row keyed by its primary id.
    fn put(&self, table: &str, row: Row) -> Result<(), PipelineError>;

    /// Fetch a row by id.
    fn get(&self, table: &str, id: &str) -> Result<Option<Row>, PipelineError>;

    /// Ordered scan with a row predicate.
    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Row) -> bool,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<Row>, PipelineError>;

    /// Top-k rows by cosine similarity to `probe`, descending.
    fn nearest(
        &self,
        table: &str,
        field: &str,
        probe: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>, PipelineError>;
}

/// Rank all rows carrying `field` by cosine similarity to `probe`.
///
/// Shared by both implementations so ordering and the zero-probe
/// guard behave identically.
pub(crate) fn rank_nearest(
    rows: impl Iterator<Item = Row>,
    field: &str,
    probe: &[f32],
    k: usize,
) -> Vec<Neighbor> {
    if k == 0 || vector::magnitude(probe) < vector::ZERO_MAGNITUDE_EPS {
        return Vec::new();
    }
    let mut hits: Vec<Neighbor> = rows
        .filter_map(|row| {
            let candidate = row.vectors.get(field)?;
            let similarity = vector::cosine(probe, candidate)?;
            Some(Neighbor { row, similarity })
        })
        .collect();
    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    hits
}
