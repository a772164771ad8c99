//! In-memory vector store for mock mode and tests

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::PipelineError;

use super::{rank_nearest, Neighbor, QueryOrder, Row, VectorStore};

/// `VectorStore` backed by in-process maps. Same contracts as the sled
/// implementation, selected via `use_mock_store`.
#[derive(Default)]
pub struct MemoryVectorStore {
    /// table → id → row. BTreeMap gives deterministic scan order.
    tables: RwLock<HashMap<String, BTreeMap<String, Row>>>,
    /// (table, field) → established dimension.
    dims: RwLock<HashMap<(String, String), usize>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_dims(&self, table: &str, row: &Row) -> Result<(), PipelineError> {
        let mut dims = self
            .dims
            .write()
            .map_err(|_| PipelineError::Storage("dims lock poisoned".into()))?;
        for (field, vector) in &row.vectors {
            let key = (table.to_string(), field.clone());
            match dims.get(&key) {
                Some(&expected) if expected != vector.len() => {
                    return Err(PipelineError::Shape { expected, got: vector.len() });
                }
                Some(_) => {}
                None => {
                    dims.insert(key, vector.len());
                }
            }
        }
        Ok(())
    }
}

impl VectorStore for MemoryVectorStore {
    fn put(&self, table: &str, row: Row) -> Result<(), PipelineError> {
        self.check_dims(table, &row)?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| PipelineError::Storage("tables lock poisoned".into()))?;
        tables.entry(table.to_string()).or_default().insert(row.id.clone(), row);
        Ok(())
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<Row>, PipelineError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| PipelineError::Storage("tables lock poisoned".into()))?;
        Ok(tables.get(table).and_then(|t| t.get(id)).cloned())
    }

    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Row) -> bool,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<Row>, PipelineError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| PipelineError::Storage("tables lock poisoned".into()))?;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        let mut push = |row: &Row| {
            if out.len() < limit && predicate(row) {
                out.push(row.clone());
            }
        };
        match order {
            QueryOrder::IdAsc => rows.values().for_each(&mut push),
            QueryOrder::IdDesc => rows.values().rev().for_each(&mut push),
        }
        Ok(out)
    }

    fn nearest(
        &self,
        table: &str,
        field: &str,
        probe: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>, PipelineError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| PipelineError::Storage("tables lock poisoned".into()))?;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rank_nearest(rows.values().cloned(), field, probe, k))
    }
}
