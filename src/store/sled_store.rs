//! Sled-backed vector store
//!
//! One sled tree per table, JSON-serialized rows keyed by id. Vector
//! dimensions per `(table, field)` are persisted in a `__dims` meta tree
//! so shape enforcement survives restarts. Writes flush before return.

use std::path::Path;

use crate::error::PipelineError;

use super::{rank_nearest, Neighbor, QueryOrder, Row, VectorStore};

const DIMS_TREE: &str = "__dims";

/// Durable `VectorStore` on sled.
#[derive(Clone)]
pub struct SledVectorStore {
    db: sled::Db,
}

impl SledVectorStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a throwaway store in a temporary location (tests).
    pub fn open_temporary() -> Result<Self, PipelineError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(PipelineError::from)?;
        Ok(Self { db })
    }

    fn tree(&self, table: &str) -> Result<sled::Tree, PipelineError> {
        self.db.open_tree(table).map_err(PipelineError::from)
    }

    /// Enforce the persisted dimension for every vector on the row,
    /// establishing it on first sight.
    fn check_dims(&self, table: &str, row: &Row) -> Result<(), PipelineError> {
        if row.vectors.is_empty() {
            return Ok(());
        }
        let dims = self.tree(DIMS_TREE)?;
        for (field, vector) in &row.vectors {
            let key = format!("{table}:{field}");
            match dims.get(key.as_bytes())? {
                Some(raw) => {
                    let expected = usize::from_be_bytes(
                        raw.as_ref()
                            .try_into()
                            .map_err(|_| PipelineError::Storage("corrupt dims entry".into()))?,
                    );
                    if expected != vector.len() {
                        return Err(PipelineError::Shape { expected, got: vector.len() });
                    }
                }
                None => {
                    dims.insert(key.as_bytes(), &vector.len().to_be_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn decode(value: &[u8]) -> Result<Row, PipelineError> {
        serde_json::from_slice(value).map_err(PipelineError::from)
    }
}

impl VectorStore for SledVectorStore {
    fn put(&self, table: &str, row: Row) -> Result<(), PipelineError> {
        self.check_dims(table, &row)?;
        let tree = self.tree(table)?;
        let value = serde_json::to_vec(&row)?;
        tree.insert(row.id.as_bytes(), value)?;
        // Durable-before-return contract
        tree.flush()?;
        Ok(())
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<Row>, PipelineError> {
        let tree = self.tree(table)?;
        match tree.get(id.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Row) -> bool,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<Row>, PipelineError> {
        let tree = self.tree(table)?;
        let mut out = Vec::new();
        let iter: Box<dyn Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> = match order {
            QueryOrder::IdAsc => Box::new(tree.iter()),
            QueryOrder::IdDesc => Box::new(tree.iter().rev()),
        };
        for item in iter {
            if out.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            let row = Self::decode(&value)?;
            if predicate(&row) {
                out.push(row);
            }
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
        let tree = self.tree(table)?;
        let rows = tree
            .iter()
            .filter_map(|item| item.ok())
            .filter_map(|(_key, value)| Self::decode(&value).ok());
        Ok(rank_nearest(rows, field, probe, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> SledVectorStore {
        SledVectorStore::open_temporary().expect("open temp store")
    }

    #[test]
    fn put_then_get_preserves_vectors_exactly() {
        let store = temp_store();
        let vector: Vec<f32> = (0..64).map(|i| (i as f32 * 0.013).sin()).collect();
        let row = Row::new("d1")
            .with_field("request_id", json!("r1"))
            .with_vector("vector_64", vector.clone());
        store.put("dispersion_results", row).expect("put");

        let got = store
            .get("dispersion_results", "d1")
            .expect("get")
            .expect("row exists");
        assert_eq!(got.vectors["vector_64"], vector);
    }

    #[test]
    fn dims_are_enforced_across_tables_independently() {
        let store = temp_store();
        store
            .put("a", Row::new("1").with_vector("v", vec![0.5; 8]))
            .expect("establish dim 8 on a");
        // Same field name on a different table may carry a different dim
        store
            .put("b", Row::new("1").with_vector("v", vec![0.5; 16]))
            .expect("establish dim 16 on b");

        let err = store
            .put("a", Row::new("2").with_vector("v", vec![0.5; 16]))
            .expect_err("mismatch on a");
        assert_eq!(err, PipelineError::Shape { expected: 8, got: 16 });
    }

    #[test]
    fn nearest_ranks_by_cosine_descending() {
        let store = temp_store();
        store
            .put("t", Row::new("exact").with_vector("v", vec![1.0, 0.0]))
            .expect("put");
        store
            .put("t", Row::new("close").with_vector("v", vec![0.9, 0.1]))
            .expect("put");
        store
            .put("t", Row::new("far").with_vector("v", vec![0.0, 1.0]))
            .expect("put");

        let hits = store.nearest("t", "v", &[1.0, 0.0], 3).expect("nearest");
        let ids: Vec<&str> = hits.iter().map(|n| n.row.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "close", "far"]);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn query_desc_iterates_newest_ids_first() {
        let store = temp_store();
        for id in ["0001", "0002", "0003"] {
            store.put("t", Row::new(id)).expect("put");
        }
        let rows = store
            .query("t", &|_| true, 10, QueryOrder::IdDesc)
            .expect("query");
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0003", "0002", "0001"]);
    }
}
