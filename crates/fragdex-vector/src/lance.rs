//! LanceDB-backed vector store.
//!
//! One row per fragment id; upserts go through `merge_insert` on `id` so a
//! re-populated fragment replaces its previous vector in one commit.
use anyhow::{anyhow, Result as AnyResult};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use fragdex_core::error::{Error, Result};
use fragdex_core::traits::VectorStore;
use fragdex_core::types::FragmentId;

use crate::schema::build_vector_schema;

pub struct LanceVectorStore {
	conn: Connection,
	table: String,
	dim: usize,
}

fn unavailable(e: anyhow::Error) -> Error { Error::IndexUnavailable(format!("lancedb: {e:#}")) }

impl LanceVectorStore {
	/// Connect to `uri` and create `table` if it does not exist yet.
	pub async fn open(uri: &str, table: &str, dim: usize) -> Result<Self> {
		let conn = connect(uri).execute().await.map_err(|e| unavailable(e.into()))?;
		let store = Self { conn, table: table.to_string(), dim };
		store.ensure_table().await.map_err(unavailable)?;
		info!(uri, table, dim, "lancedb vector store opened");
		Ok(store)
	}

	async fn ensure_table(&self) -> AnyResult<()> {
		let names = self.conn.table_names().execute().await?;
		if names.contains(&self.table) { return Ok(()); }
		let schema = build_vector_schema(self.dim as i32);
		let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
		self.conn.create_table(&self.table, Box::new(iter)).execute().await?;
		Ok(())
	}

	pub async fn count(&self) -> Result<usize> {
		let t = self.conn.open_table(&self.table).execute().await.map_err(|e| unavailable(e.into()))?;
		t.count_rows(None).await.map_err(|e| unavailable(e.into()))
	}

	fn check_dim(&self, v: &[f32]) -> Result<()> {
		if v.len() != self.dim { return Err(Error::EmbeddingProvider(format!("vector has dim {}, table expects {}", v.len(), self.dim))); }
		Ok(())
	}

	async fn upsert_inner(&self, id: &str, vector: &[f32]) -> AnyResult<()> {
		let schema = build_vector_schema(self.dim as i32);
		let vectors = vec![Some(vector.iter().map(|&x| Some(x)).collect::<Vec<_>>())];
		let batch = RecordBatch::try_new(
			schema.clone(),
			vec![
				Arc::new(StringArray::from(vec![id.to_string()])),
				Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
			],
		)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let t = self.conn.open_table(&self.table).execute().await?;
		let mut mi = t.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await?;
		Ok(())
	}

	async fn query_inner(&self, vector: &[f32], k: usize) -> AnyResult<Vec<(FragmentId, f32)>> {
		let t = self.conn.open_table(&self.table).execute().await?;
		let mut stream = t.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("id column missing"))?;
			let dists = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("_distance column missing"))?;
			for i in 0..batch.num_rows() {
				if ids.is_null(i) { continue; }
				out.push((ids.value(i).to_string(), dists.value(i)));
			}
		}
		Ok(out)
	}

	async fn retain_inner(&self, keep: &HashSet<FragmentId>) -> AnyResult<usize> {
		let t = self.conn.open_table(&self.table).execute().await?;
		let before = t.count_rows(None).await?;
		let predicate = if keep.is_empty() {
			"true".to_string()
		} else {
			let ids: Vec<String> = keep.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect();
			format!("id NOT IN ({})", ids.join(", "))
		};
		t.delete(&predicate).await?;
		let after = t.count_rows(None).await?;
		Ok(before.saturating_sub(after))
	}
}

#[async_trait]
impl VectorStore for LanceVectorStore {
	async fn upsert(&self, id: &str, vector: &[f32]) -> Result<()> {
		self.check_dim(vector)?;
		self.upsert_inner(id, vector).await.map_err(unavailable)
	}

	async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(FragmentId, f32)>> {
		self.check_dim(vector)?;
		self.query_inner(vector, k).await.map_err(unavailable)
	}

	async fn retain(&self, keep: &HashSet<FragmentId>) -> Result<usize> { self.retain_inner(keep).await.map_err(unavailable) }
}
