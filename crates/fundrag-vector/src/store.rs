use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use parking_lot::RwLock;

use fundrag_core::error::{Error, Result};
use fundrag_core::traits::VectorIndexer;
use fundrag_core::types::{Document, Metadata, RankedResult, SourceTag};

use crate::schema::{build_arrow_schema, COL_DISTANCE, COL_ID, COL_METADATA, COL_SOURCE, COL_TEXT};
use crate::table::{ensure_table, open_db, recreate_table, table_exists, unavailable};

const BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
	pub uri: String,
	pub table_name: String,
	pub dim: usize,
	pub show_progress: bool,
}

/// Observable initialization state of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
	Uninitialized,
	Initializing,
	Ready,
	Failed(String),
}

enum InitState {
	Uninitialized,
	Initializing,
	Ready(Connection),
	Failed(String),
}

/// Cosine-similarity index on a LanceDB table.
///
/// The connection is opened lazily by whichever call comes first; concurrent
/// first callers queue on `init_lock` so setup runs once. A failed setup is
/// retried on the next call.
pub struct LanceVectorIndex {
	config: VectorStoreConfig,
	state: RwLock<InitState>,
	init_lock: tokio::sync::Mutex<()>,
}

impl LanceVectorIndex {
	pub fn new(config: VectorStoreConfig) -> Self {
		Self { config, state: RwLock::new(InitState::Uninitialized), init_lock: tokio::sync::Mutex::new(()) }
	}

	pub fn config(&self) -> &VectorStoreConfig { &self.config }

	pub fn lifecycle(&self) -> Lifecycle {
		match &*self.state.read() {
			InitState::Uninitialized => Lifecycle::Uninitialized,
			InitState::Initializing => Lifecycle::Initializing,
			InitState::Ready(_) => Lifecycle::Ready,
			InitState::Failed(reason) => Lifecycle::Failed(reason.clone()),
		}
	}

	fn ready_connection(&self) -> Option<Connection> {
		match &*self.state.read() {
			InitState::Ready(conn) => Some(conn.clone()),
			_ => None,
		}
	}

	async fn connection(&self) -> Result<Connection> {
		if let Some(conn) = self.ready_connection() {
			return Ok(conn);
		}
		let _guard = self.init_lock.lock().await;
		if let Some(conn) = self.ready_connection() {
			return Ok(conn);
		}

		*self.state.write() = InitState::Initializing;
		match self.open().await {
			Ok(conn) => {
				*self.state.write() = InitState::Ready(conn.clone());
				tracing::info!(uri = %self.config.uri, table = %self.config.table_name, "vector store ready");
				Ok(conn)
			}
			Err(e) => {
				tracing::warn!(error = %e, "vector store initialization failed");
				*self.state.write() = InitState::Failed(e.to_string());
				Err(e)
			}
		}
	}

	async fn open(&self) -> Result<Connection> {
		let conn = open_db(&self.config.uri).await?;
		ensure_table(&conn, &self.config.table_name, build_arrow_schema(self.dim_i32()?)).await?;
		Ok(conn)
	}

	fn dim_i32(&self) -> Result<i32> {
		i32::try_from(self.config.dim).map_err(|_| Error::InvalidConfig(format!("embedding dimension {} too large", self.config.dim)))
	}

	fn check_dim(&self, v: &[f32]) -> Result<()> {
		if v.len() != self.config.dim {
			return Err(Error::Validation(format!("vector has {} dimensions, index expects {}", v.len(), self.config.dim)));
		}
		Ok(())
	}

	fn progress_bar(&self, len: usize) -> ProgressBar {
		if !self.config.show_progress {
			return ProgressBar::hidden();
		}
		let pb = ProgressBar::new(len as u64);
		let style = ProgressStyle::default_bar()
			.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
			.unwrap_or_else(|_| ProgressStyle::default_bar())
			.progress_chars("#>-");
		pb.set_style(style);
		pb
	}

	fn to_record_batch(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let dim = self.dim_i32()?;
		let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
		let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
		let sources: Vec<&str> = docs.iter().map(|d| d.source_tag.as_str()).collect();
		let metadata = docs.iter().map(|d| serde_json::to_string(&d.metadata)).collect::<std::result::Result<Vec<_>, _>>()?;
		let vectors = embeddings.iter().map(|e| Some(e.iter().map(|&x| Some(x)).collect::<Vec<_>>()));

		RecordBatch::try_new(build_arrow_schema(dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(sources)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
		]).map_err(|e| Error::Index(e.to_string()))
	}

	async fn upsert_batch(&self, conn: &Connection, batch: RecordBatch) -> Result<()> {
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let table = conn.open_table(&self.config.table_name).execute().await.map_err(unavailable)?;
		// ids are unique: re-indexing a document replaces it
		let mut mi = table.merge_insert(&[COL_ID]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await.map_err(unavailable)?;
		Ok(())
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::Index(format!("column '{name}' missing from vector results")))
}

fn rows_to_results(batch: &RecordBatch, first_rank: usize) -> Result<Vec<RankedResult>> {
	let ids = string_col(batch, COL_ID)?;
	let texts = string_col(batch, COL_TEXT)?;
	let sources = string_col(batch, COL_SOURCE)?;
	let metas = string_col(batch, COL_METADATA)?;
	let distances = batch
		.column_by_name(COL_DISTANCE)
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::Index("distance column missing from vector results".into()))?;

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let metadata: Metadata = serde_json::from_str(metas.value(i)).unwrap_or_else(|e| {
			tracing::warn!(id = ids.value(i), error = %e, "unreadable metadata in vector store");
			Metadata::new()
		});
		let distance = if distances.is_null(i) { 1.0 } else { distances.value(i) };
		out.push(RankedResult {
			id: ids.value(i).to_string(),
			text: texts.value(i).to_string(),
			score: 1.0 - distance,
			rank: first_rank + i,
			source_tag: sources.value(i).parse::<SourceTag>()?,
			metadata,
		});
	}
	Ok(out)
}

#[async_trait]
impl VectorIndexer for LanceVectorIndex {
	async fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		if documents.len() != embeddings.len() {
			return Err(Error::DimensionMismatch { documents: documents.len(), embeddings: embeddings.len() });
		}
		embeddings.iter().try_for_each(|e| self.check_dim(e))?;
		let mut seen = HashSet::with_capacity(documents.len());
		if let Some(dup) = documents.iter().find(|d| !seen.insert(d.id.as_str())) {
			return Err(Error::Validation(format!("duplicate document id '{}'", dup.id)));
		}
		if documents.is_empty() {
			tracing::debug!("no documents to index");
			return Ok(());
		}

		let conn = self.connection().await?;
		tracing::info!(documents = documents.len(), table = %self.config.table_name, "indexing into vector store");
		let pb = self.progress_bar(documents.len());
		for (docs, embs) in documents.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			let batch = self.to_record_batch(docs, embs)?;
			self.upsert_batch(&conn, batch).await?;
			pb.inc(docs.len() as u64);
		}
		pb.finish_with_message("vector indexing completed");
		Ok(())
	}

	async fn search(&self, query_vector: &[f32], top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
		self.check_dim(query_vector)?;
		if top_k == 0 {
			return Ok(vec![]);
		}
		let conn = self.connection().await?;
		let table = conn.open_table(&self.config.table_name).execute().await.map_err(unavailable)?;
		if table.count_rows(None).await.map_err(unavailable)? == 0 {
			tracing::debug!("vector search against an empty table");
			return Ok(vec![]);
		}

		let mut query = table
			.vector_search(query_vector.to_vec())
			.map_err(unavailable)?
			.distance_type(DistanceType::Cosine)
			.limit(top_k);
		if let Some(tag) = source_filter {
			query = query.only_if(format!("{COL_SOURCE} = '{}'", tag.as_str()));
		}
		let mut stream = query.execute().await.map_err(unavailable)?;

		let mut results = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(unavailable)? {
			let rows = rows_to_results(&batch, results.len() + 1)?;
			results.extend(rows);
		}
		results.truncate(top_k);
		Ok(results)
	}

	async fn clear(&self) -> Result<()> {
		let conn = self.connection().await?;
		recreate_table(&conn, &self.config.table_name, build_arrow_schema(self.dim_i32()?)).await?;
		tracing::info!(table = %self.config.table_name, "vector store cleared");
		Ok(())
	}

	async fn count(&self) -> Result<usize> {
		let conn = self.connection().await?;
		if !table_exists(&conn, &self.config.table_name).await? {
			return Ok(0);
		}
		let table = conn.open_table(&self.config.table_name).execute().await.map_err(unavailable)?;
		table.count_rows(None).await.map_err(unavailable)
	}
}
