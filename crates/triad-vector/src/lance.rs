//! LanceDB-backed vector adapter (cargo feature `lance`).
//!
//! Connects lazily on the first probe or search; a failed connection is
//! retried on the next call. Driver errors are logged, never returned.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int32Type, Int64Type};
use arrow_array::{Array, RecordBatch};
use arrow_schema::{DataType, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use triad_core::filter;
use triad_core::{BackendAdapter, BackendKind, BackendRequest, Error, Metadata, SearchResult};

/// Columns that are never copied into result metadata.
const RESERVED: [&str; 5] = ["id", "content", "vector", "_distance", "_rowid"];

pub struct LanceVectorAdapter {
    uri: String,
    default_table: String,
    conn: OnceCell<Connection>,
}

impl LanceVectorAdapter {
    pub fn new(uri: impl Into<String>, default_table: impl Into<String>) -> Self {
        Self { uri: uri.into(), default_table: default_table.into(), conn: OnceCell::new() }
    }

    async fn connection(&self) -> Result<&Connection> {
        self.conn
            .get_or_try_init(|| async {
                let conn = connect(&self.uri).execute().await?;
                info!(uri = %self.uri, "connected to LanceDB");
                Ok::<_, anyhow::Error>(conn)
            })
            .await
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let names = self.connection().await?.table_names().execute().await?;
        Ok(names.iter().any(|n| n == table))
    }

    async fn query(&self, request: &BackendRequest, embedding: &[f32]) -> triad_core::Result<Vec<SearchResult>> {
        let table_name = request.collection.as_deref().unwrap_or(&self.default_table);
        if !self.has_table(table_name).await.map_err(|e| backend_error("listing LanceDB tables failed", e))? {
            return Err(match request.collection {
                Some(_) => Error::NotFound(format!("collection '{table_name}'")),
                None => Error::unavailable(BackendKind::Vector, "default LanceDB table missing"),
            });
        }
        let conn = self.connection().await.map_err(|e| backend_error("LanceDB connection failed", e))?;
        let table = conn
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| backend_error("opening LanceDB table failed", e))?;
        let schema = table.schema().await.map_err(|e| backend_error("reading LanceDB schema failed", e))?;
        if let Some(dim) = vector_dim(&schema) {
            if dim != embedding.len() {
                return Err(Error::InvalidQuery(format!(
                    "query embedding has dimension {}, the vector index expects {dim}",
                    embedding.len()
                )));
            }
        }

        let post_filter = request.filters.is_some();
        let limit = if post_filter { request.top_k * 10 } else { request.top_k };
        let mut stream = table
            .vector_search(embedding.to_vec())
            .map_err(|e| backend_error("LanceDB vector search failed", e))?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| backend_error("LanceDB vector search failed", e))?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(|e| backend_error("reading LanceDB results failed", e))? {
            collect_batch(&batch, &mut hits).map_err(|e| backend_error("unexpected LanceDB result layout", e))?;
        }
        let mut hits: Vec<SearchResult> = hits
            .into_iter()
            .filter(|h| filter::matches_opt(request.filters.as_ref(), &h.metadata))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id)));
        hits.truncate(request.top_k);
        Ok(hits)
    }
}

/// Logs the driver error and returns an unavailability carrying only `context`.
fn backend_error(context: &'static str, e: impl std::fmt::Display) -> Error {
    warn!(error = %e, "{}", context);
    Error::unavailable(BackendKind::Vector, context)
}

/// Length of the fixed-size `vector` column, when the table has one.
fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

fn collect_batch(batch: &RecordBatch, out: &mut Vec<SearchResult>) -> Result<()> {
    let ids = batch
        .column_by_name("id")
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| anyhow!("missing id column"))?;
    let contents = batch.column_by_name("content").and_then(|c| c.as_string_opt::<i32>());
    let distances = batch.column_by_name("_distance").and_then(|c| c.as_primitive_opt::<Float32Type>());
    let schema = batch.schema();
    for i in 0..batch.num_rows() {
        if ids.is_null(i) { continue; }
        let score = match distances {
            Some(d) if d.is_valid(i) => (1.0 - d.value(i)).clamp(0.0, 1.0),
            _ => 0.0,
        };
        let content = contents.filter(|c| c.is_valid(i)).map(|c| c.value(i).to_string()).unwrap_or_default();
        let mut result = SearchResult::new(ids.value(i), content, score).with_source(BackendKind::Vector);
        let mut metadata = Metadata::new();
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            if RESERVED.contains(&field.name().as_str()) || column.is_null(i) { continue; }
            let value = match field.data_type() {
                DataType::Utf8 => column.as_string_opt::<i32>().map(|c| serde_json::Value::from(c.value(i))),
                DataType::Int32 => column.as_primitive_opt::<Int32Type>().map(|c| serde_json::Value::from(c.value(i))),
                DataType::Int64 => column.as_primitive_opt::<Int64Type>().map(|c| serde_json::Value::from(c.value(i))),
                DataType::Float32 => column.as_primitive_opt::<Float32Type>().map(|c| serde_json::Value::from(f64::from(c.value(i)))),
                DataType::Float64 => column.as_primitive_opt::<Float64Type>().map(|c| serde_json::Value::from(c.value(i))),
                DataType::Boolean => column.as_boolean_opt().map(|c| serde_json::Value::from(c.value(i))),
                _ => None,
            };
            if let Some(value) = value {
                metadata.insert(field.name().clone(), value);
            }
        }
        result.metadata = metadata;
        out.push(result);
    }
    Ok(())
}

#[async_trait]
impl BackendAdapter for LanceVectorAdapter {
    fn kind(&self) -> BackendKind { BackendKind::Vector }

    fn name(&self) -> &str { "lance" }

    async fn probe(&self) -> triad_core::Result<()> {
        match self.has_table(&self.default_table).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(uri = %self.uri, table = %self.default_table, "LanceDB table not found");
                Err(Error::unavailable(BackendKind::Vector, "default LanceDB table missing"))
            }
            Err(e) => Err(backend_error("LanceDB connection failed", format!("{e:#}"))),
        }
    }

    async fn search(&self, request: &BackendRequest) -> triad_core::Result<Vec<SearchResult>> {
        let start = Instant::now();
        let Some(embedding) = request.embedding.as_deref() else {
            return Err(Error::InvalidQuery("vector search needs a query embedding".to_string()));
        };
        let hits = self.query(request, embedding).await?;
        debug!(hits = hits.len(), elapsed_ms = start.elapsed().as_millis() as u64, "lance vector search");
        Ok(hits)
    }
}
