use std::time::Duration;

use noteq_domain::{NoteReference, VectorStore, VectorStoreError, vector_store::BoxFuture};
use qdrant_client::{
	Qdrant,
	qdrant::{CreateCollectionBuilder, Distance, QueryPointsBuilder, Value as QdrantValue, value::Kind},
};
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Nearest-neighbour client for the pre-populated note-file collection.
/// Construction bootstraps (idempotent create-if-absent) the collection at
/// the configured vector dimension; the ingestion job that populates points
/// is an external collaborator.
pub struct QdrantVectorStore {
	client: Qdrant,
	vector_dim: u32,
	search_timeout: Duration,
}

impl QdrantVectorStore {
	pub async fn connect(url: &str, collection: &str, vector_dim: u32, search_timeout: Duration) -> Result<Self> {
		let client = Qdrant::from_url(url).build()?;
		let store = Self { client, vector_dim, search_timeout };

		store.ensure_collection(collection).await?;

		Ok(store)
	}

	async fn ensure_collection(&self, collection: &str) -> Result<()> {
		let existing = self.client.list_collections().await?;
		let exists = existing.collections.into_iter().any(|c| c.name == collection);

		if exists {
			return Ok(());
		}

		tracing::info!(collection, vector_dim = self.vector_dim, "bootstrapping qdrant collection");

		self.client
			.create_collection(
				CreateCollectionBuilder::new(collection)
					.vectors_config(qdrant_client::qdrant::VectorParamsBuilder::new(
						self.vector_dim.into(),
						Distance::Cosine,
					)),
			)
			.await?;

		Ok(())
	}

	async fn search_impl(
		&self,
		vector: &[f32],
		top_n: usize,
		collection: &str,
	) -> Result<Vec<NoteReference>, VectorStoreError> {
		if vector.len() != self.vector_dim as usize {
			return Err(VectorStoreError::DimensionMismatch {
				collection: collection.to_string(),
				query_dim: vector.len(),
				collection_dim: self.vector_dim as usize,
			});
		}

		let request = QueryPointsBuilder::new(collection)
			.query(qdrant_client::qdrant::Query::new_nearest(vector.to_vec()))
			.limit(top_n as u64)
			.with_payload(true);
		let response = tokio::time::timeout(self.search_timeout, self.client.query(request))
			.await
			.map_err(|_| VectorStoreError::Timeout)?
			.map_err(|err| VectorStoreError::Request(err.to_string()))?;

		response
			.result
			.into_iter()
			.map(|point| {
				let payload = point.payload;
				let file_path = payload_string(&payload, "file_path")
					.ok_or(Error::MissingPayloadField("file_path"))
					.map_err(|err| VectorStoreError::Request(err.to_string()))?;
				let modified_at = payload_rfc3339(&payload, "modified_at").unwrap_or(OffsetDateTime::UNIX_EPOCH);
				let size_bytes = payload_u64(&payload, "size_bytes").unwrap_or(0);

				Ok(NoteReference::new(file_path, modified_at, point.score, size_bytes))
			})
			.collect()
	}
}

impl VectorStore for QdrantVectorStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_n: usize,
		collection: &'a str,
	) -> BoxFuture<'a, Result<Vec<NoteReference>, VectorStoreError>> {
		Box::pin(self.search_impl(vector, top_n, collection))
	}
}

fn payload_string(payload: &std::collections::HashMap<String, QdrantValue>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_rfc3339(payload: &std::collections::HashMap<String, QdrantValue>, key: &str) -> Option<OffsetDateTime> {
	let text = payload_string(payload, key)?;

	OffsetDateTime::parse(&text, &time::format_description::well_known::Rfc3339).ok()
}

fn payload_u64(payload: &std::collections::HashMap<String, QdrantValue>, key: &str) -> Option<u64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => u64::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) => Some(*value as u64),
		_ => None,
	}
}
