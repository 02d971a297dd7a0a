use std::{future::Future, pin::Pin};

use crate::types::NoteReference;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
	#[error("vector dimension mismatch: query produced {query_dim}, collection {collection} expects {collection_dim}")]
	DimensionMismatch { collection: String, query_dim: usize, collection_dim: usize },
	#[error("vector store request failed: {0}")]
	Request(String),
	#[error("vector store request timed out")]
	Timeout,
}

/// Nearest-neighbour search abstraction over the pre-populated note-file
/// collection. Production code is backed by Qdrant (`noteq-storage`); tests
/// substitute an in-memory fixture (`noteq-testkit`) without touching the
/// wire protocol.
pub trait VectorStore: Send + Sync {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_n: usize,
		collection: &'a str,
	) -> BoxFuture<'a, Result<Vec<NoteReference>, VectorStoreError>>;
}
