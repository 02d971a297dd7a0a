use noteq_domain::{NoteReference, VectorStore, VectorStoreError, vector_store::BoxFuture};

/// Fixed fixture standing in for `noteq_storage::QdrantVectorStore` in tests:
/// returns a fixed candidate set regardless of the query vector (beyond the
/// dimension check), so tests can assert on retrieval's dedup/sort/floor
/// logic without a live Qdrant instance.
pub struct InMemoryVectorStore {
	candidates: Vec<NoteReference>,
	vector_dim: usize,
}

impl InMemoryVectorStore {
	pub fn new(candidates: Vec<NoteReference>) -> Self {
		Self::with_vector_dim(candidates, 3)
	}

	pub fn with_vector_dim(candidates: Vec<NoteReference>, vector_dim: usize) -> Self {
		Self { candidates, vector_dim }
	}
}

impl VectorStore for InMemoryVectorStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_n: usize,
		collection: &'a str,
	) -> BoxFuture<'a, Result<Vec<NoteReference>, VectorStoreError>> {
		Box::pin(async move {
			if vector.len() != self.vector_dim {
				return Err(VectorStoreError::DimensionMismatch {
					collection: collection.to_string(),
					query_dim: vector.len(),
					collection_dim: self.vector_dim,
				});
			}

			Ok(self.candidates.iter().take(top_n).cloned().collect())
		})
	}
}
