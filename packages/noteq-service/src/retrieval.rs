use noteq_domain::RetrievalResult;

use crate::{dependencies::Dependencies, error::Result};

/// Embeds `query_text`, searches the configured collection, and folds the
/// candidates into a deduplicated, floor-filtered, sorted `RetrievalResult`.
/// An empty result is a legal outcome and is not an error; only I/O failure
/// in either step surfaces here. `api_token` is the caller's own forwarded
/// bearer credential (see `Query::api_token`), never `deps.settings.api_token`.
pub async fn retrieve(deps: &Dependencies, query_text: &str, api_token: &str) -> Result<RetrievalResult> {
	let vector = deps
		.embedding
		.embed(
			&deps.settings.embedding_model,
			query_text,
			api_token,
			deps.settings.embedding_dim(),
			deps.settings.embedding_timeout,
		)
		.await?;

	let candidates =
		deps.vector_store.search(&vector, deps.settings.top_n as usize, &deps.settings.collection_name).await?;

	Ok(RetrievalResult::from_candidates(
		candidates,
		vector.len(),
		deps.settings.collection_name.clone(),
		deps.settings.similarity_floor,
	))
}
