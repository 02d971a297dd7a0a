use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
	http: Client,
	base_url: String,
}

impl EmbeddingClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self { http: Client::new(), base_url: base_url.into() }
	}

	/// POSTs `{proxy_base}/v1/embeddings` and returns the first embedding
	/// vector. Fails on non-2xx, timeout, or a dimension that doesn't match
	/// `expected_dim` (when known).
	pub async fn embed(
		&self,
		model: &str,
		text: &str,
		api_token: &str,
		expected_dim: Option<u32>,
		timeout: Duration,
	) -> Result<Vec<f32>> {
		let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
		let body = json!({ "model": model, "input": text });
		let response = tokio::time::timeout(
			timeout,
			self.http.post(&url).bearer_auth(api_token).json(&body).send(),
		)
		.await
		.map_err(|_| Error::EmbeddingTimeout)?
		.map_err(|err| Error::Embedding(err.to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let text = response.text().await.unwrap_or_default();
			return Err(Error::Embedding(format!("proxy returned {status}: {text}")));
		}

		let payload: serde_json::Value =
			response.json().await.map_err(|err| Error::Embedding(err.to_string()))?;
		let vector = payload["data"][0]["embedding"]
			.as_array()
			.ok_or_else(|| Error::Embedding("response missing data[0].embedding".to_string()))?
			.iter()
			.map(|value| value.as_f64().unwrap_or(0.0) as f32)
			.collect::<Vec<f32>>();

		if let Some(expected) = expected_dim
			&& vector.len() != expected as usize
		{
			return Err(Error::EmbeddingDimensionMismatch { expected, got: vector.len() });
		}

		Ok(vector)
	}
}

#[cfg(test)]
mod tests {
	use wiremock::{
		Mock, MockServer, ResponseTemplate,
		matchers::{method, path},
	};

	use super::*;

	#[tokio::test]
	async fn embed_returns_vector_on_success() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/embeddings"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"data": [{ "embedding": [0.1, 0.2, 0.3] }]
			})))
			.mount(&server)
			.await;

		let client = EmbeddingClient::new(server.uri());
		let vector = client
			.embed("text-embedding-3-small", "hello", "sk-test", Some(3), Duration::from_secs(5))
			.await
			.unwrap();

		assert_eq!(vector, vec![0.1, 0.2, 0.3]);
	}

	#[tokio::test]
	async fn embed_rejects_dimension_mismatch() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/embeddings"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"data": [{ "embedding": [0.1, 0.2] }]
			})))
			.mount(&server)
			.await;

		let client = EmbeddingClient::new(server.uri());
		let err = client
			.embed("text-embedding-3-small", "hello", "sk-test", Some(3), Duration::from_secs(5))
			.await
			.unwrap_err();

		assert!(matches!(err, Error::EmbeddingDimensionMismatch { expected: 3, got: 2 }));
	}

	#[tokio::test]
	async fn embed_surfaces_non_2xx_as_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/embeddings"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let client = EmbeddingClient::new(server.uri());
		let err = client
			.embed("text-embedding-3-small", "hello", "sk-test", None, Duration::from_secs(5))
			.await
			.unwrap_err();

		assert!(matches!(err, Error::Embedding(_)));
	}
}
