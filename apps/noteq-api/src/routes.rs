use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use noteq_service::query_service::{self, Query, QueryOutcome};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::state::AppState;

/// A request body larger than this is rejected before any guardrail or
/// upstream call runs. Chosen generously above any realistic note query.
const MAX_QUERY_TEXT_BYTES: usize = 16 * 1024;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/v1/notes/query", post(query_notes))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
	query: String,
}

async fn query_notes(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<QueryRequest>,
) -> Result<Response, ApiError> {
	let api_token = extract_bearer_token(&headers)?;

	if payload.query.trim().is_empty() {
		return Err(ApiError::validation("query must not be empty"));
	}
	if payload.query.len() > MAX_QUERY_TEXT_BYTES {
		return Err(ApiError::validation("query exceeds the maximum allowed size"));
	}

	let request_id = uuid::Uuid::new_v4().to_string();
	let span = tracing::info_span!("notes_query", request_id = %request_id, query_len = payload.query.len());

	let query = Query { query_text: payload.query, request_id: request_id.clone(), api_token };

	match query_service::run(&state.deps, query).instrument(span).await {
		QueryOutcome::Completed(assembled) => Ok(completed_response(assembled)),
		QueryOutcome::UpstreamError { kind, message } => {
			tracing::warn!(%kind, %message, "upstream failure");
			Err(ApiError::upstream(request_id, kind, message))
		},
		QueryOutcome::Cancelled => Err(ApiError::cancelled(request_id)),
	}
}

fn completed_response(assembled: noteq_service::AssembledResponse) -> Response {
	let metadata = assembled.metadata;
	let request_id = assembled.body.request_id.clone();
	let mut response = Json(assembled.body).into_response();
	let headers = response.headers_mut();

	insert_header(headers, "x-request-id", &request_id);
	insert_header(headers, "x-model-name", &metadata.model_name);
	insert_header(headers, "x-api-type", metadata.api_type);
	insert_header(headers, "x-generation-time-seconds", &metadata.generation_time_seconds.to_string());

	if let Some(usage) = metadata.usage {
		if let Some(input_tokens) = usage.input_tokens {
			insert_header(headers, "x-input-tokens", &input_tokens.to_string());
		}
		if let Some(output_tokens) = usage.output_tokens {
			insert_header(headers, "x-output-tokens", &output_tokens.to_string());
		}
		if let Some(total_tokens) = usage.total_tokens {
			insert_header(headers, "x-total-tokens", &total_tokens.to_string());
		}
	}

	response
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: &str) {
	if let Ok(value) = HeaderValue::from_str(value) {
		headers.insert(header::HeaderName::from_static(name), value);
	}
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
	let raw = headers
		.get(header::AUTHORIZATION)
		.ok_or_else(|| ApiError::auth("Authorization header is required"))?;
	let raw = raw.to_str().map_err(|_| ApiError::auth("Invalid authorization header format"))?;
	let token = raw.strip_prefix("Bearer ").ok_or_else(|| ApiError::auth("Invalid authorization header format"))?;

	Ok(token.to_string())
}

#[derive(Debug, Serialize)]
struct AuthErrorBody {
	detail: String,
}

#[derive(Debug, Serialize)]
struct UpstreamErrorBody {
	request_id: String,
	error: String,
	message: String,
}

#[derive(Debug, Serialize)]
struct ValidationErrorBody {
	detail: String,
}

#[derive(Debug)]
pub enum ApiError {
	Auth(String),
	Validation(String),
	Upstream { request_id: String, kind: String, message: String },
	Cancelled { request_id: String },
}

impl ApiError {
	fn auth(detail: impl Into<String>) -> Self {
		Self::Auth(detail.into())
	}

	fn validation(detail: impl Into<String>) -> Self {
		Self::Validation(detail.into())
	}

	fn upstream(request_id: String, kind: String, message: String) -> Self {
		Self::Upstream { request_id, kind, message }
	}

	fn cancelled(request_id: String) -> Self {
		Self::Cancelled { request_id }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			Self::Auth(detail) => (StatusCode::UNAUTHORIZED, Json(AuthErrorBody { detail })).into_response(),
			Self::Validation(detail) =>
				(StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationErrorBody { detail })).into_response(),
			Self::Upstream { request_id, kind, message } => (
				StatusCode::SERVICE_UNAVAILABLE,
				Json(UpstreamErrorBody { request_id, error: kind, message }),
			)
				.into_response(),
			Self::Cancelled { request_id } => (
				StatusCode::SERVICE_UNAVAILABLE,
				Json(UpstreamErrorBody {
					request_id,
					error: "cancelled".to_string(),
					message: "request deadline elapsed".to_string(),
				}),
			)
				.into_response(),
		}
	}
}
