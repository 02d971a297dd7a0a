#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("vector store request timed out")]
	Timeout,
	#[error("point payload missing required field {0:?}")]
	MissingPayloadField(&'static str),
}

impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
