pub mod assemble;
pub mod dependencies;
pub mod error;
pub mod guardrail_in;
pub mod guardrail_out;
pub mod query_service;
pub mod retrieval;
pub mod synthesis;

pub use assemble::{AssembledResponse, ResponseMetadata};
pub use dependencies::Dependencies;
pub use error::{Error, Result};
pub use guardrail_in::GuardrailInOutcome;
pub use query_service::{Query, QueryOutcome};
