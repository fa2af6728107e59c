#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors for malformed inputs.
///
/// These cover URL and template problems only. Every "not found" or "not yet
/// available" condition in the engine is an `Option`/`bool` return, because
/// the caller stalls and retries rather than aborting playback.
#[derive(Debug, Error)]
pub enum AdaptiveError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Relative URL without a base: {0}")]
    NoBaseUrl(String),

    #[error("Template resolution failed: {0}")]
    Template(String),
}

pub type AdaptiveResult<T> = Result<T, AdaptiveError>;
