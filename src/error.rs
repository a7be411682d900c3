// Error taxonomy for the sampling core.

use thiserror::Error;

/// A metric spec references something the query registry cannot satisfy,
/// or the spec itself is inconsistent. Raised at catalog build, never at
/// sample time.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("metric spec '{model_key}' references unknown query '{query}'")]
    UnknownQuery { model_key: String, query: String },
    #[error("duplicate model_key '{model_key}' in catalog")]
    DuplicateModelKey { model_key: String },
    #[error("metric spec '{model_key}' has background sampling enabled but sample_interval_secs = 0")]
    ZeroInterval { model_key: String },
}

/// An OS query failed at sample time (permission denied, transient OS
/// failure, lock poisoned). Propagates out of the sampler; the background
/// worker decides disposition.
#[derive(Debug, Clone, Error)]
#[error("query '{query}' failed: {message}")]
pub struct SourceQueryError {
    pub query: String,
    pub message: String,
}

impl SourceQueryError {
    pub fn new(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            message: message.into(),
        }
    }
}
