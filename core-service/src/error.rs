use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(core_runtime::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] core_cache::FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] core_cache::CacheError),
}

impl From<core_runtime::Error> for ServiceError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => ServiceError::CapabilityMissing {
                capability,
                message,
            },
            other => ServiceError::Runtime(other),
        }
    }
}

impl ServiceError {
    /// HTTP status of a failed fetch, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Fetch(error) => error.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
