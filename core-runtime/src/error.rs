use thiserror::Error;

/// Failures while assembling the runtime, before any cache work starts.
#[derive(Error, Debug)]
pub enum Error {
    /// A budget, directory or logging option was rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No bridge implementation was injected and no desktop default exists.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
