//! Desktop adapters for the host bridge traits.
//!
//! [`ReqwestResourceFetcher`] downloads media over HTTPS and retries 5xx and
//! 429 responses. [`TokioFileSystem`] keeps the durable tier under the
//! platform cache directory. [`DesktopNetworkMonitor`] checks connectivity
//! with a short TCP connect and reports a wired connection when it succeeds.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .resource_fetcher(Arc::new(ReqwestResourceFetcher::new()?))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .network_monitor(Arc::new(DesktopNetworkMonitor::new()))
//!     .build()?;
//! ```

mod filesystem;
mod http;
mod network;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestResourceFetcher;
pub use network::DesktopNetworkMonitor;
