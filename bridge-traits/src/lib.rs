//! Host capabilities consumed by the media cache.
//!
//! The cache never opens sockets, touches the disk, or reads the wall clock
//! on its own. Every such capability is one of the traits below, supplied
//! by the host (or by `bridge-desktop`) through `CoreConfig`:
//!
//! | Trait | Used for |
//! |-------|----------|
//! | [`ResourceFetcher`](http::ResourceFetcher) | downloading media on a cache miss |
//! | [`FileSystemAccess`](storage::FileSystemAccess) | the durable tier's files |
//! | [`NetworkMonitor`](network::NetworkMonitor) | precache gating and quality selection |
//! | [`Clock`](time::Clock) | entry timestamps, so eviction order is testable |
//! | [`LoggerSink`](time::LoggerSink) | forwarding tracing output to the host log |
//!
//! Failures are reported as [`BridgeError`](error::BridgeError). A transport
//! that receives a non-2xx response must return
//! [`BridgeError::HttpStatus`](error::BridgeError::HttpStatus); the status code
//! travels unchanged to whoever awaited the fetch.
//!
//! Implementations are shared across tokio tasks behind `Arc`, hence the
//! `Send + Sync` bound on every trait.

pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{FetchedResource, ResourceFetcher, RetryPolicy, DEFAULT_MIME_TYPE};
pub use network::{
    ConnectionType, HostNetworkMonitor, NetworkMonitor, NetworkSnapshot, SignalStrength,
};
pub use storage::FileSystemAccess;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
