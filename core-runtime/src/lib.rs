//! Runtime plumbing shared by the cache engine and the service layer.
//!
//! [`config`] collects the host bridges and cache budgets, [`logging`] installs
//! the tracing subscriber, and [`events`] carries cache and quality
//! notifications to subscribers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
