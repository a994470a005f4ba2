//! Consolidated, cached views of GitHub projects.
//!
//! Raw upstream responses are cached by URL ([`cache::ResponseCache`]) and
//! fully built [`aggregator::ProjectView`]s by request path
//! ([`cache::ViewCache`]). A view miss answers immediately with
//! [`cache::ViewStatus::Building`] while the [`aggregator::Aggregator`] fills
//! the cache in the background.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod packages;

pub use aggregator::{Aggregator, ProjectView};
pub use config::{CacheConfig, Config};
pub use error::{ErrorKind, Result, ScavengerError};
