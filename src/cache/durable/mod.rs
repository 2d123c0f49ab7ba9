//! File-backed durable tier
//!
//! Persists entries across restarts, one directory per namespace, with a
//! schema version file at the root and an in-memory index rebuilt on open.
//! Filesystem access goes through the `DiskBackend` trait so tests can run
//! against an in-memory backend.

pub use self::backend::DiskBackend;
pub use self::error::DurableError;
pub use self::store::DurableTier;
pub use self::tokio_backend::TokioFsBackend;

pub mod backend;
mod error;
mod index;
mod store;
mod tokio_backend;
mod types;
mod utils;

#[cfg(test)]
mod mock_backend;

#[cfg(test)]
mod tests;
