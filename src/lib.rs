// Tsubame: tiered client cache and worker update lifecycle

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod task;
pub mod update;

pub use error::{Error, Result};
