//! Shared error types for the Zalo OAuth relay

pub mod errors;

pub use errors::{AppError, AppResult};
