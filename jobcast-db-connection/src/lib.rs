//! SQLite pool construction for the job database.

pub mod config;
pub mod error;
pub mod pool;
#[cfg(test)]
mod test;

pub use config::DbConnectionConfig;
pub use error::DbConnectionError;
pub use pool::{create_pool, DbPool};
