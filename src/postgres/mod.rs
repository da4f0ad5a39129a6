//! PostgreSQL connection pooling for the user directory.

pub mod pool;

pub use pool::PostgresPool;
