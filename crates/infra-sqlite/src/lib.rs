// Serpwatch Infrastructure - SQLite Adapter
// Implements: StagingRepository

mod connection;
mod migration;
mod staging_repository;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use staging_repository::SqliteStagingRepository;

// Note: sqlx::Error conversion goes through map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
