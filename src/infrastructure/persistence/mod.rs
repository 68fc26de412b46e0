pub mod database;
pub mod metric_repository;

pub use database::Database;
pub use metric_repository::SqliteMetricRepository;
