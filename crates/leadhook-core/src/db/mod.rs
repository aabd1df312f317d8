mod migrations;
mod queries;

pub use migrations::run_migrations;
pub use queries::Database;
