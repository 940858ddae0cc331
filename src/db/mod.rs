pub mod connection;
pub mod helpers;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use migrations::MigrationPolicy;
pub use models::{SleepNight, SleepQuality, UNRATED_QUALITY};
