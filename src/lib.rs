pub mod card;
pub mod cli;
pub mod config;
pub mod database;
pub mod julian;
pub mod models;
pub mod query;
pub mod scheduler;
pub mod tui;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use julian::JulianDate;
pub use query::Query;
pub use utils::Profile;
