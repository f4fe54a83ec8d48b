pub mod api;
pub mod cascade;
pub mod categories;
pub mod config;
pub mod database;
pub mod error;
pub mod favorites;
pub mod memories;
pub mod persons;
pub mod service;
pub mod tree;
pub mod users;

#[cfg(test)]
mod fixtures;

pub use api::{router, AppState};
pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use favorites::FavoriteOutcome;
