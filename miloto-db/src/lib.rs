pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use rusqlite;
