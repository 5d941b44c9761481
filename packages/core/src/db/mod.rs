//! Database layer with libsql integration.

pub mod database;
pub mod error;
pub mod store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use store::AssetStore;
