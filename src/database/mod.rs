pub mod connection;
pub mod models;
pub mod repository;

pub use connection::DatabaseConnection;
pub use models::*;
pub use repository::*;
