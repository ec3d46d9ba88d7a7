pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;
pub mod sequence;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::Repository;
pub use sequence::{next_number, NumberKind};
