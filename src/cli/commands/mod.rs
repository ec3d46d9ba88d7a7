pub mod invoices;
pub mod migrate;
pub mod server;
pub mod user;
