// handlers/public/mod.rs - endpoints that need no token
//
// Route prefix: none (/, /health, /auth/*)

pub mod auth;
pub mod root;

pub use root::{health, root};
