// handlers/protected/mod.rs - endpoints behind jwt_auth_middleware + validate_user_middleware
//
// Route prefix: /api/*
// Every handler receives the validated CurrentUser (with row scope) and the pool.

pub mod auth;
pub mod cases;
pub mod clients;
pub mod dashboard;
pub mod documents;
pub mod find;
pub mod hearings;
pub mod invoices;
pub mod users;
