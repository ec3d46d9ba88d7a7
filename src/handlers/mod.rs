// handlers/mod.rs - two tiers of HTTP handlers
//
// Public (no auth) → Protected (JWT + active user + resolved scope)

pub mod protected;
pub mod public;
