#[macro_use]
pub mod config;

pub mod access;
pub mod auth;
pub mod cli;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;

/// Install the tracing subscriber shared by both binaries (`RUST_LOG`, default `info`)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // A second init (e.g. in tests) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
