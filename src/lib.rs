pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
