// ABOUTME: Library root for ephem - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod output;
pub mod remote;
pub mod store;
pub mod types;
