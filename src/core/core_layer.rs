// The core module contains the Docs client logic and the ports it talks
// through. Nothing in here performs I/O directly.

#[path = "http.rs"]
pub mod http;

#[path = "config.rs"]
pub mod config;

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "docs/mod.rs"]
pub mod docs;

#[cfg(test)]
#[path = "testing.rs"]
pub mod testing;
