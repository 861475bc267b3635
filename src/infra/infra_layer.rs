// The infra module contains implementations of core traits.
// Each port implementation goes in its own submodule.

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "google_docs/mod.rs"]
pub mod google_docs;
