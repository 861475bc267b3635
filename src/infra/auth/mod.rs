// Credential persistence.
// - `json_store.rs` keeps credentials in a JSON file between runs.
// - `in_memory_store.rs` keeps them for the lifetime of the process only.

#[path = "json_store.rs"]
pub mod json_store;

#[path = "in_memory_store.rs"]
pub mod in_memory_store;

pub use in_memory_store::InMemoryCredentialStore;
pub use json_store::JsonCredentialStore;
