pub mod auth_models;
pub mod auth_service;

pub use auth_models::{
    AuthError, AuthHeaders, BrowserWindows, CredentialStore, Credentials, StoreError,
    WindowError, WindowEvent, WindowHandle,
};
pub use auth_service::AuthManager;
