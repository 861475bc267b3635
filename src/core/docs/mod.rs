pub mod docs_error;
pub mod docs_models;
pub mod document_ids;
pub mod document_service;
pub mod prompts;
pub mod rpc_service;
pub mod tab_addressing;

pub use docs_error::DocsError;
pub use docs_models::{BatchUpdateRequest, DocumentSpecifier};
pub use document_ids::{extract_doc_id, extract_tab_id};
pub use prompts::{ConfirmPrompt, PromptResult, UserPrompter};
pub use rpc_service::DocsApi;
