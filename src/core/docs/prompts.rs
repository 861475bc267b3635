// User-facing prompts shown while recovering from Docs errors.
//
// The core only decides WHAT to ask and which button means what; the adapter
// behind `UserPrompter` decides how it looks.

use async_trait::async_trait;

pub const AUTHORIZATION_HELP_URL: &str =
    "https://www.zotero.org/support/google_docs#authorization";

/// A confirm-style dialog with up to three buttons.
///
/// For buttons 1 and 2, `None` means the adapter's default label ("OK" and
/// "Cancel") and `Some("")` hides the button. Button 3 only appears when it
/// has a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub button1_text: Option<String>,
    pub button2_text: Option<String>,
    pub button3_text: Option<String>,
}

impl ConfirmPrompt {
    /// Visible buttons as `(number, label)` pairs.
    pub fn buttons(&self) -> Vec<(u8, String)> {
        let label = |text: &Option<String>, default: &str| match text {
            None => Some(default.to_string()),
            Some(t) if t.is_empty() => None,
            Some(t) => Some(t.clone()),
        };

        [
            (1, label(&self.button1_text, "OK")),
            (2, label(&self.button2_text, "Cancel")),
            (3, self.button3_text.clone().filter(|t| !t.is_empty())),
        ]
        .into_iter()
        .filter_map(|(n, text)| text.map(|t| (n, t)))
        .collect()
    }
}

/// Which button the user pressed (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptResult {
    pub button: u8,
}

#[async_trait]
pub trait UserPrompter: Send + Sync {
    async fn confirm(&self, prompt: ConfirmPrompt) -> PromptResult;
}

/// Single "OK" plus a help button.
fn with_help(client_name: &str, message: String, help_label: &str) -> ConfirmPrompt {
    ConfirmPrompt {
        title: client_name.to_string(),
        message,
        button1_text: None,
        button2_text: Some(String::new()),
        button3_text: Some(help_label.to_string()),
    }
}

pub fn document_locked(client_name: &str) -> ConfirmPrompt {
    with_help(
        client_name,
        format!(
            "{0} cannot update this document right now because another {0} operation \
             is still working on it. Wait a few moments and try again.",
            client_name
        ),
        "Need Help?",
    )
}

pub fn document_locked_more_info(client_name: &str) -> ConfirmPrompt {
    ConfirmPrompt {
        title: client_name.to_string(),
        message: format!(
            "If no other {0} operation is running on this document, a previous one may \
             have stopped before finishing. {0} can unlock the document now, but doing so \
             while another update is running may corrupt citations.\n\nUnlock the document?",
            client_name
        ),
        button1_text: Some("Yes".to_string()),
        button2_text: Some("No".to_string()),
        button3_text: None,
    }
}

pub fn auth_scope_error(client_name: &str) -> ConfirmPrompt {
    with_help(
        client_name,
        format!(
            "{0} needs permission to edit your Google Docs documents. Sign in again and \
             make sure the permission to see, edit, create and delete documents is checked.",
            client_name
        ),
        "More Info",
    )
}

pub fn document_permission_error(client_name: &str) -> ConfirmPrompt {
    with_help(
        client_name,
        format!(
            "{0} could not access this document. Make sure the Google account you \
             authorized {0} with can edit it, then try again.",
            client_name
        ),
        "More Info",
    )
}
