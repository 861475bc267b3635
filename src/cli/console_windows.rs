// Console stand-in for the browser window used during authorization.
//
// The authorize URL is printed for the user to open. The user then pastes the
// address the provider redirected to, which is reported back as a navigation
// event. An empty line (or closed stdin) counts as closing the window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::console_input::ConsoleInput;
use crate::core::auth::{BrowserWindows, WindowError, WindowEvent, WindowHandle};

pub struct ConsoleWindows {
    input: Arc<ConsoleInput>,
    callback_url: String,
    events: mpsc::UnboundedSender<WindowEvent>,
    next_handle: AtomicU64,
}

impl ConsoleWindows {
    pub fn new(
        input: Arc<ConsoleInput>,
        callback_url: impl Into<String>,
        events: mpsc::UnboundedSender<WindowEvent>,
    ) -> Self {
        Self {
            input,
            callback_url: callback_url.into(),
            events,
            next_handle: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl BrowserWindows for ConsoleWindows {
    async fn open_auth_window(&self, url: &str) -> Result<WindowHandle, WindowError> {
        let handle = WindowHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));

        println!("\nOpen this address in your browser to sign in to Google Docs:\n\n{}\n", url);
        println!("Then paste the address you were sent back to (empty line cancels):");

        let input = self.input.clone();
        let callback_url = self.callback_url.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                let line = input.read_line().await.unwrap_or_default();
                if line.is_empty() {
                    let _ = events.send(WindowEvent::Closed { handle });
                    return;
                }

                let done = line.starts_with(&callback_url);
                if events
                    .send(WindowEvent::Navigated { handle, url: line })
                    .is_err()
                    || done
                {
                    return;
                }
                println!("That is not the sign-in callback address, try again:");
            }
        });

        Ok(handle)
    }

    async fn close(&self, handle: WindowHandle) {
        tracing::debug!("Authorization window {} closed", handle);
    }

    async fn open_tab(&self, url: &str) {
        println!("More information: {}", url);
    }
}
