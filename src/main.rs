// This is the entry point of the Google Docs bridge.
//
// **Architecture Overview:**
// - `core/` = Docs client logic and the ports it needs (platform-agnostic)
// - `infra/` = Implementations of core traits (HTTP, credential files)
// - `cli/` = Terminal adapters (prompts, auth window, subcommands)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Route auth window events back into the auth manager
// 4. Run the requested subcommand and report its outcome

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use crate::cli::{Cli, ConsoleInput, ConsolePrompter, ConsoleWindows};
use crate::core::auth::{AuthManager, CredentialStore};
use crate::core::config::DocsConfig;
use crate::core::docs::{DocsApi, DocsError};
use crate::infra::auth::{InMemoryCredentialStore, JsonCredentialStore};
use crate::infra::google_docs::ReqwestTransport;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so command output on stdout stays valid JSON.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<DocsError>() {
                // The user already saw a prompt about this one.
                Some(docs) if docs.already_reported => {}
                Some(docs) if docs.is_alert() => eprintln!("{}", docs),
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Arc::new(DocsConfig::from_env()?);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let transport = Arc::new(ReqwestTransport::new()?);

    let store: Arc<dyn CredentialStore> = if cli.no_persist {
        Arc::new(InMemoryCredentialStore::new())
    } else {
        Arc::new(JsonCredentialStore::new(config.credentials_path.clone()))
    };

    let input = Arc::new(ConsoleInput::new());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let windows = Arc::new(ConsoleWindows::new(
        input.clone(),
        config.oauth.callback_url.clone(),
        events_tx,
    ));
    let prompter = Arc::new(ConsolePrompter::new(input));

    let auth = Arc::new(
        AuthManager::new(
            config.oauth.clone(),
            transport.clone(),
            windows.clone(),
            store,
        )
        .await,
    );

    // Window navigation and close events complete or cancel pending sign-ins.
    let router_auth = Arc::clone(&auth);
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            router_auth.handle_window_event(event).await;
        }
    });

    let api = DocsApi::new(config, auth, transport, prompter, windows);

    cli::commands::execute(&api, cli.command).await
}
