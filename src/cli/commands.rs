use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::core::docs::{
    extract_doc_id, extract_tab_id, BatchUpdateRequest, DocsApi, DocumentSpecifier,
};

#[derive(Debug, Parser)]
#[command(
    name = "docs_bridge",
    version,
    about = "Call document methods and edit Google Docs from the terminal"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Keep credentials in memory instead of on disk")]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Call a method through the Apps Script bridge
    Call {
        #[arg(help = "Document URL or id")]
        document: String,
        #[arg(help = "Method name, e.g. getFields")]
        method: String,
        #[arg(long, default_value = "[]", help = "JSON array of positional arguments")]
        args: String,
        #[arg(long, help = "Tab id (defaults to the tab in the document URL)")]
        tab: Option<String>,
    },
    /// Fetch a document (or one of its tabs) from the REST API
    Get {
        #[arg(help = "Document URL or id")]
        document: String,
        #[arg(long, help = "Tab id (defaults to the tab in the document URL)")]
        tab: Option<String>,
    },
    /// Apply a batch of edit requests read from a JSON file
    BatchUpdate {
        #[arg(help = "Document URL or id")]
        document: String,
        #[arg(help = "File containing {\"requests\": [...]}")]
        requests: PathBuf,
        #[arg(long, help = "Tab id (defaults to the tab in the document URL)")]
        tab: Option<String>,
    },
    /// Forget the stored Google credentials
    Logout,
}

/// Document id plus the explicit tab, or the one selected in the URL.
fn target(document: &str, tab: Option<String>) -> anyhow::Result<(String, Option<String>)> {
    let id = extract_doc_id(document)
        .ok_or_else(|| anyhow!("Could not extract document ID from: {}", document))?;
    Ok((id, tab.or_else(|| extract_tab_id(document))))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(api: &DocsApi, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Call {
            document,
            method,
            args,
            tab,
        } => {
            let (id, tab) = target(&document, tab)?;
            let args: Value = serde_json::from_str(&args).context("--args must be JSON")?;
            let specifier = DocumentSpecifier::new(id).with_tab(tab.clone());

            let response = api.run(&specifier, &method, args, tab.as_deref()).await?;
            print_json(&response)
        }
        Command::Get { document, tab } => {
            let (id, tab) = target(&document, tab)?;

            match api.get_document(&id, tab.as_deref()).await {
                Ok(Some(found)) => print_json(&found),
                Ok(None) => bail!("Tab {} not found in document", tab.unwrap_or_default()),
                Err(e) if e.is_server_fault() => {
                    tracing::warn!(
                        "Docs REST API failed {} time(s) in a row for this document; \
                         the `call` subcommand goes through the script bridge instead",
                        api.failure_count(&id)
                    );
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::BatchUpdate {
            document,
            requests,
            tab,
        } => {
            let (id, tab) = target(&document, tab)?;
            let raw = tokio::fs::read_to_string(&requests)
                .await
                .with_context(|| format!("Failed to read {}", requests.display()))?;
            let body: BatchUpdateRequest = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a batch update body", requests.display()))?;

            let reply = api.batch_update_document(&id, tab.as_deref(), body).await?;
            print_json(&reply)
        }
        Command::Logout => {
            let email = api.auth().credentials().await.last_email;
            api.auth().reset_auth().await;
            match email {
                Some(email) => println!("Signed out {}", email),
                None => println!("Signed out"),
            }
            Ok(())
        }
    }
}
