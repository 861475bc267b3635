use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Line reader over stdin shared by everything that asks the user something.
pub struct ConsoleInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Next trimmed line, or `None` once stdin is closed.
    pub async fn read_line(&self) -> Option<String> {
        match self.lines.lock().await.next_line().await {
            Ok(line) => line.map(|l| l.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to read from stdin: {}", e);
                None
            }
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}
