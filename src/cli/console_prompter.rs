use std::sync::Arc;

use async_trait::async_trait;

use super::console_input::ConsoleInput;
use crate::core::docs::{ConfirmPrompt, PromptResult, UserPrompter};

/// Renders confirm dialogs as numbered choices on the terminal.
pub struct ConsolePrompter {
    input: Arc<ConsoleInput>,
}

impl ConsolePrompter {
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self { input }
    }
}

/// Picks the pressed button from a typed line, if it names a visible one.
fn parse_choice(line: &str, buttons: &[(u8, String)]) -> Option<u8> {
    let choice: u8 = line.parse().ok()?;
    buttons
        .iter()
        .any(|(number, _)| *number == choice)
        .then_some(choice)
}

#[async_trait]
impl UserPrompter for ConsolePrompter {
    async fn confirm(&self, prompt: ConfirmPrompt) -> PromptResult {
        let buttons = prompt.buttons();
        let choices = buttons
            .iter()
            .map(|(number, label)| format!("[{}] {}", number, label))
            .collect::<Vec<_>>()
            .join("  ");

        println!("\n== {} ==\n{}\n", prompt.title, prompt.message);

        loop {
            println!("{}", choices);
            let Some(line) = self.input.read_line().await else {
                // Treat a closed stdin like dismissing the dialog.
                return PromptResult { button: 2 };
            };
            if let Some(button) = parse_choice(&line, &buttons) {
                return PromptResult { button };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_visible_buttons_can_be_chosen() {
        let buttons = vec![(1, "OK".to_string()), (3, "More Info".to_string())];

        assert_eq!(parse_choice("3", &buttons), Some(3));
        assert_eq!(parse_choice("1", &buttons), Some(1));
        assert_eq!(parse_choice("2", &buttons), None);
        assert_eq!(parse_choice("ok", &buttons), None);
    }
}
