// CLI layer - the console stands in for the browser and dialog boxes, and
// each subcommand maps onto one Docs operation.

#[path = "console_input.rs"]
pub mod console_input;

#[path = "console_prompter.rs"]
pub mod console_prompter;

#[path = "console_windows.rs"]
pub mod console_windows;

#[path = "commands.rs"]
pub mod commands;

pub use commands::Cli;
pub use console_input::ConsoleInput;
pub use console_prompter::ConsolePrompter;
pub use console_windows::ConsoleWindows;
