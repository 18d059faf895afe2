// Library interface for cortex-cli so integration tests can reach the
// command parser and themes. main.rs declares the same files, hence #[path].

#[path = "commands.rs"]
pub mod commands;

#[path = "theme.rs"]
pub mod theme;

pub use commands::{handle_command, CommandResult};
pub use theme::Theme;
