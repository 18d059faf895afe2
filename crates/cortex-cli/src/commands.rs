/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Quit the application.
    Quit,
    /// Change the model.
    ModelChanged(String),
    /// List the model catalog.
    ListModels,
    /// Change the theme.
    ThemeChanged(String),
    /// Show the active profile.
    ShowProfile,
    /// Set one profile field.
    SetProfileField { field: String, value: String },
    /// Start a fresh conversation.
    NewConversation,
    /// List saved conversations.
    ListConversations,
    /// Load conversation by ID.
    LoadConversation(String),
    /// Delete conversation by ID.
    DeleteConversation(String),
    /// Rename the current conversation.
    RenameConversation(String),
    /// Delete every saved conversation.
    ClearAll,
    /// Show status (model, theme, conversation).
    ShowStatus,
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,

        // Conversation commands
        "/new" => CommandResult::NewConversation,
        "/list" | "/conversations" | "/history" => CommandResult::ListConversations,
        "/load" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /load <conversation-id>".into())
            } else {
                CommandResult::LoadConversation(arg.to_string())
            }
        }
        "/delete" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /delete <conversation-id>".into())
            } else {
                CommandResult::DeleteConversation(arg.to_string())
            }
        }
        "/rename" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /rename <new title>".into())
            } else {
                CommandResult::RenameConversation(arg.to_string())
            }
        }
        "/clear-all" => CommandResult::ClearAll,

        // Model & display
        "/model" => {
            if arg.is_empty() {
                CommandResult::ShowStatus
            } else {
                CommandResult::ModelChanged(arg.to_string())
            }
        }
        "/models" => CommandResult::ListModels,
        "/theme" => {
            if arg.is_empty() {
                let themes = crate::theme::Theme::all_names().join(", ");
                CommandResult::Message(format!("Available themes: {themes}\nUsage: /theme <theme-name>"))
            } else {
                CommandResult::ThemeChanged(arg.to_string())
            }
        }
        "/status" => CommandResult::ShowStatus,

        // Profile
        "/profile" => {
            if arg.is_empty() {
                return CommandResult::ShowProfile;
            }
            let mut fields = arg.splitn(2, ' ');
            let field = fields.next().unwrap_or("").to_lowercase();
            let value = fields.next().map(str::trim).unwrap_or("");
            CommandResult::SetProfileField {
                field,
                value: value.to_string(),
            }
        }

        "/version" => CommandResult::Message(format!("Cortex CLI v{}", env!("CARGO_PKG_VERSION"))),

        // Unknown command
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
╭─ Cortex Commands ──────────────────────────────────────────────╮

  CONVERSATIONS
    /new                      Start a fresh conversation
    /list, /history           List saved conversations
    /load <id>                Load conversation by ID
    /delete <id>              Delete conversation by ID
    /rename <title>           Rename the current conversation
    /clear-all                Delete every saved conversation

  MODEL & DISPLAY
    /model <id>               Switch model (gpt-3.5-turbo, claude-3-haiku, llama-3.1-8b)
    /models                   List available models
    /theme <name>             Change color theme
    /status                   Show model, theme and conversation

  PROFILE
    /profile                  Show your profile
    /profile <field> <value>  Set name, email, mobile, address or about
    /profile clear            Forget the whole profile

  OTHER
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit

╰────────────────────────────────────────────────────────────────╯";

    CommandResult::Message(help_text.into())
}
