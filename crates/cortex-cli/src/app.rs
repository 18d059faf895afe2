use anyhow::{Context, Result};
use cortex_core::{
    ChatSession, Conversation, ConversationMetadata, ConversationStore, CortexError, Message,
    ModelId, ModelRouter, Role, Settings,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{self, CommandResult};
use crate::theme::Theme;

// ── Single-prompt mode ──────────────────────────────────────────────────

/// Send one prompt, print the reply, persist the exchange and exit.
pub async fn run_single_prompt(
    settings: &Settings,
    store: &ConversationStore,
    prompt: &str,
    conversation_id: Option<&str>,
) -> Result<()> {
    let router = ModelRouter::from_settings(settings)?;
    let mut conversation = match conversation_id {
        Some(id) => store.load(id)?,
        None => Conversation::new(next_title(store)),
    };

    let profile = settings.profile_context();
    let session = ChatSession::new(store, &router);
    let reply = session
        .send(
            &mut conversation,
            prompt,
            &settings.llm.model,
            profile.as_deref(),
        )
        .await?;

    println!("{reply}");
    eprintln!("[conversation: {}]", conversation.id());
    Ok(())
}

// ── Subcommands ─────────────────────────────────────────────────────────

pub fn list_conversations(store: &ConversationStore, theme: &Theme) -> Result<()> {
    let conversations = store.list_metadata()?;
    if conversations.is_empty() {
        println!("{}", theme.info_text("No saved conversations."));
    } else {
        println!("{}", format_conversation_list(&conversations));
    }
    Ok(())
}

pub fn show_conversation(store: &ConversationStore, id: &str, theme: &Theme) -> Result<()> {
    let conversation = store.load(id)?;
    println!(
        "{}",
        theme.paint(&format!("# {}", conversation.title()), theme.accent)
    );
    for message in conversation.messages() {
        print_message(message, conversation.model(), theme);
    }
    Ok(())
}

pub fn delete_conversation(store: &ConversationStore, id: &str, theme: &Theme) -> Result<()> {
    store.delete(id)?;
    println!("{}", theme.paint(&format!("Deleted {id}"), theme.success));
    Ok(())
}

pub fn print_models(settings: &Settings, theme: &Theme) {
    println!("{}", format_model_list(&settings.llm.model));
    println!("{}", theme.info_text("Use --model <id> or /model <id> to switch."));
}

// ── Interactive REPL ────────────────────────────────────────────────────

struct AppState {
    settings: Settings,
    config_path: PathBuf,
    store: ConversationStore,
    router: Option<ModelRouter>,
    router_error: Option<String>,
    conversation: Conversation,
    theme: Theme,
    should_quit: bool,
}

impl AppState {
    fn print_info(&self, text: &str) {
        println!("{}", self.theme.info_text(text));
    }

    fn print_error(&self, text: &str) {
        println!("{}", self.theme.error_text(text));
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save_to(&self.config_path) {
            tracing::warn!("Failed to save settings: {}", e);
            self.print_error(&format!("Failed to save settings: {e}"));
        }
    }

    fn start_new_conversation(&mut self) {
        self.conversation = Conversation::new(next_title(&self.store));
    }
}

pub async fn run_repl(
    settings: Settings,
    config_path: PathBuf,
    store: ConversationStore,
    conversation_id: Option<&str>,
) -> Result<()> {
    let theme = Theme::by_name(&settings.ui.theme);
    let (router, router_error) = match ModelRouter::from_settings(&settings) {
        Ok(router) => (Some(router), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let conversation = match conversation_id {
        Some(id) => store
            .load(id)
            .with_context(|| format!("Could not open conversation {id}"))?,
        None => Conversation::new(next_title(&store)),
    };

    let mut state = AppState {
        settings,
        config_path,
        store,
        router,
        router_error,
        conversation,
        theme,
        should_quit: false,
    };

    println!(
        "{}",
        state
            .theme
            .paint(&format!("Cortex v{}", env!("CARGO_PKG_VERSION")), state.theme.accent)
    );
    state.print_info(&format!(
        "Model: {} · Theme: {} · /help for commands",
        state.settings.llm.model, state.theme.name
    ));
    if let Some(ref e) = state.router_error {
        state.print_error(e);
    }
    if !state.conversation.is_empty() {
        for message in state.conversation.messages() {
            print_message(message, state.conversation.model(), &state.theme);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !state.should_quit {
        print!("{}", state.theme.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match commands::handle_command(input) {
            CommandResult::NotACommand => send_message(&mut state, input).await,
            result => handle_command_result(&mut state, result),
        }
    }

    Ok(())
}

async fn send_message(state: &mut AppState, input: &str) {
    let Some(router) = state.router.as_ref() else {
        let reason = state
            .router_error
            .clone()
            .unwrap_or_else(|| "No model router available".to_string());
        state.print_error(&reason);
        return;
    };

    let profile = state.settings.profile_context();
    let model = state.settings.llm.model.clone();
    let session = ChatSession::new(&state.store, router);

    print!("{}", state.theme.assistant_label(&model));
    let _ = std::io::stdout().flush();

    let assistant_color = state.theme.assistant_color;
    let theme = state.theme.clone();
    let result = session
        .send_streaming(
            &mut state.conversation,
            input,
            &model,
            profile.as_deref(),
            |delta| {
                print!("{}", theme.paint(delta, assistant_color));
                let _ = std::io::stdout().flush();
            },
        )
        .await;

    println!();
    if let Err(e) = result {
        match e {
            CortexError::Remote(_) => state.print_error(&format!("❌ {e}")),
            CortexError::UnknownModel(_) => state.print_error(&format!(
                "{e}. Available: {}",
                model_aliases().join(", ")
            )),
            other => state.print_error(&other.to_string()),
        }
    }
}

fn handle_command_result(state: &mut AppState, result: CommandResult) {
    match result {
        CommandResult::Message(msg) => println!("{msg}"),
        CommandResult::Quit => state.should_quit = true,
        CommandResult::NotACommand => {}

        CommandResult::ModelChanged(name) => match ModelId::parse(&name) {
            Ok(id) => {
                state.settings.llm.model = id.alias().to_string();
                state.save_settings();
                state.print_info(&format!("Model changed to: {} ({})", id.display_name(), id));
            }
            Err(e) => state.print_error(&format!(
                "{e}. Available: {}",
                model_aliases().join(", ")
            )),
        },
        CommandResult::ListModels => println!("{}", format_model_list(&state.settings.llm.model)),
        CommandResult::ThemeChanged(name) => match Theme::parse(&name) {
            Ok(theme) => {
                state.theme = theme;
                state.settings.ui.theme = state.theme.name.to_string();
                state.save_settings();
                state.print_info(&format!("Theme changed to: {}", state.theme.name));
            }
            Err(message) => state.print_error(&message),
        },
        CommandResult::ShowStatus => {
            let status = format!(
                "Model: {}\nTheme: {}\nConversation: {} ({}, {} messages)\nProfile: {}",
                state.settings.llm.model,
                state.theme.name,
                state.conversation.title(),
                state.conversation.id(),
                state.conversation.len(),
                if state.settings.profile.is_empty() { "not set" } else { "set" },
            );
            println!("{status}");
        }

        CommandResult::ShowProfile => {
            let p = &state.settings.profile;
            if p.is_empty() {
                state.print_info("Profile is empty. Use /profile <field> <value> to fill it in.");
            } else {
                println!(
                    "Name:    {}\nEmail:   {}\nMobile:  {}\nAddress: {}\nAbout:   {}",
                    p.name, p.email, p.mobile, p.address, p.about
                );
            }
        }
        CommandResult::SetProfileField { field, value } => {
            if field == "clear" {
                state.settings.profile = Default::default();
                state.save_settings();
                state.print_info("Profile cleared.");
            } else if state.settings.profile.set_field(&field, value) {
                state.save_settings();
                state.print_info(&format!("Profile {field} updated."));
            } else {
                state.print_error(&format!(
                    "Unknown profile field: {field}. Fields: {}",
                    cortex_core::UserProfile::FIELDS.join(", ")
                ));
            }
        }

        CommandResult::NewConversation => {
            state.start_new_conversation();
            state.print_info(&format!("Started {}", state.conversation.title()));
        }
        CommandResult::ListConversations => match state.store.list_metadata() {
            Ok(convs) if convs.is_empty() => state.print_info("No saved conversations."),
            Ok(convs) => {
                println!("{}", format_conversation_list(&convs));
                state.print_info("Use /load <id> to resume a conversation.");
            }
            Err(e) => state.print_error(&format!("Failed to list conversations: {e}")),
        },
        CommandResult::LoadConversation(id) => match state.store.load(&id) {
            Ok(conv) => {
                state.conversation = conv;
                state.print_info(&format!(
                    "Loaded conversation: {}",
                    state.conversation.title()
                ));
                for message in state.conversation.messages() {
                    print_message(message, state.conversation.model(), &state.theme);
                }
            }
            Err(e) => state.print_error(&format!("Failed to load conversation: {e}")),
        },
        CommandResult::DeleteConversation(id) => match state.store.delete(&id) {
            Ok(()) => {
                if state.conversation.id() == id {
                    state.start_new_conversation();
                }
                state.print_info(&format!("Deleted {id}"));
            }
            Err(e) => state.print_error(&format!("Failed to delete conversation: {e}")),
        },
        CommandResult::RenameConversation(title) => {
            if state.store.exists(state.conversation.id()) {
                match state.store.rename(state.conversation.id(), &title) {
                    Ok(conv) => state.conversation = conv,
                    Err(e) => {
                        state.print_error(&format!("Failed to rename conversation: {e}"));
                        return;
                    }
                }
            } else {
                state.conversation.rename(title);
            }
            state.print_info(&format!("Renamed to: {}", state.conversation.title()));
        }
        CommandResult::ClearAll => match state.store.clear() {
            Ok(n) => {
                state.start_new_conversation();
                state.print_info(&format!("All conversations cleared ({n})."));
            }
            Err(e) => state.print_error(&format!("Failed to clear conversations: {e}")),
        },
    }
}

// ── Rendering helpers ───────────────────────────────────────────────────

fn print_message(message: &Message, model: Option<&str>, theme: &Theme) {
    match message.role {
        Role::User => println!("{}{}", theme.prompt(), message.content),
        _ => println!(
            "{}{}",
            theme.assistant_label(model.unwrap_or("assistant")),
            theme.paint(&message.content, theme.assistant_color)
        ),
    }
}

fn model_aliases() -> Vec<&'static str> {
    ModelId::all().iter().map(|m| m.alias()).collect()
}

/// Default title for a new conversation: "Chat N".
fn next_title(store: &ConversationStore) -> String {
    let count = store.list().map(|ids| ids.len()).unwrap_or(0);
    format!("Chat {}", count + 1)
}

pub(crate) fn format_model_list(current: &str) -> String {
    let current = ModelId::parse(current).ok();
    let mut out = String::from("Available models:\n");
    for id in ModelId::all() {
        let spec = id.spec();
        let marker = if Some(*id) == current { "*" } else { " " };
        out.push_str(&format!(
            "{} {:<15} {:<16} {}\n",
            marker,
            id.alias(),
            spec.display_name(),
            spec.slug()
        ));
    }
    out.trim_end().to_string()
}

pub(crate) fn format_conversation_list(convs: &[ConversationMetadata]) -> String {
    let mut list = String::from("Saved conversations:\n");
    for c in convs {
        list.push_str(&format!(
            "  {} | {} | {} msgs | {}\n",
            c.id,
            c.title,
            c.message_count,
            c.updated_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    list.trim_end().to_string()
}
