use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;
mod theme;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Cortex - chat with hosted language models from your terminal")]
#[command(version)]
struct Cli {
    /// Run a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Model to use (gpt-3.5-turbo, claude-3-haiku, llama-3.1-8b)
    #[arg(short, long)]
    model: Option<String>,

    /// Color theme (dark, light, dracula)
    #[arg(long)]
    theme: Option<String>,

    /// Resume a saved conversation by ID
    #[arg(short, long)]
    conversation: Option<String>,

    /// Directory holding saved conversations
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Settings file to read and update
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List saved conversations
    List,
    /// Print a saved conversation
    Show { id: String },
    /// Delete a saved conversation
    Delete { id: String },
    /// List available models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(cortex_core::Settings::config_path);
    let mut settings = cortex_core::Settings::load_from(&config_path);

    if let Some(ref model) = cli.model {
        let id = cortex_core::ModelId::parse(model)?;
        settings.llm.model = id.alias().to_string();
    }
    if let Some(ref name) = cli.theme {
        let theme = theme::Theme::parse(name).map_err(anyhow::Error::msg)?;
        settings.ui.theme = theme.name.to_string();
    }

    let store = match cli.data_dir {
        Some(ref dir) => cortex_core::ConversationStore::with_dir(dir.clone())?,
        None => cortex_core::ConversationStore::open_default()?,
    };
    let theme = theme::Theme::by_name(&settings.ui.theme);

    match cli.command {
        Some(Command::List) => app::list_conversations(&store, &theme)?,
        Some(Command::Show { id }) => app::show_conversation(&store, &id, &theme)?,
        Some(Command::Delete { id }) => app::delete_conversation(&store, &id, &theme)?,
        Some(Command::Models) => app::print_models(&settings, &theme),
        None => {
            if let Some(prompt) = cli.prompt {
                app::run_single_prompt(&settings, &store, &prompt, cli.conversation.as_deref())
                    .await?;
            } else {
                app::run_repl(settings, config_path, store, cli.conversation.as_deref()).await?;
            }
        }
    }

    Ok(())
}
