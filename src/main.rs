mod chat;
mod commands;
mod config;
mod dispatcher;
mod error;
mod events;
mod export;
mod llm;
mod logging;
mod prompts;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::events::LearningMode;

#[derive(Parser)]
#[command(name = "learnr")]
#[command(version = "0.1.0")]
#[command(about = "AI-powered learning assistant for the terminal", long_about = None)]
struct Cli {
    /// Model to chat with (defaults to the configured or first available model)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Learning mode: general, math, science, programming, languages, history
    #[arg(long, global = true)]
    mode: Option<LearningMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive study session (default)
    Chat,
    /// List models that support chat
    Models,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Store a Gemini API key in ~/.learnr/config.toml
    SetKey { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let mut repl = chat::ChatRepl::start(config, cli.model, cli.mode).await?;
            repl.run().await
        }
        Commands::Models => chat::list_models(&config).await,
        Commands::Ask { message } => {
            chat::ask_once(config, cli.model, cli.mode, &message.join(" ")).await
        }
        Commands::SetKey { key } => {
            config.set_api_key(key.trim().to_string());
            config.save()?;
            println!("🔑 API key saved to {}", config.learnr_home.join("config.toml").display());
            Ok(())
        }
    }
}
