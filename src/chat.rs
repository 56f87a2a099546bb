use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use strum::IntoEnumIterator;

use crate::commands::{get_help_text, parse_slash_command, ParsedCommand, SlashCommand};
use crate::config::Config;
use crate::dispatcher::{AttemptOutcome, DispatchAttempt, Dispatcher, RetryPolicy};
use crate::events::LearningMode;
use crate::export::write_export;
use crate::llm::GeminiClient;
use crate::prompts::mode_guidance;
use crate::session::Session;

const NO_MODELS_HELP: &str = "❌ No models available for your API key.

Possible solutions:
  1. Check your API key is valid at https://aistudio.google.com/app/apikey
  2. Generate a new API key
  3. Make sure the Gemini API is enabled for your project";

/// What the REPL should do after handling a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Exit,
}

/// Interactive study session on stdin/stdout
pub struct ChatRepl {
    config: Config,
    dispatcher: Dispatcher<GeminiClient>,
    session: Session,
    models: Vec<String>,
}

impl ChatRepl {
    /// Connect, discover models and open a session
    pub async fn start(config: Config, model: Option<String>, mode: Option<LearningMode>) -> Result<Self> {
        let client = GeminiClient::new(&config)?;
        let models = client
            .list_models()
            .await
            .context("Error fetching models")?;
        if models.is_empty() {
            bail!(NO_MODELS_HELP);
        }

        let model = select_model(model.as_deref(), config.default_model.as_deref(), &models)?;
        let dispatcher = Dispatcher::new(client, RetryPolicy::from(&config.rate_limit))
            .with_observer(|attempt| {
                if let Some(notice) = retry_notice(attempt) {
                    println!("{}", notice);
                }
            });
        let session = Session::new(
            dispatcher.endpoint().start_chat(&model),
            mode.unwrap_or(config.default_mode),
        );

        tracing::info!(session = %session.session_id, %model, "session started");

        Ok(Self {
            config,
            dispatcher,
            session,
            models,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("🧠 AI-Powered Learning Assistant");
        println!("{}", "=".repeat(50));
        println!("Your personal tutor for any subject.");
        println!();
        println!("✅ Found {} model(s). Using: {}", self.models.len(), self.session.model());
        println!("🎯 Mode: {} - {}", self.session.mode(), mode_guidance(self.session.mode()));
        println!("💡 Type /help for commands, /bye to leave.");
        println!();

        loop {
            print!("💭 You: ");
            io::stdout().flush()?;

            let mut input = String::new();
            let read = io::stdin()
                .read_line(&mut input)
                .context("Failed to read user input")?;
            if read == 0 {
                println!();
                break;
            }

            if self.handle_line(input.trim()).await? == ReplAction::Exit {
                break;
            }
        }

        println!("👋 Happy studying!");
        Ok(())
    }

    async fn handle_line(&mut self, input: &str) -> Result<ReplAction> {
        if input.is_empty() {
            return Ok(ReplAction::Continue);
        }

        match parse_slash_command(input) {
            Some(command) => self.handle_slash_command(command).await,
            None if input.starts_with('/') => {
                println!("❓ Unknown command. Type /help to see what's available.");
                Ok(ReplAction::Continue)
            }
            None => {
                self.send(input).await;
                Ok(ReplAction::Continue)
            }
        }
    }

    /// Dispatch one message and print the outcome
    async fn send(&mut self, prompt: &str) {
        println!("🤔 Thinking...");

        match self.dispatcher.dispatch(&mut self.session, prompt).await {
            Ok(reply) => {
                println!();
                println!("🧠 Assistant:");
                println!("{}", reply);
                println!();
                self.session.record_message();
            }
            Err(err) if err.is_rate_limited() => {
                println!("❌ Rate Limit Exceeded - {}", err);
                println!("Please wait 1-2 minutes before sending another message.");
            }
            Err(err) => {
                println!("❌ Error: {}", err);
            }
        }
    }

    async fn handle_slash_command(&mut self, command: ParsedCommand) -> Result<ReplAction> {
        if let Some(action) = command.command.quick_action() {
            let prompt = action.prompt(self.session.mode());
            println!("📚 {}", prompt);
            self.send(&prompt).await;
            return Ok(ReplAction::Continue);
        }

        match command.command {
            SlashCommand::Clear => {
                let conversation = self.dispatcher.endpoint().start_chat(self.session.model());
                self.session.clear(conversation);
                println!("🗑️ Conversation cleared.");
            }
            SlashCommand::Export => self.export(),
            SlashCommand::Model => self.handle_model(command.argument()),
            SlashCommand::Mode => self.handle_mode(&command),
            SlashCommand::Stats => self.print_stats(),
            SlashCommand::Help => println!("{}", get_help_text()),
            SlashCommand::Bye => return Ok(ReplAction::Exit),
            SlashCommand::Quiz | SlashCommand::Tips | SlashCommand::Practice => {}
        }

        Ok(ReplAction::Continue)
    }

    fn export(&self) {
        if self.session.conversation().history().is_empty() {
            println!("📭 Nothing to export yet.");
            return;
        }

        match write_export(&self.session, &self.config.export_dir()) {
            Ok(path) => println!("📥 Exported to {}", path.display()),
            Err(err) => {
                tracing::warn!(error = format!("{err:#}"), "export failed");
                println!("❌ Error: {:#}", err);
            }
        }
    }

    fn handle_model(&mut self, requested: Option<&str>) {
        let Some(requested) = requested else {
            println!("📱 Available models:");
            for model in &self.models {
                let marker = if model == self.session.model() { "•" } else { " " };
                println!("  {} {}", marker, model);
            }
            return;
        };

        match find_model(requested, &self.models) {
            Some(model) if model == self.session.model() => {
                println!("ℹ️ Already using {}", model);
            }
            Some(model) => {
                let conversation = self.dispatcher.endpoint().start_chat(model);
                self.session.switch_model(conversation);
                tracing::info!(session = %self.session.session_id, %model, "switched model");
                println!("✅ Switched to {}", model);
            }
            None => println!("❌ Model '{}' is not available. Use /model to list models.", requested),
        }
    }

    fn handle_mode(&mut self, command: &ParsedCommand) {
        if command.argument().is_none() {
            println!("🎯 Learning modes:");
            for mode in LearningMode::iter() {
                let marker = if mode == self.session.mode() { "•" } else { " " };
                println!("  {} {:<12} {}", marker, mode.display_name(), mode.description());
            }
            return;
        }

        match command.mode_target() {
            Some(mode) => {
                self.session.set_mode(mode);
                println!("🎯 Mode: {} - {}", mode, mode_guidance(mode));
            }
            None => println!("❌ Unknown mode. Use /mode to list modes."),
        }
    }

    fn print_stats(&self) {
        let stats = self.session.stats();
        println!("📊 Session Info");
        println!("  Model:    {}", stats.model);
        println!("  Requests: {}", stats.requests);
        println!("  Messages: {}", stats.messages);
        println!("  Mode:     {}", stats.mode);
        println!("  Started:  {}", stats.started_at.format("%Y-%m-%d %H:%M UTC"));
        if stats.rate_limit_hit {
            println!("  ⚠️ Rate limit recently hit");
        }
    }
}

/// Send a single message and print the reply
pub async fn ask_once(
    config: Config,
    model: Option<String>,
    mode: Option<LearningMode>,
    message: &str,
) -> Result<()> {
    let mut repl = ChatRepl::start(config, model, mode).await?;
    let reply = repl.dispatcher.dispatch(&mut repl.session, message).await?;
    println!("{}", reply);
    Ok(())
}

/// Print the chat-capable models
pub async fn list_models(config: &Config) -> Result<()> {
    let client = GeminiClient::new(config)?;
    let models = client.list_models().await.context("Error fetching models")?;

    if models.is_empty() {
        println!("{}", NO_MODELS_HELP);
        return Ok(());
    }

    println!("📱 Available models ({}):", models.len());
    for model in models {
        println!("  • {}", model);
    }
    Ok(())
}

fn find_model<'a>(requested: &str, models: &'a [String]) -> Option<&'a str> {
    let wanted = requested.trim();
    let wanted = wanted.strip_prefix("models/").unwrap_or(wanted);
    models.iter().map(String::as_str).find(|m| *m == wanted)
}

/// Pick the session model: an explicit request must exist, a configured
/// default falls back to the first listed model.
fn select_model(requested: Option<&str>, configured: Option<&str>, models: &[String]) -> Result<String> {
    if let Some(requested) = requested {
        return find_model(requested, models)
            .map(str::to_string)
            .with_context(|| format!("Model '{}' is not available. Run `learnr models` to list models.", requested));
    }

    if let Some(configured) = configured {
        if let Some(model) = find_model(configured, models) {
            return Ok(model.to_string());
        }
        tracing::warn!(model = configured, "configured default model is not available");
    }

    models
        .first()
        .cloned()
        .context("No models available")
}

fn retry_notice(attempt: &DispatchAttempt) -> Option<String> {
    match (attempt.outcome, attempt.backoff) {
        (AttemptOutcome::RetryableFailure, Some(wait)) => Some(format!(
            "⏳ Rate limit reached. Retrying in {} seconds... (Attempt {}/{})",
            format_secs(wait.as_secs_f64()),
            attempt.index + 1,
            attempt.max_attempts
        )),
        _ => None,
    }
}

fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.1}", secs)
    }
}
