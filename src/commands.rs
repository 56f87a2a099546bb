use std::str::FromStr;

use crate::events::LearningMode;
use crate::prompts::QuickAction;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a fresh conversation
    Clear,
    /// Write the conversation to a markdown file
    Export,
    /// List models or switch to one
    Model,
    /// Show or change the learning mode
    Mode,
    /// Ask for a quiz on the recent discussion
    Quiz,
    /// Ask for study tips
    Tips,
    /// Ask for a practice problem
    Practice,
    /// Show session info
    Stats,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn mode_target(&self) -> Option<LearningMode> {
        if self.command != SlashCommand::Mode {
            return None;
        }

        let arg = self.argument()?.trim().to_lowercase();
        match arg.as_str() {
            "g" => Some(LearningMode::General),
            "m" | "maths" => Some(LearningMode::Math),
            "s" => Some(LearningMode::Science),
            "p" | "code" | "coding" => Some(LearningMode::Programming),
            "l" | "language" => Some(LearningMode::Languages),
            "h" => Some(LearningMode::History),
            other => LearningMode::from_str(other).ok(),
        }
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "start a fresh conversation and reset counters",
            SlashCommand::Export => "save the conversation as a markdown file",
            SlashCommand::Model => "list available models, or switch with /model <name>",
            SlashCommand::Mode => "show learning modes, or switch with /mode <name>",
            SlashCommand::Quiz => "generate a 5-question quiz on the recent discussion",
            SlashCommand::Tips => "get study tips for the current mode",
            SlashCommand::Practice => "get a practice problem for the current mode",
            SlashCommand::Stats => "show model, request count and mode",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    pub fn quick_action(self) -> Option<QuickAction> {
        match self {
            SlashCommand::Quiz => Some(QuickAction::Quiz),
            SlashCommand::Tips => Some(QuickAction::StudyTips),
            SlashCommand::Practice => Some(QuickAction::PracticeProblem),
            _ => None,
        }
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let rest: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "models" => Some(SlashCommand::Model),
        "reset" => Some(SlashCommand::Clear),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nAliases: /q, /quit, /exit for /bye; /models for /model; /reset for /clear");
    help.push_str("\nModes: general, math, science, programming, languages, history");

    help
}
