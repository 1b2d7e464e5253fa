use std::str::FromStr;

use crate::agent::{self, AgentInfo};
use crate::error::RegistryError;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Switch to another agent (cad, mesh, simulation)
    Agent,
    /// Return to the agent picker
    Agents,
    /// Start a fresh conversation with the current agent
    New,
    /// Exit the application
    Bye,
    /// Show help
    Help,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Target of `/agent <id>`. `None` when this is not an `/agent` command
    /// or no id was given.
    pub fn agent_target(&self) -> Option<Result<&'static AgentInfo, RegistryError>> {
        if self.command != SlashCommand::Agent {
            return None;
        }
        self.argument().map(agent::resolve)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Agent => "switch to another agent (cad, mesh, simulation)",
            SlashCommand::Agents => "return to the agent picker",
            SlashCommand::New => "start a fresh conversation with this agent",
            SlashCommand::Bye => "exit the application",
            SlashCommand::Help => "show available commands",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter()
        .map(|c| (c.command(), c))
        .collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim_start().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let rest: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "a" | "switch" => Some(SlashCommand::Agent),
        "home" | "list" => Some(SlashCommand::Agents),
        "clear" | "reset" => Some(SlashCommand::New),
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
    let mut help = String::from("Commands: ");
    let names: Vec<String> = built_in_slash_commands()
        .into_iter()
        .map(|(command_str, _)| format!("/{command_str}"))
        .collect();
    help.push_str(&names.join("  "));
    help.push_str("  ·  /agent <cad|mesh|simulation> switches agent (conversation restarts)");
    help
}
