//! Command dispatcher
//!
//! A committed line is split into a command name and its argument tail and
//! looked up in a fixed table. Every handler returns an [`Outcome`]: output to
//! print, a failure to report, or a [`Job`] that has to talk to the backend.
//! Handlers never write to the screen themselves.

pub mod jobs;

use std::collections::HashMap;

use tracing::{debug, warn};

pub use jobs::{Job, JobContext, JobEvent, JobSink};

use crate::core::session::Session;
use crate::credentials::CredentialStore;

pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const RESET: &str = "\x1b[0m";

pub const BUSY_MESSAGE: &str = "Please wait: a response is still streaming.";

pub fn info_line(text: &str) -> String {
    format!("{YELLOW}{text}{RESET}")
}

pub fn output_line(text: &str) -> String {
    format!("{GREEN}{text}{RESET}")
}

pub fn error_line(text: &str) -> String {
    format!("{RED}{text}{RESET}")
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Lines to print, already coloured
    Success(Vec<String>),
    Failure {
        reason: String,
        hint: Option<String>,
    },
    /// Continue asynchronously
    Pending(Job),
}

impl Outcome {
    fn fail(reason: impl Into<String>) -> Self {
        Outcome::Failure {
            reason: reason.into(),
            hint: None,
        }
    }
}

/// State a handler may touch
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub credentials: &'a CredentialStore,
}

type Handler = fn(&mut CommandContext<'_>, &str) -> Outcome;

struct Command {
    name: &'static str,
    usage: &'static str,
    summary: &'static str,
    handler: Handler,
}

const COMMANDS: &[Command] = &[
    Command {
        name: "health",
        usage: "health",
        summary: "Check API health",
        handler: cmd_health,
    },
    Command {
        name: "chat",
        usage: "chat <message>",
        summary: "Send a message to the AI",
        handler: cmd_chat,
    },
    Command {
        name: "setkey",
        usage: "setkey <key>",
        summary: "Set your OpenAI API key",
        handler: cmd_setkey,
    },
    Command {
        name: "clearkey",
        usage: "clearkey",
        summary: "Forget the stored API key",
        handler: cmd_clearkey,
    },
    Command {
        name: "clear",
        usage: "clear",
        summary: "Clear the terminal",
        handler: cmd_clear,
    },
    Command {
        name: "help",
        usage: "help",
        summary: "Show this help message",
        handler: cmd_help,
    },
];

/// Split a raw line into lowercase name and verbatim argument tail
pub fn split_command(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.find(char::is_whitespace) {
        Some(pos) => Some((line[..pos].to_lowercase(), line[pos..].trim_start())),
        None => Some((line.to_lowercase(), "")),
    }
}

pub struct Dispatcher {
    index: HashMap<&'static str, usize>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let index = COMMANDS
            .iter()
            .enumerate()
            .map(|(i, cmd)| (cmd.name, i))
            .collect();
        Self { index }
    }

    /// Names in help order
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        COMMANDS.iter().map(|cmd| cmd.name)
    }

    /// Run a line through the table without touching the transcript
    pub fn evaluate(&self, ctx: &mut CommandContext<'_>, line: &str) -> Outcome {
        let Some((name, args)) = split_command(line) else {
            return Outcome::Success(Vec::new());
        };

        match self.index.get(name.as_str()) {
            Some(&i) => {
                debug!("Dispatching {}", name);
                (COMMANDS[i].handler)(ctx, args)
            }
            None => Outcome::Failure {
                reason: format!("Command not recognized: {}", name),
                hint: Some("Type \"help\" for available commands.".to_string()),
            },
        }
    }

    /// Evaluate a line and print its result. Returns the job to run, if any;
    /// otherwise the command is complete.
    pub fn dispatch(&self, ctx: &mut CommandContext<'_>, line: &str) -> Option<Job> {
        match self.evaluate(ctx, line) {
            Outcome::Success(lines) => {
                for line in lines {
                    ctx.session.transcript.append_line(line);
                }
                None
            }
            Outcome::Failure { reason, hint } => {
                ctx.session.transcript.append_line(error_line(&reason));
                if let Some(hint) = hint {
                    ctx.session.transcript.append_line(output_line(&hint));
                }
                None
            }
            Outcome::Pending(job) => Some(job),
        }
    }
}

fn cmd_health(_ctx: &mut CommandContext<'_>, _args: &str) -> Outcome {
    Outcome::Pending(Job::Health)
}

fn cmd_chat(ctx: &mut CommandContext<'_>, args: &str) -> Outcome {
    if args.is_empty() {
        return Outcome::fail("Error: Message required. Usage: chat <message>");
    }
    if !ctx.session.begin_busy() {
        return Outcome::fail(BUSY_MESSAGE);
    }
    Outcome::Pending(Job::Chat {
        message: args.to_string(),
        credential: ctx.session.credential().map(str::to_string),
    })
}

fn cmd_setkey(ctx: &mut CommandContext<'_>, args: &str) -> Outcome {
    if args.is_empty() {
        return Outcome::fail("Error: API key required. Usage: setkey <your_api_key>");
    }
    ctx.session.set_credential(Some(args.to_string()));

    let mut lines = vec![output_line("API key set successfully.")];
    if let Err(e) = ctx.credentials.save(args) {
        warn!("Credential not persisted: {}", e);
        lines.push(info_line("Warning: the key could not be saved and lasts for this session only."));
    }
    Outcome::Success(lines)
}

fn cmd_clearkey(ctx: &mut CommandContext<'_>, _args: &str) -> Outcome {
    ctx.session.set_credential(None);
    if let Err(e) = ctx.credentials.clear() {
        warn!("Stored credential not removed: {}", e);
        return Outcome::fail(format!("Error: {}", e));
    }
    Outcome::Success(vec![output_line("API key cleared.")])
}

fn cmd_clear(ctx: &mut CommandContext<'_>, _args: &str) -> Outcome {
    ctx.session.transcript.clear();
    Outcome::Success(Vec::new())
}

fn cmd_help(_ctx: &mut CommandContext<'_>, _args: &str) -> Outcome {
    let width = COMMANDS.iter().map(|cmd| cmd.usage.len()).max().unwrap_or(0);
    let mut lines = vec![info_line("Available commands:")];
    lines.extend(COMMANDS.iter().map(|cmd| {
        output_line(&format!("  {:<width$} - {}", cmd.usage, cmd.summary))
    }));
    Outcome::Success(lines)
}
