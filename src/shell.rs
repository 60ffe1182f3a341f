//! Line oriented front end: parses user commands and runs them on a clerk.
//!
//! Rendering is left to the caller through [`Reply`]'s `Display`.

use crate::{
    clerk::{ActionOutcome, Clerk, Error},
    net::Transport,
};
use log::LevelFilter;
use std::fmt;

const CMD_QUERY: &str = "query";
const CMD_SET: &str = "set";
const CMD_INCREMENT: &str = "increment";
const CMD_MOVE: &str = "move";
const CMD_LOGGER_LEVEL: &str = "loggerLevel";

const USAGE: &[(&str, &str)] = &[
    (CMD_QUERY, "<key>"),
    (CMD_SET, "<key> <value>"),
    (CMD_INCREMENT, "<key> <value>"),
    (CMD_MOVE, "<source> <target> <value>"),
    (CMD_LOGGER_LEVEL, "<level> (warn, info, debug, error)"),
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Command cannot be empty")]
    Empty,
    #[error("Invalid command\nUsage: {cmd} {usage}")]
    Usage {
        cmd: &'static str,
        usage: &'static str,
    },
    #[error("Invalid command {0}\n{}", usage())]
    Unknown(String),
    #[error("value should be an integer")]
    NotInteger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query {
        key: String,
    },
    Set {
        key: String,
        value: i64,
    },
    Increment {
        key: String,
        value: i64,
    },
    Move {
        source: String,
        target: String,
        value: i64,
    },
    LoggerLevel(LevelFilter),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let (&cmd, rest) = args.split_first().ok_or(ParseError::Empty)?;
        let (name, arity) = match cmd {
            CMD_QUERY => (CMD_QUERY, 1),
            CMD_SET => (CMD_SET, 2),
            CMD_INCREMENT => (CMD_INCREMENT, 2),
            CMD_MOVE => (CMD_MOVE, 3),
            CMD_LOGGER_LEVEL => (CMD_LOGGER_LEVEL, 1),
            _ => return Err(ParseError::Unknown(cmd.to_string())),
        };
        if rest.len() != arity {
            return Err(usage_error(name));
        }
        let command = match name {
            CMD_QUERY => Command::Query {
                key: rest[0].to_string(),
            },
            CMD_SET => Command::Set {
                key: rest[0].to_string(),
                value: parse_value(rest[1])?,
            },
            CMD_INCREMENT => Command::Increment {
                key: rest[0].to_string(),
                value: parse_value(rest[1])?,
            },
            CMD_MOVE => Command::Move {
                source: rest[0].to_string(),
                target: rest[1].to_string(),
                value: parse_value(rest[2])?,
            },
            _ => Command::LoggerLevel(match rest[0] {
                "debug" => LevelFilter::Debug,
                "info" => LevelFilter::Info,
                "warn" => LevelFilter::Warn,
                "error" => LevelFilter::Error,
                _ => return Err(usage_error(name)),
            }),
        };
        Ok(command)
    }
}

fn parse_value(s: &str) -> Result<i64, ParseError> {
    s.parse().map_err(|_| ParseError::NotInteger)
}

fn usage_error(cmd: &'static str) -> ParseError {
    let usage = USAGE
        .iter()
        .find(|(name, _)| *name == cmd)
        .map_or("", |(_, usage)| usage);
    ParseError::Usage { cmd, usage }
}

/// Usage of every command, one per line.
pub fn usage() -> String {
    USAGE
        .iter()
        .map(|(cmd, usage)| format!("  {} {}", cmd, usage))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value { key: String, value: i64 },
    QueryFailed(String),
    Action(ActionOutcome),
    LoggerLevel(LevelFilter),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value { key, value } => {
                write!(f, "The query result for key {}: {}", key, value)
            }
            Reply::QueryFailed(err) => f.write_str(err),
            Reply::Action(ActionOutcome::Applied) => f.write_str("action success"),
            Reply::Action(ActionOutcome::Rejected(err)) => f.write_str(err),
            Reply::LoggerLevel(level) => write!(
                f,
                "Logger level set to {}",
                level.to_string().to_lowercase()
            ),
        }
    }
}

pub struct Shell<T> {
    clerk: Clerk<T>,
}

impl<T: Transport> Shell<T> {
    pub fn new(clerk: Clerk<T>) -> Self {
        Shell { clerk }
    }

    pub fn clerk(&mut self) -> &mut Clerk<T> {
        &mut self.clerk
    }

    pub async fn execute(&mut self, command: Command) -> Result<Reply, Error> {
        let action = match command {
            Command::Query { key } => {
                return match self.clerk.query_value(key.clone()).await {
                    Ok(value) => Ok(Reply::Value { key, value }),
                    Err(Error::Query(err)) => Ok(Reply::QueryFailed(err)),
                    Err(err) => Err(err),
                };
            }
            Command::LoggerLevel(level) => {
                log::set_max_level(level);
                return Ok(Reply::LoggerLevel(level));
            }
            Command::Set { key, value } => self.clerk.actions().set(key, value),
            Command::Increment { key, value } => self.clerk.actions().increment(key, value),
            Command::Move {
                source,
                target,
                value,
            } => self.clerk.actions().move_value(source, target, value),
        };
        let outcome = self.clerk.execute_action(action).await?;
        Ok(Reply::Action(outcome))
    }

    /// Parse and run one input line, returning the text to show the user.
    pub async fn run_line(&mut self, line: &str) -> String {
        match Command::parse(line) {
            Ok(command) => match self.execute(command).await {
                Ok(reply) => reply.to_string(),
                Err(err) => err.to_string(),
            },
            Err(err) => err.to_string(),
        }
    }
}
