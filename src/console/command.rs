//! # Operator commands.
//!
//! One command per line, whitespace separated:
//!
//! | Command                                   | Effect                                     |
//! |-------------------------------------------|--------------------------------------------|
//! | `raw <text>`                              | broadcast text verbatim                    |
//! | `stt <component> <state>`                 | broadcast a status change now              |
//! | `logr <component> <participant> <split>`  | broadcast one random split record now      |
//! | `sim <component> <splits> <participant>…` | schedule a whole simulated race            |
//! | `abort <component>`                       | cancel the pending events of a race        |
//! | `status`                                  | subscriber / pending-event counts          |
//! | `help`                                    | list commands                              |
//! | `quit`                                    | stop the feed                              |

use std::str::FromStr;

use crate::error::CommandError;
use crate::messages::StateCode;

/// Usage lines printed by `help`.
pub const USAGE: &str = "\
raw <text>                              broadcast text verbatim
stt <component> <state>                 broadcast a status change
logr <component> <participant> <split>  broadcast a random split record
sim <component> <splits> <participant>...  simulate a race
abort <component>                       cancel a simulated race
status                                  show subscribers and pending events
help                                    show this list
quit                                    stop the feed";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Broadcast text verbatim.
    Raw(String),
    /// Broadcast a status change immediately.
    Stt {
        /// Component id.
        component: String,
        /// New state.
        state: StateCode,
    },
    /// Broadcast one random split record immediately.
    Logr {
        /// Component id.
        component: String,
        /// Participant id.
        participant: String,
        /// Split index.
        split: u32,
    },
    /// Simulate a whole race.
    Sim {
        /// Component id.
        component: String,
        /// Number of splits.
        splits: u32,
        /// Participants in finishing order.
        participants: Vec<String>,
    },
    /// Cancel a simulated race's pending events.
    Abort {
        /// Component id.
        component: String,
    },
    /// Report feed state.
    Status,
    /// List commands.
    Help,
    /// Stop the feed.
    Quit,
}

impl Command {
    /// Parses one console line.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Ok(None);
        };

        let command = match keyword {
            "raw" => {
                let text = line[keyword.len()..].trim();
                if text.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "raw",
                        argument: "text",
                    });
                }
                Command::Raw(text.to_string())
            }
            "stt" => {
                let mut args = Args::new("stt", words);
                let component = args.word("component")?;
                let state = StateCode(args.number("state")?);
                args.finish()?;
                Command::Stt { component, state }
            }
            "logr" => {
                let mut args = Args::new("logr", words);
                let component = args.word("component")?;
                let participant = args.word("participant")?;
                let split = args.number("split")?;
                args.finish()?;
                Command::Logr {
                    component,
                    participant,
                    split,
                }
            }
            "sim" => {
                let mut args = Args::new("sim", words);
                let component = args.word("component")?;
                let splits = args.number("splits")?;
                Command::Sim {
                    component,
                    splits,
                    participants: args.rest(),
                }
            }
            "abort" => {
                let mut args = Args::new("abort", words);
                let component = args.word("component")?;
                args.finish()?;
                Command::Abort { component }
            }
            "status" => Args::new("status", words).finish().map(|_| Command::Status)?,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// Command keyword, for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Command::Raw(_) => "raw",
            Command::Stt { .. } => "stt",
            Command::Logr { .. } => "logr",
            Command::Sim { .. } => "sim",
            Command::Abort { .. } => "abort",
            Command::Status => "status",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// Like [`Command::parse`], but a blank line is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)?.ok_or_else(|| CommandError::Unknown(String::new()))
    }
}

/// Positional argument reader for one command.
struct Args<'a, I> {
    command: &'static str,
    words: I,
    _line: std::marker::PhantomData<&'a str>,
}

impl<'a, I: Iterator<Item = &'a str>> Args<'a, I> {
    fn new(command: &'static str, words: I) -> Self {
        Self {
            command,
            words,
            _line: std::marker::PhantomData,
        }
    }

    fn word(&mut self, argument: &'static str) -> Result<String, CommandError> {
        self.words
            .next()
            .map(str::to_string)
            .ok_or(CommandError::MissingArgument {
                command: self.command,
                argument,
            })
    }

    fn number<T: FromStr>(&mut self, argument: &'static str) -> Result<T, CommandError> {
        let raw = self.word(argument)?;
        raw.parse().map_err(|_| CommandError::InvalidArgument {
            command: self.command,
            argument,
            value: raw,
        })
    }

    fn rest(&mut self) -> Vec<String> {
        self.words.by_ref().map(str::to_string).collect()
    }

    fn finish(mut self) -> Result<(), CommandError> {
        match self.words.next() {
            Some(extra) => Err(CommandError::UnexpectedArgument {
                command: self.command,
                value: extra.to_string(),
            }),
            None => Ok(()),
        }
    }
}
