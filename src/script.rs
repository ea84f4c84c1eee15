//! A tiny line-oriented language for driving an `Arena`.
//!
//! ```text
//! # comments and blank lines are skipped
//! malloc 20    # prints the base address, or -1 if nothing fits
//! free 0       # unknown or negative addresses are a no-op once anything is allocated
//! defrag
//! coalesce     # prints how many merges were made
//! print        # free list, then allocated list
//! ```

use std::io::Write;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;
use tracing::trace;

use crate::arena::{Arena, ArenaError, FreeOutcome};

/// Printed by `malloc` when no free block is large enough.
pub const NO_FIT: i64 = -1;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: `{command}` expects a single number")]
    MissingOperand { line: usize, command: &'static str },
    #[error("line {line}: unexpected operand `{operand}`")]
    UnexpectedOperand { line: usize, operand: String },
    #[error("line {line}: invalid number `{operand}`")]
    BadOperand {
        line: usize,
        operand: String,
        #[source]
        source: ParseIntError,
    },
    #[error("line {line}: {source}")]
    Arena {
        line: usize,
        #[source]
        source: ArenaError,
    },
    #[error("failed to write output")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Malloc(usize),
    Free(i64),
    Defrag,
    Coalesce,
    Print,
}

impl Command {
    /// Parse one line of a script, `Ok(None)` for blank lines and comments.
    pub fn parse(line: usize, text: &str) -> Result<Option<Self>, ScriptError> {
        let text = match text.split_once('#') {
            Some((code, _comment)) => code,
            None => text,
        };

        let mut words = text.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };

        let command = match name {
            "malloc" => Command::Malloc(operand(line, "malloc", words.next())?),
            "free" => Command::Free(operand(line, "free", words.next())?),
            "defrag" => Command::Defrag,
            "coalesce" => Command::Coalesce,
            "print" => Command::Print,
            _ => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: name.to_string(),
                })
            }
        };

        if let Some(extra) = words.next() {
            return Err(ScriptError::UnexpectedOperand {
                line,
                operand: extra.to_string(),
            });
        }

        Ok(Some(command))
    }
}

fn operand<T>(line: usize, command: &'static str, word: Option<&str>) -> Result<T, ScriptError>
where
    T: FromStr<Err = ParseIntError>,
{
    let word = word.ok_or(ScriptError::MissingOperand { line, command })?;
    word.parse().map_err(|source| ScriptError::BadOperand {
        line,
        operand: word.to_string(),
        source,
    })
}

/// A parsed script, each command paired with the line it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    commands: Vec<(usize, Command)>,
}

impl Program {
    pub fn parse(src: &str) -> Result<Self, ScriptError> {
        let mut commands = vec![];

        // lines are numbered from 1, like an editor would
        for (idx, text) in src.lines().enumerate() {
            if let Some(command) = Command::parse(idx + 1, text)? {
                commands.push((idx + 1, command));
            }
        }

        Ok(Self { commands })
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.iter().map(|(_, command)| command)
    }

    /// Run every command against `arena` in order, writing anything they print to `out`.
    ///
    /// Stops at the first failing command.
    pub fn execute<W: Write>(&self, arena: &mut Arena, out: &mut W) -> Result<(), ScriptError> {
        for &(line, command) in &self.commands {
            trace!(line, ?command, "executing");

            match command {
                Command::Malloc(length) => match arena.malloc(length) {
                    Some(address) => writeln!(out, "{address}")?,
                    None => writeln!(out, "{NO_FIT}")?,
                },
                Command::Free(address) => {
                    // nothing can start at a negative address, so those never match
                    let outcome = match usize::try_from(address) {
                        Ok(address) => arena.free(address),
                        Err(_) if arena.allocated_list().is_empty() => {
                            Err(ArenaError::EmptyAllocatedList)
                        }
                        Err(_) => Ok(FreeOutcome::NoMatch),
                    };
                    outcome.map_err(|source| ScriptError::Arena { line, source })?;
                }
                Command::Defrag => arena.defrag(),
                Command::Coalesce => {
                    let merges = arena.coalesce();
                    writeln!(out, "{merges}")?;
                }
                Command::Print => writeln!(out, "{arena}")?,
            }
        }

        Ok(())
    }
}
