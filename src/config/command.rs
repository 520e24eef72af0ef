// src/config/command.rs

//! Shell-like command strings and `local:container` port mappings.
//!
//! Commands are split the way a POSIX shell would split a simple command:
//! whitespace separates arguments, single quotes are literal, double quotes
//! allow `\"`, `\\`, `\$` and `` \` `` escapes, and a bare backslash escapes
//! the next character. No expansion of any kind happens.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Command `{0}` is invalid: it contains an unbalanced single quote")]
    UnbalancedSingleQuote(String),

    #[error("Command `{0}` is invalid: it contains an unbalanced double quote")]
    UnbalancedDoubleQuote(String),

    #[error("Command `{0}` is invalid: it ends with a backslash (backslashes always escape the following character, for a literal backslash use '\\\\')")]
    DanglingBackslash(String),
}

/// A command as written by the user plus its split argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Command {
    original: String,
    parsed: Vec<String>,
}

impl Command {
    pub fn parse(original: &str) -> Result<Self, CommandParseError> {
        let parsed = split_arguments(original)?;
        Ok(Self {
            original: original.to_string(),
            parsed,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn parsed(&self) -> &[String] {
        &self.parsed
    }

    /// Returns a new command with `args` appended verbatim.
    pub fn with_additional_arguments(&self, args: &[String]) -> Self {
        if args.is_empty() {
            return self.clone();
        }

        let mut original = self.original.clone();
        for arg in args {
            original.push(' ');
            original.push_str(&quote_for_display(arg));
        }

        let mut parsed = self.parsed.clone();
        parsed.extend(args.iter().cloned());

        Self { original, parsed }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

fn split_arguments(input: &str) -> Result<Vec<String>, CommandParseError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_argument = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_argument {
                    args.push(std::mem::take(&mut current));
                    in_argument = false;
                }
            }
            '\\' => match chars.next() {
                Some(next) => {
                    current.push(next);
                    in_argument = true;
                }
                None => return Err(CommandParseError::DanglingBackslash(input.to_string())),
            },
            '\'' => {
                in_argument = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(next) => current.push(next),
                        None => {
                            return Err(CommandParseError::UnbalancedSingleQuote(input.to_string()));
                        }
                    }
                }
            }
            '"' => {
                in_argument = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                return Err(CommandParseError::UnbalancedDoubleQuote(
                                    input.to_string(),
                                ));
                            }
                        },
                        Some(next) => current.push(next),
                        None => {
                            return Err(CommandParseError::UnbalancedDoubleQuote(input.to_string()));
                        }
                    }
                }
            }
            other => {
                current.push(other);
                in_argument = true;
            }
        }
    }

    if in_argument {
        args.push(current);
    }

    Ok(args)
}

fn quote_for_display(arg: &str) -> String {
    let needs_quoting =
        arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'));

    if !needs_quoting {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// A `local:container` port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortMapping {
    pub local: u16,
    pub container: u16,
}

impl PortMapping {
    pub fn new(local: u16, container: u16) -> Self {
        Self { local, container }
    }
}

impl FromStr for PortMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Port mapping definition '{s}' is invalid. It must be in the form 'local:container'.");

        let (local, container) = s.trim().split_once(':').ok_or_else(invalid)?;
        let local = local.parse::<u16>().map_err(|_| invalid())?;
        let container = container.parse::<u16>().map_err(|_| invalid())?;

        if local == 0 || container == 0 {
            return Err(invalid());
        }

        Ok(Self { local, container })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.container)
    }
}
