//! Interactive command loop
//!
//! Commands are looked up in a [`CommandTable`] and run against a
//! [`CommandContext`]. Malformed input to a command is reported and the loop
//! carries on; any other error ends the loop and is returned to the caller.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use mm_sim::LoopHealth;
use tracing::{debug, warn};

use crate::commands;
use crate::driver::DeviceDriver;
use crate::error::{CommandInputError, ShellError};
use crate::history::History;

/// Prompt shown before each command
pub const PROMPT: &str = "MOCK: ";

/// What the loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything a command handler may touch
pub struct CommandContext<'a> {
    pub driver: &'a mut dyn DeviceDriver,
    pub out: &'a mut dyn Write,
    pub history: &'a History,
    pub table: &'a CommandTable,
}

/// Command handler; receives the tokenized arguments
pub type Handler = fn(&mut CommandContext<'_>, &[String]) -> Result<Flow, ShellError>;

/// One entry of the dispatch table
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: Handler,
    /// Whether the command talks to the device
    pub uses_driver: bool,
}

/// Dispatch table keyed by command name
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: BTreeMap<&'static str, CommandSpec>,
}

impl CommandTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in command
    pub fn standard() -> Self {
        let mut table = Self::new();
        for spec in commands::BUILTIN {
            table.register(*spec);
        }
        table
    }

    /// Add or replace a command
    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Commands in name order
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }
}

/// Split an argument string on whitespace, honouring double quotes
pub fn tokenize(text: &str) -> Result<Vec<String>, CommandInputError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(CommandInputError::Syntax(format!(
            "unterminated quote in '{}'",
            text
        )));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Command shell bound to one driver
pub struct Shell<D> {
    driver: D,
    table: CommandTable,
    history: History,
    health: Option<LoopHealth>,
    prompt: String,
}

impl<D: DeviceDriver> Shell<D> {
    pub fn new(driver: D, history: History) -> Self {
        Self {
            driver,
            table: CommandTable::standard(),
            history,
            health: None,
            prompt: PROMPT.to_string(),
        }
    }

    /// Check the simulated device before every device command
    pub fn with_health(mut self, health: LoopHealth) -> Self {
        self.health = Some(health);
        self
    }

    /// Replace the dispatch table
    pub fn with_table(mut self, table: CommandTable) -> Self {
        self.table = table;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Read and run commands until `exit`, end of input or a fatal error
    pub fn cmdloop<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> Result<(), ShellError> {
        let mut line = String::new();
        loop {
            write!(out, "{}", self.prompt)?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                debug!("End of input");
                return Ok(());
            }

            if self.onecmd(&line, &mut out)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Run a single command line
    pub fn onecmd(&mut self, line: &str, out: &mut dyn Write) -> Result<Flow, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        self.history.push(line);

        let (name, raw_args) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let Some(spec) = self.table.get(name).copied() else {
            writeln!(out, "*** Unknown syntax: {}", line)?;
            return Ok(Flow::Continue);
        };

        if spec.uses_driver {
            if let Some(health) = &self.health {
                health.check()?;
            }
        }

        let result = tokenize(raw_args)
            .map_err(ShellError::from)
            .and_then(|args| {
                let mut ctx = CommandContext {
                    driver: &mut self.driver,
                    out: &mut *out,
                    history: &self.history,
                    table: &self.table,
                };
                (spec.handler)(&mut ctx, &args)
            });

        match result {
            Err(ShellError::Input(e)) => {
                warn!("{}: {}", spec.name, e);
                writeln!(out, "{}", e)?;
                writeln!(out, "{}", raw_args)?;
                Ok(Flow::Continue)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_plain() {
        assert_eq!(tokenize("  a  b\tc ").unwrap(), vec!["a", "b", "c"]);
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"x "two words" "" y"#).unwrap(),
            vec!["x", "two words", "", "y"]
        );
        assert_eq!(tokenize(r#"ab"c d"e"#).unwrap(), vec!["abc de"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert!(matches!(
            tokenize(r#"1 "oops"#),
            Err(CommandInputError::Syntax(_))
        ));
    }

    #[test]
    fn test_standard_table() {
        let table = CommandTable::standard();
        let names: Vec<&str> = table.iter().map(|s| s.name).collect();
        for expected in [
            "commit",
            "exit",
            "help",
            "history",
            "info",
            "mcu_rst",
            "quit",
            "read_reg",
            "special_cmd",
            "version",
            "write_reg",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(!table.get("help").unwrap().uses_driver);
        assert!(table.get("special_cmd").unwrap().uses_driver);
    }
}
