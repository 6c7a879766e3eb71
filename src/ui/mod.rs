//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts behind the [Prompt] trait

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};

use console::Term;

use crate::error::{PublishError, Result};

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_boundary_warning, display_build_action, display_build_output, display_error,
    display_status, display_success,
};

/// One entry of a selection list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Choice {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Source of answers for interactive questions.
///
/// The workflow only talks to this trait so tests can script the answers.
pub trait Prompt {
    /// Pick one of `choices`; returns the chosen value
    fn select(&mut self, message: &str, choices: &[Choice], default: usize) -> Result<String>;

    /// Free text answer, may be empty
    fn input(&mut self, message: &str) -> Result<String>;

    /// Hidden text answer
    fn password(&mut self, message: &str) -> Result<String>;
}

/// Prompts on the controlling terminal
pub struct TerminalPrompt {
    reader: Box<dyn BufRead + Send>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        TerminalPrompt::with_reader(BufReader::new(io::stdin()))
    }

    /// Read answers from `reader` instead of stdin
    pub fn with_reader(reader: impl BufRead + Send + 'static) -> Self {
        TerminalPrompt {
            reader: Box::new(reader),
        }
    }

    /// One line of input; end of input is an error since no answer will come
    fn read_answer(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(PublishError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )));
        }
        Ok(line.trim().to_string())
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        TerminalPrompt::new()
    }
}

impl fmt::Debug for TerminalPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalPrompt").finish_non_exhaustive()
    }
}

impl Prompt for TerminalPrompt {
    /// Displays a numbered list and accepts a 1-based index.
    /// Enter picks `default`; a single choice is returned without asking.
    fn select(&mut self, message: &str, choices: &[Choice], default: usize) -> Result<String> {
        if choices.is_empty() {
            return Err(PublishError::config(format!("no choices for '{}'", message)));
        }
        if choices.len() == 1 {
            return Ok(choices[0].value.clone());
        }

        println!("\n{}", console::style(message).bold());
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}. {}", i + 1, choice.label);
        }

        let default = default.min(choices.len() - 1);
        loop {
            print!(
                "\nSelect (1-{}) [default: {}]: ",
                choices.len(),
                default + 1
            );
            io::stdout().flush()?;

            let answer = self.read_answer()?;
            let selection = answer.as_str();

            let index = if selection.is_empty() {
                default + 1
            } else {
                selection.parse::<usize>().unwrap_or(0)
            };

            if index > 0 && index <= choices.len() {
                return Ok(choices[index - 1].value.clone());
            }
            formatter::display_error("Invalid selection");
        }
    }

    fn input(&mut self, message: &str) -> Result<String> {
        print!("\n{} ", message);
        io::stdout().flush()?;

        self.read_answer()
    }

    fn password(&mut self, message: &str) -> Result<String> {
        let term = Term::stdout();
        term.write_str(&format!("\n{} ", message))?;
        let secret = term.read_secure_line()?;
        Ok(secret.trim().to_string())
    }
}

/// Replays canned answers in order.
///
/// `select` answers match a choice value. Running out of answers is an error.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Messages of every question asked so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    fn next(&mut self, message: &str) -> Result<String> {
        self.asked.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PublishError::config(format!("no scripted answer for '{}'", message)))
    }
}

impl Prompt for ScriptedPrompt {
    fn select(&mut self, message: &str, choices: &[Choice], _default: usize) -> Result<String> {
        let answer = self.next(message)?;
        if choices.iter().any(|c| c.value == answer) {
            Ok(answer)
        } else {
            Err(PublishError::config(format!(
                "scripted answer '{}' is not a choice of '{}'",
                answer, message
            )))
        }
    }

    fn input(&mut self, message: &str) -> Result<String> {
        self.next(message)
    }

    fn password(&mut self, message: &str) -> Result<String> {
        self.next(message)
    }
}
