//! Input handler for REPL using rustyline
//!
//! Provides readline functionality with persistent history, hints from
//! history, and tab completion of command words, module names and logs.

use anyhow::Result;
use colored::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::{DefaultHistory, History};
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::repl::commands::COMMAND_WORDS;

/// Outcome of reading one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D
    Eof,
}

/// Source of user input for the engine
pub trait Prompter {
    /// Read a command line; non-empty lines are added to history
    fn read_command(&mut self, prompt: &str) -> Result<ReadEvent>;

    /// Read an answer to a question (menu choice, module input)
    fn read_answer(&mut self, prompt: &str) -> Result<ReadEvent>;

    /// Read a secret without echo
    fn read_password(&mut self, prompt: &str) -> Result<String>;

    /// Persist history, if any
    fn save_history(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Completion, hints and prompt colouring for the editor
pub struct CommandHelper {
    modules_dir: PathBuf,
    logs_dir: PathBuf,
    hinter: HistoryHinter,
}

impl CommandHelper {
    pub fn new(modules_dir: PathBuf, logs_dir: PathBuf) -> Self {
        Self {
            modules_dir,
            logs_dir,
            hinter: HistoryHinter {},
        }
    }
}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, candidates) = complete_line(&line[..pos], &self.modules_dir, &self.logs_dir);
        let pairs = candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for CommandHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(prompt.truecolor(197, 193, 255).bold().to_string())
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.dimmed().to_string())
    }
}

impl Validator for CommandHelper {}

impl Helper for CommandHelper {}

/// Candidates for the word under the cursor
///
/// Returns the byte offset the candidates replace from.
pub fn complete_line(line: &str, modules_dir: &Path, logs_dir: &Path) -> (usize, Vec<String>) {
    let word_start = line
        .rfind(char::is_whitespace)
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &line[word_start..];
    let before = line[..word_start].trim();

    let pool: Vec<String> = if before.is_empty() {
        COMMAND_WORDS.iter().map(|w| w.to_string()).collect()
    } else {
        let command = before.split_whitespace().next().unwrap_or("").to_lowercase();
        match command.as_str() {
            "launch" | "run" | "remove" | "rm" | "stop" => list_files(modules_dir),
            "read" => list_files(logs_dir),
            _ => Vec::new(),
        }
    };

    let mut matches: Vec<String> = pool
        .into_iter()
        .filter(|candidate| candidate.starts_with(word))
        .collect();
    matches.sort();
    (word_start, matches)
}

fn list_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Input handler managing the readline interface and command history
pub struct InputHandler {
    editor: Editor<CommandHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl InputHandler {
    pub fn new(helper: CommandHelper) -> Result<Self> {
        let mut editor = Editor::<CommandHelper, DefaultHistory>::new()?;
        editor.set_helper(Some(helper));

        Ok(InputHandler {
            editor,
            history_path: None,
        })
    }

    /// Create input handler with persistent history
    pub fn with_history(helper: CommandHelper, history_file: PathBuf) -> Result<Self> {
        let mut handler = Self::new(helper)?;

        // Load existing history if file exists
        if history_file.exists() {
            let _ = handler.editor.load_history(&history_file);
        }
        handler.history_path = Some(history_file);
        Ok(handler)
    }

    fn read(&mut self, prompt: &str, record: bool) -> Result<ReadEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if record && !trimmed.is_empty() {
                    let _ = self.editor.add_history_entry(trimmed);
                }
                Ok(ReadEvent::Line(trimmed.to_string()))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadEvent::Eof),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }

    /// Get history size
    pub fn history_len(&self) -> usize {
        self.editor.history().len()
    }
}

impl Prompter for InputHandler {
    fn read_command(&mut self, prompt: &str) -> Result<ReadEvent> {
        self.read(prompt, true)
    }

    fn read_answer(&mut self, prompt: &str) -> Result<ReadEvent> {
        self.read(prompt, false)
    }

    fn read_password(&mut self, prompt: &str) -> Result<String> {
        Ok(rpassword::prompt_password(prompt)?)
    }

    fn save_history(&mut self) -> Result<()> {
        if let Some(ref path) = self.history_path {
            self.editor.save_history(path)?;
        }
        Ok(())
    }
}
