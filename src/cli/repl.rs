//! # REPL - Read-Eval-Print Loop
//!
//! The interactive loop for the cairn shell. Reads a line with rustyline
//! (history, line editing), hands it to the command dispatcher, and prints
//! the result. Failed commands print their error kind and the loop keeps
//! running; `quit` or Ctrl+D detaches the index and exits.

use std::path::PathBuf;

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::btree::BTreeIndex;
use crate::cli::commands::{CommandHandler, CommandResult};
use crate::storage::BlockStore;

const PROMPT: &str = "cairn> ";

/// History lives in `$CAIRN_HISTORY`, falling back to `~/.cairn_history`.
/// An empty override disables persistence.
fn history_file() -> Option<PathBuf> {
    std::env::var_os("CAIRN_HISTORY")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cairn_history"))
        })
        .filter(|path| !path.as_os_str().is_empty())
}

pub struct Repl<S> {
    index: BTreeIndex<S>,
    editor: DefaultEditor,
}

impl<S: BlockStore> Repl<S> {
    pub fn new(index: BTreeIndex<S>) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;

        if let Some(path) = history_file() {
            let _ = editor.load_history(&path);
        }

        Ok(Self { index, editor })
    }

    pub fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.editor.add_history_entry(trimmed).ok();
                    if !self.execute(trimmed) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading input: {}", err);
                    break;
                }
            }
        }

        self.save_history();
        self.index.detach().wrap_err("failed to detach the index")?;
        Ok(())
    }

    fn execute(&mut self, line: &str) -> bool {
        match CommandHandler::execute(&mut self.index, line) {
            CommandResult::Exit => false,
            CommandResult::Output(text) => {
                println!("{}", text);
                true
            }
            CommandResult::Error(msg) => {
                eprintln!("Error: {}", msg);
                true
            }
        }
    }

    fn print_welcome(&self) {
        println!("cairn {}", env!("CARGO_PKG_VERSION"));
        println!(
            "keysize {}, valuesize {}. Type help for available commands.",
            self.index.keysize(),
            self.index.valuesize()
        );
    }

    fn save_history(&mut self) {
        if let Some(path) = history_file() {
            let _ = self.editor.save_history(&path);
        }
    }
}
