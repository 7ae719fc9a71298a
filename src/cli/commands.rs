//! # Command Parsing and Execution
//!
//! Parses one shell line and runs it against the mounted index. Execution
//! is pure with respect to the terminal: every command returns a
//! [`CommandResult`] and the REPL decides how to print it, which keeps the
//! dispatch testable against a `MemoryStore` index.

use crate::btree::{BTreeIndex, DisplayMode};
use crate::error::error_kind;
use crate::storage::BlockStore;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Output(String),
    Error(String),
    Exit,
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn execute<S: BlockStore>(index: &mut BTreeIndex<S>, line: &str) -> CommandResult {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return CommandResult::Output(String::new());
        };
        let args: Vec<&str> = parts.collect();

        match command.to_ascii_lowercase().as_str() {
            "insert" => with_pair(index, &args, |index, key, value| {
                index.insert(key, value).map(|()| "inserted".to_string())
            }),
            "lookup" => with_key(index, &args, |index, key| {
                index.lookup(key).map(|value| printable(&value))
            }),
            "update" => with_pair(index, &args, |index, key, value| {
                index.update(key, value).map(|()| "updated".to_string())
            }),
            "delete" => with_key(index, &args, |index, key| {
                index.delete(key).map(|()| "deleted".to_string())
            }),
            "scan" => scan(index, &args),
            "show" => show(index, &args),
            "check" => match index.sanity_check() {
                Ok(()) => CommandResult::Output("tree is sane".to_string()),
                Err(e) => CommandResult::Error(describe(&e)),
            },
            "stats" => stats(index),
            "help" | "?" => CommandResult::Output(help_text()),
            "quit" | "exit" | "q" => CommandResult::Exit,
            other => CommandResult::Error(format!(
                "unknown command: {}. Type help for available commands.",
                other
            )),
        }
    }
}

fn with_key<S, F>(index: &mut BTreeIndex<S>, args: &[&str], f: F) -> CommandResult
where
    S: BlockStore,
    F: FnOnce(&mut BTreeIndex<S>, &[u8]) -> eyre::Result<String>,
{
    let [key] = args else {
        return CommandResult::Error("expected: KEY".to_string());
    };
    let key = match pad(key, index.keysize()) {
        Ok(k) => k,
        Err(msg) => return CommandResult::Error(msg),
    };
    match f(index, &key) {
        Ok(text) => CommandResult::Output(text),
        Err(e) => CommandResult::Error(describe(&e)),
    }
}

fn with_pair<S, F>(index: &mut BTreeIndex<S>, args: &[&str], f: F) -> CommandResult
where
    S: BlockStore,
    F: FnOnce(&mut BTreeIndex<S>, &[u8], &[u8]) -> eyre::Result<String>,
{
    let [key, value] = args else {
        return CommandResult::Error("expected: KEY VALUE".to_string());
    };
    let key = match pad(key, index.keysize()) {
        Ok(k) => k,
        Err(msg) => return CommandResult::Error(msg),
    };
    let value = match pad(value, index.valuesize()) {
        Ok(v) => v,
        Err(msg) => return CommandResult::Error(msg),
    };
    match f(index, &key, &value) {
        Ok(text) => CommandResult::Output(text),
        Err(e) => CommandResult::Error(describe(&e)),
    }
}

fn scan<S: BlockStore>(index: &mut BTreeIndex<S>, args: &[&str]) -> CommandResult {
    let [min, max] = args else {
        return CommandResult::Error("expected: MIN MAX".to_string());
    };
    let min = match pad(min, index.keysize()) {
        Ok(k) => k,
        Err(msg) => return CommandResult::Error(msg),
    };
    let max = match pad(max, index.keysize()) {
        Ok(k) => k,
        Err(msg) => return CommandResult::Error(msg),
    };

    match index.range(&min, &max) {
        Ok(pairs) => {
            let mut out = String::new();
            for (key, value) in &pairs {
                out.push_str(&format!("({},{})\n", printable(key), printable(value)));
            }
            out.push_str(&format!("{} pairs", pairs.len()));
            CommandResult::Output(out)
        }
        Err(e) => CommandResult::Error(describe(&e)),
    }
}

fn show<S: BlockStore>(index: &mut BTreeIndex<S>, args: &[&str]) -> CommandResult {
    let mode = match args.first().copied().unwrap_or("depth") {
        "depth" => DisplayMode::Depth,
        "dot" => DisplayMode::DepthDot,
        "sorted" => DisplayMode::SortedKeyVal,
        other => {
            return CommandResult::Error(format!(
                "unknown display mode: {} (expected depth, dot or sorted)",
                other
            ));
        }
    };

    let mut out = Vec::new();
    match index.display(&mut out, mode) {
        Ok(()) => CommandResult::Output(String::from_utf8_lossy(&out).into_owned()),
        Err(e) => CommandResult::Error(describe(&e)),
    }
}

fn stats<S: BlockStore>(index: &mut BTreeIndex<S>) -> CommandResult {
    match (index.key_count(), index.free_blocks()) {
        (Ok(keys), Ok(free)) => CommandResult::Output(format!(
            "{} keys, {} free blocks of {} ({} bytes each)",
            keys,
            free,
            index.store().block_count(),
            index.store().block_size()
        )),
        (Err(e), _) | (_, Err(e)) => CommandResult::Error(describe(&e)),
    }
}

/// Pads a literal to `width` with zero bytes; longer literals are rejected.
fn pad(literal: &str, width: usize) -> Result<Vec<u8>, String> {
    let bytes = literal.as_bytes();
    if bytes.len() > width {
        return Err(format!(
            "literal '{}' is {} bytes, limit is {}",
            literal,
            bytes.len(),
            width
        ));
    }
    let mut out = vec![0u8; width];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Strips padding and renders the remainder as lossy ASCII.
fn printable(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// The error kind when tagged, the full report otherwise.
fn describe(report: &eyre::Report) -> String {
    match error_kind(report) {
        Some(kind) => kind.to_string(),
        None => format!("{:#}", report),
    }
}

fn help_text() -> String {
    r#"Cairn commands:

  insert KEY VALUE     Insert a pair; inserting an existing key conflicts
  lookup KEY           Print the value stored under KEY
  update KEY VALUE     Overwrite the value under KEY
  delete KEY           Not implemented by this tree
  scan MIN MAX         Print every pair with MIN <= key <= MAX
  show [depth|dot|sorted]
                       Dump the tree (default: depth)
  check                Verify all structural invariants
  stats                Key count and free-block count
  help                 Show this help message
  quit                 Exit the shell

Literals shorter than the fixed key/value width are zero-padded."#
        .to_string()
}
