//! # Cairn CLI Module
//!
//! Interactive shell for driving an index on disk: insert, lookup, update,
//! range scans, integrity checks, and tree dumps.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CLI Entry Point                        │
//! │                      (bin/cairn.rs)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                         REPL Loop                           │
//! │  - Reads input via rustyline                                │
//! │  - Dispatches commands against the mounted index            │
//! │  - Prints results or the failing error kind                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │       Commands            │            History              │
//! │  insert/lookup/update/    │   Persistent ~/.cairn_history   │
//! │  scan/show/check/stats    │                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commands
//!
//! | Command                  | Description                            |
//! |--------------------------|----------------------------------------|
//! | `insert KEY VALUE`       | Insert a pair; duplicate keys conflict |
//! | `lookup KEY`             | Print the value stored under KEY       |
//! | `update KEY VALUE`       | Overwrite the value under KEY          |
//! | `delete KEY`             | Always reports unimplemented           |
//! | `scan MIN MAX`           | Print every pair with MIN <= key <= MAX|
//! | `show [depth\|dot\|sorted]` | Dump the tree in the given format   |
//! | `check`                  | Run the structural sanity checker      |
//! | `stats`                  | Key count and free-block count         |
//! | `help`, `quit`           |                                        |
//!
//! Key and value literals shorter than the tree's fixed widths are padded
//! with zero bytes on the right; longer literals are rejected.
//!
//! Failed commands print the error kind and leave the shell running; the
//! usual follow-up is `check` to confirm the tree is still intact.

pub mod commands;
pub mod repl;

pub use repl::Repl;
