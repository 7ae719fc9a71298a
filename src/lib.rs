//! # Cairn - Disk-Backed B+Tree Index
//!
//! Cairn is a persistent, ordered index mapping fixed-width binary keys to
//! fixed-width binary values. The tree lives in fixed-size blocks inside a
//! block store and every structural decision favors predictable on-disk
//! layout over in-memory cleverness:
//!
//! - **Fixed-stride slots**: key and value widths are chosen at format time,
//!   so slot offsets are pure arithmetic and node views are zero-copy
//! - **Intrusive free list**: unallocated blocks chain through their own
//!   headers, rooted in the superblock
//! - **Single-writer, synchronous**: every operation completes or fails
//!   before returning, in program order
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Command Shell (cli, bin)        │
//! ├─────────────────────────────────────┤
//! │   B+Tree Engine (btree::tree)        │
//! │   lookup / insert / update / range   │
//! ├───────────────────┬─────────────────┤
//! │  Node Views       │  Free-List      │
//! │  (leaf, interior) │  Allocator      │
//! ├───────────────────┴─────────────────┤
//! │   Block Codec (btree::node)          │
//! ├─────────────────────────────────────┤
//! │   Block Store (storage)              │
//! │   MemoryStore │ MmapStore            │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Block Layout
//!
//! Block 0 is the superblock. Block 1 is formatted as the initial (empty)
//! root. Every remaining block starts on the free list, chained through the
//! `freelist` field of its header and terminated by block 0:
//!
//! ```text
//! ┌───────────┬───────────┬───────────┬───────────┬─────┬───────────┐
//! │ 0: super  │ 1: root   │ 2: free ──┼─▶ 3: free ┼─...─┼─▶ 0 (end) │
//! └───────────┴───────────┴───────────┴───────────┴─────┴───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use cairn::{BTreeIndex, MemoryStore};
//!
//! let store = MemoryStore::new(512, 64)?;
//! let mut index = BTreeIndex::new(store, 4, 8, true);
//! index.attach(0, true)?;
//! index.insert(b"AAAA", b"xxxxxxxx")?;
//! assert_eq!(index.lookup(b"AAAA")?, b"xxxxxxxx");
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the `BlockStore` trait plus memory and mmap stores
//! - [`btree`]: node codec, free-list allocator, and the tree engine
//! - [`cli`]: interactive shell used by the `cairn` binary
//! - [`error`]: tagged error kinds surfaced through `eyre` reports

pub mod btree;
pub mod cli;
pub mod error;
pub mod storage;

pub use btree::{BTreeIndex, DisplayMode};
pub use error::{error_kind, IndexError};
pub use storage::{BlockStore, MemoryStore, MmapStore};
