//! # B+Tree Index
//!
//! This module implements the disk-resident B+tree: the block codec, the
//! node views, the free-list allocator, and the tree engine on top of them.
//!
//! ## Layering
//!
//! - [`node`]: node kinds, the 32-byte block header, and the slot geometry
//!   derived from key/value widths
//! - [`leaf`] / [`interior`]: zero-copy views over a decoded block
//! - [`freelist`]: block allocation through the intrusive free list rooted
//!   in the superblock
//! - [`tree`]: descent, insertion with split-and-promote, update, range scan
//! - [`check`]: depth-first invariant verification
//! - [`display`]: diagnostic dumps of the tree shape and contents
//!
//! ## Node Types
//!
//! - **Root/Interior**: separator keys and child block pointers, one more
//!   pointer than keys. A separator is an inclusive upper bound for its left
//!   subtree: descent takes the first branch whose separator is `>=` the
//!   search key.
//!
//! - **Leaf**: sorted key/value pairs plus a sibling pointer chaining leaves
//!   left to right for range scans.
//!
//! ## Splitting
//!
//! A node splits when an insertion pushes it past the two-thirds threshold.
//! The over-full block keeps the lower half in place and a freshly allocated
//! block takes the upper half, so leaf sibling chains stay valid without
//! touching the predecessor leaf. Leaf splits copy the separator up (the
//! left half's maximum stays in the leaf); interior splits move it up. When
//! the cascade reaches the root, a new root is allocated above it and the
//! superblock's root pointer is rewritten.

pub mod check;
pub mod display;
pub mod freelist;
pub mod interior;
pub mod leaf;
pub mod node;
pub mod tree;

pub use display::DisplayMode;
pub use interior::{InteriorNode, InteriorNodeMut};
pub use leaf::{LeafNode, LeafNodeMut, SearchResult};
pub use node::{NodeHeader, NodeKind, NodeLayout, NODE_HEADER_SIZE, NULL_BLOCK, PTR_SIZE, SUPERBLOCK};
pub use tree::BTreeIndex;
