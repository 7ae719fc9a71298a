//! # Block Store
//!
//! The index never touches a file or a buffer directly; it goes through the
//! [`BlockStore`] trait, a fixed-geometry array of equally sized blocks
//! addressed by index. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: heap-backed, used by unit tests and throwaway trees
//! - [`MmapStore`]: file-backed through a shared memory mapping
//!
//! ## Access Model
//!
//! Reads and writes are borrowed views into the block:
//!
//! ```text
//! block(&self, n) -> &[u8]          // immutable borrow of self
//! block_mut(&mut self, n) -> &mut [u8]  // exclusive borrow of self
//! ```
//!
//! A "write" is a mutation through `block_mut`, made durable by `sync`. The
//! borrow checker guarantees no block view outlives an operation that could
//! invalidate it, with zero runtime cost.
//!
//! ## Allocation Notifications
//!
//! `note_allocate` and `note_release` are observational hooks fired by the
//! free-list allocator when a block changes hands. They have no semantic
//! effect on the store; `MemoryStore` counts them so tests can assert on
//! allocator traffic, and other implementations may ignore them.
//!
//! ## Geometry
//!
//! Block size and block count are fixed when a store is created and never
//! change. There is no grow operation: when the free list runs out the index
//! reports `NoSpace` rather than extending the file.

mod headers;
mod memory;
mod mmap;

pub use headers::{StoreFileHeader, STORE_MAGIC, STORE_VERSION};
pub use memory::MemoryStore;
pub use mmap::MmapStore;

use eyre::Result;

/// Fixed-size prefix of an on-disk store file, before block 0.
pub const FILE_HEADER_SIZE: usize = 64;

/// Smallest block size any store will accept.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Fixed-geometry array of byte blocks consumed by the index core.
pub trait BlockStore {
    /// Size in bytes of every block.
    fn block_size(&self) -> usize;

    /// Total number of blocks, including the superblock.
    fn block_count(&self) -> u32;

    /// Borrows block `block_no` for reading.
    fn block(&self, block_no: u32) -> Result<&[u8]>;

    /// Borrows block `block_no` for in-place modification.
    fn block_mut(&mut self, block_no: u32) -> Result<&mut [u8]>;

    /// Makes all prior modifications durable.
    fn sync(&self) -> Result<()>;

    /// Observational hook: `block_no` left the free list.
    fn note_allocate(&mut self, _block_no: u32) {}

    /// Observational hook: `block_no` returned to the free list.
    fn note_release(&mut self, _block_no: u32) {}
}
