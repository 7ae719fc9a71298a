//! # In-Memory Block Store
//!
//! A heap-backed [`BlockStore`] with the same geometry rules as the mmap
//! store. Used throughout the test suite and useful for short-lived trees
//! that never need to touch disk.
//!
//! The store counts allocation notifications so tests can observe free-list
//! traffic without reaching into allocator internals.

use eyre::{ensure, Result};

use super::{BlockStore, MIN_BLOCK_SIZE};

#[derive(Debug)]
pub struct MemoryStore {
    data: Vec<u8>,
    block_size: usize,
    block_count: u32,
    allocations: u64,
    releases: u64,
}

impl MemoryStore {
    pub fn new(block_size: usize, block_count: u32) -> Result<Self> {
        ensure!(
            block_size >= MIN_BLOCK_SIZE,
            "block size {} below minimum {}",
            block_size,
            MIN_BLOCK_SIZE
        );
        ensure!(block_count > 0, "block count must be at least 1");

        Ok(Self {
            data: vec![0u8; block_size * block_count as usize],
            block_size,
            block_count,
            allocations: 0,
            releases: 0,
        })
    }

    /// Blocks handed out by the allocator since creation.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Blocks returned to the free list since creation.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Raw contents of every block, in index order.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BlockStore for MemoryStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn block(&self, block_no: u32) -> Result<&[u8]> {
        ensure!(
            block_no < self.block_count,
            "block {} out of bounds (block_count={})",
            block_no,
            self.block_count
        );

        let offset = block_no as usize * self.block_size;
        Ok(&self.data[offset..offset + self.block_size])
    }

    fn block_mut(&mut self, block_no: u32) -> Result<&mut [u8]> {
        ensure!(
            block_no < self.block_count,
            "block {} out of bounds (block_count={})",
            block_no,
            self.block_count
        );

        let offset = block_no as usize * self.block_size;
        Ok(&mut self.data[offset..offset + self.block_size])
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn note_allocate(&mut self, _block_no: u32) {
        self.allocations += 1;
    }

    fn note_release(&mut self, _block_no: u32) {
        self.releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_zeroed() {
        let store = MemoryStore::new(128, 4).unwrap();

        for n in 0..4 {
            assert!(store.block(n).unwrap().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn rejects_undersized_blocks() {
        assert!(MemoryStore::new(32, 4).is_err());
        assert!(MemoryStore::new(128, 0).is_err());
    }

    #[test]
    fn block_mut_persists_writes() {
        let mut store = MemoryStore::new(128, 4).unwrap();

        store.block_mut(2).unwrap()[0] = 0xAB;

        assert_eq!(store.block(2).unwrap()[0], 0xAB);
        assert_eq!(store.block(1).unwrap()[0], 0x00);
    }

    #[test]
    fn out_of_bounds_block_is_error() {
        let store = MemoryStore::new(128, 4).unwrap();

        let result = store.block(4);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn notification_counters() {
        let mut store = MemoryStore::new(128, 4).unwrap();

        store.note_allocate(2);
        store.note_allocate(3);
        store.note_release(2);

        assert_eq!(store.allocations(), 2);
        assert_eq!(store.releases(), 1);
    }
}
