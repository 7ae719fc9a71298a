//! # Memory-Mapped Block Store
//!
//! `MmapStore` persists blocks in a single file behind a 64-byte
//! [`StoreFileHeader`](super::StoreFileHeader). The file is mapped with a
//! shared writable mapping, so `block_mut` mutations land directly in the
//! page cache and `sync` flushes them to disk.
//!
//! ## File Format
//!
//! ```text
//! Offset 0:                      StoreFileHeader (64 bytes)
//! Offset 64:                     Block 0
//! Offset 64 + block_size:        Block 1
//! ...
//! ```
//!
//! ## Safety Considerations
//!
//! Mapped regions become invalid when remapped. This store has fixed
//! geometry, so the mapping is created once and lives as long as the store;
//! `block`/`block_mut` bounds-check the block index and borrow from `self`,
//! which keeps every view inside the mapping's lifetime.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use super::{BlockStore, StoreFileHeader, FILE_HEADER_SIZE, MIN_BLOCK_SIZE};

#[derive(Debug)]
pub struct MmapStore {
    _file: File,
    mmap: MmapMut,
    block_size: usize,
    block_count: u32,
}

impl MmapStore {
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize, block_count: u32) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            block_size >= MIN_BLOCK_SIZE,
            "block size {} below minimum {}",
            block_size,
            MIN_BLOCK_SIZE
        );
        ensure!(block_count > 0, "block count must be at least 1");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        let file_size = FILE_HEADER_SIZE as u64 + block_size as u64 * block_count as u64;
        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally. This is safe because:
        // 1. We just created this file with exclusive access (truncate=true)
        // 2. The file size was set before mapping and never changes
        // 3. The mmap lifetime is tied to MmapStore, preventing use-after-unmap
        // 4. All access goes through block()/block_mut() which bounds-check
        let mut mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        let header = StoreFileHeader::new(block_size as u32, block_count);
        header.write_to(&mut mmap[..FILE_HEADER_SIZE])?;

        Ok(Self {
            _file: file,
            mmap,
            block_size,
            block_count,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open store file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?;

        ensure!(
            metadata.len() >= FILE_HEADER_SIZE as u64,
            "store file '{}' is too small to hold a header",
            path.display()
        );

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally. This is safe because:
        // 1. The file is opened with exclusive read+write access
        // 2. Store files are not meant to be modified by other processes
        // 3. The mmap lifetime is tied to MmapStore, preventing use-after-unmap
        // 4. All access goes through block()/block_mut() which bounds-check
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        let header = StoreFileHeader::from_bytes(&mmap[..FILE_HEADER_SIZE])
            .wrap_err_with(|| format!("invalid store header in '{}'", path.display()))?;

        let block_size = header.block_size() as usize;
        let block_count = header.block_count();

        let expected = FILE_HEADER_SIZE as u64 + block_size as u64 * block_count as u64;
        ensure!(
            metadata.len() == expected,
            "store file '{}' size {} does not match header geometry ({} expected)",
            path.display(),
            metadata.len(),
            expected
        );

        Ok(Self {
            _file: file,
            mmap,
            block_size,
            block_count,
        })
    }

    fn block_offset(&self, block_no: u32) -> usize {
        FILE_HEADER_SIZE + block_no as usize * self.block_size
    }
}

impl BlockStore for MmapStore {
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

        let offset = self.block_offset(block_no);
        Ok(&self.mmap[offset..offset + self.block_size])
    }

    fn block_mut(&mut self, block_no: u32) -> Result<&mut [u8]> {
        ensure!(
            block_no < self.block_count,
            "block {} out of bounds (block_count={})",
            block_no,
            self.block_count
        );

        let offset = self.block_offset(block_no);
        Ok(&mut self.mmap[offset..offset + self.block_size])
    }

    fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync mmap to disk")
    }
}
