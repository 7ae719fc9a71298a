//! # Store File Header
//!
//! Persistent stores begin with a 64-byte header that records the file's
//! geometry, so a store can be reopened without out-of-band configuration.
//! Block 0 starts immediately after the header.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------------
//! 0       16    magic        b"cairn blockfile\0"
//! 16      4     version      Format version (currently 1)
//! 20      4     block_size   Bytes per block
//! 24      4     block_count  Number of blocks in the file
//! 28      4     checksum     CRC-32 (iSCSI) over bytes 0..28
//! 32      32    reserved     Zeroed
//! ```
//!
//! All multi-byte fields are little-endian. The checksum covers everything
//! before it, so a torn or foreign header fails closed on open.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::FILE_HEADER_SIZE;

pub const STORE_MAGIC: &[u8; 16] = b"cairn blockfile\0";
pub const STORE_VERSION: u32 = 1;

const HEADER_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StoreFileHeader {
    magic: [u8; 16],
    version: U32,
    block_size: U32,
    block_count: U32,
    checksum: U32,
    reserved: [u8; 32],
}

const _: () = assert!(std::mem::size_of::<StoreFileHeader>() == FILE_HEADER_SIZE);

impl StoreFileHeader {
    pub fn new(block_size: u32, block_count: u32) -> Self {
        let mut header = Self {
            magic: *STORE_MAGIC,
            version: U32::new(STORE_VERSION),
            block_size: U32::new(block_size),
            block_count: U32::new(block_count),
            checksum: U32::new(0),
            reserved: [0u8; 32],
        };
        header.checksum = U32::new(header.compute_checksum());
        header
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for StoreFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse StoreFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == STORE_MAGIC,
            "invalid magic bytes in store file"
        );

        ensure!(
            header.version.get() == STORE_VERSION,
            "unsupported store version: {} (expected {})",
            header.version.get(),
            STORE_VERSION
        );

        ensure!(
            header.checksum.get() == header.compute_checksum(),
            "store header checksum mismatch"
        );

        Ok(header)
    }

    pub fn write_to(&self, bytes: &mut [u8]) -> Result<()> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for StoreFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        bytes[..FILE_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn block_size(&self) -> u32 {
        self.block_size.get()
    }

    pub fn block_count(&self) -> u32 {
        self.block_count.get()
    }

    fn compute_checksum(&self) -> u32 {
        HEADER_CRC.checksum(&self.as_bytes()[..28])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_64() {
        assert_eq!(std::mem::size_of::<StoreFileHeader>(), 64);
    }

    #[test]
    fn header_roundtrip() {
        let header = StoreFileHeader::new(512, 64);

        let mut bytes = [0u8; FILE_HEADER_SIZE];
        header.write_to(&mut bytes).unwrap();
        let parsed = StoreFileHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.block_size(), 512);
        assert_eq!(parsed.block_count(), 64);
    }

    #[test]
    fn header_rejects_invalid_magic() {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        bytes[..16].copy_from_slice(b"Invalid Magic!!!");

        assert!(StoreFileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn header_rejects_corrupted_geometry() {
        let header = StoreFileHeader::new(512, 64);
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        header.write_to(&mut bytes).unwrap();

        bytes[20] ^= 0xFF;

        let result = StoreFileHeader::from_bytes(&bytes);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("checksum"));
    }

    #[test]
    fn header_too_small_buffer() {
        let bytes = [0u8; 32];

        assert!(StoreFileHeader::from_bytes(&bytes).is_err());
    }
}
