//! # Node Header and Block Geometry
//!
//! Every block in the store carries the same 32-byte header, whatever its
//! role. The header tags the block with a kind and repeats the tree's fixed
//! parameters, so any block can be interpreted in isolation.
//!
//! ## Header Layout (32 bytes)
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  ----------------------------------------
//! 0       1     kind       Unallocated / Superblock / Root / Interior / Leaf
//! 1       3     reserved   Zeroed
//! 4       4     keysize    Key width in bytes
//! 8       4     valuesize  Value width in bytes
//! 12      4     blocksize  Block size this tree was formatted with
//! 16      4     rootnode   Root block index (authoritative in the superblock)
//! 20      4     freelist   Next free block (Unallocated) / list head (superblock)
//! 24      4     freecount  Remaining free blocks (superblock only)
//! 28      4     numkeys    Live keys in this node (total keys in the superblock)
//! ```
//!
//! All multi-byte fields are little-endian.
//!
//! ## Slot Geometry
//!
//! The slot area starts right after the header. With `P` the pointer width,
//! `K` the key width and `V` the value width:
//!
//! - **Interior/Root**: `[ptr0, key0, ptr1, key1, ..., key(n-1), ptrn]`,
//!   pointer `i` at `i*(P+K)`, key `i` at `i*(P+K) + P`
//! - **Leaf**: `[sibling, key0, val0, key1, val1, ...]`, key `i` at
//!   `P + i*(K+V)`
//!
//! Both kinds share one capacity, derived from the worst-case pair width:
//! `max_keys = (blocksize - header - P) / max(P+K, K+V)`. The capacity and
//! the two-thirds split threshold are fixed functions of the format-time
//! parameters, computed by [`NodeLayout`].

use eyre::{ensure, Result, WrapErr};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::IndexError;

pub const NODE_HEADER_SIZE: usize = 32;
pub const PTR_SIZE: usize = 4;

/// Block index of the superblock.
pub const SUPERBLOCK: u32 = 0;

/// Null block pointer; terminates the free list and leaf sibling chains.
pub const NULL_BLOCK: u32 = 0;

/// Smallest per-node key capacity a tree will accept. Below this an interior
/// split could leave one side without any key.
pub const MIN_MAX_KEYS: usize = 5;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Unallocated = 0x00,
    Superblock = 0x01,
    Root = 0x02,
    Interior = 0x03,
    Leaf = 0x04,
}

impl NodeKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(NodeKind::Unallocated),
            0x01 => Some(NodeKind::Superblock),
            0x02 => Some(NodeKind::Root),
            0x03 => Some(NodeKind::Interior),
            0x04 => Some(NodeKind::Leaf),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    kind: u8,
    reserved: [u8; 3],
    keysize: U32,
    valuesize: U32,
    blocksize: U32,
    rootnode: U32,
    freelist: U32,
    freecount: U32,
    numkeys: U32,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

/// Getter/setter pairs for the header's little-endian u32 fields.
macro_rules! le_u32_accessors {
    ($($field:ident),+ $(,)?) => {
        ::paste::paste! {
            $(
                #[inline]
                pub fn $field(&self) -> u32 {
                    self.$field.get()
                }

                #[inline]
                pub fn [<set_ $field>](&mut self, val: u32) {
                    self.$field = U32::new(val);
                }
            )+
        }
    };
}

impl NodeHeader {
    pub fn new(kind: NodeKind, keysize: u32, valuesize: u32, blocksize: u32) -> Self {
        Self {
            kind: kind as u8,
            reserved: [0u8; 3],
            keysize: U32::new(keysize),
            valuesize: U32::new(valuesize),
            blocksize: U32::new(blocksize),
            rootnode: U32::new(NULL_BLOCK),
            freelist: U32::new(NULL_BLOCK),
            freecount: U32::new(0),
            numkeys: U32::new(0),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::ref_from_bytes(&data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn write_to(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        data[..NODE_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    /// Decoded node kind, or `BadKind` for a byte outside the legal five.
    pub fn kind(&self) -> Result<NodeKind> {
        NodeKind::from_byte(self.kind)
            .ok_or(IndexError::BadKind)
            .wrap_err_with(|| format!("unknown node kind byte 0x{:02x}", self.kind))
    }

    pub fn kind_byte(&self) -> u8 {
        self.kind
    }

    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind as u8;
    }

    le_u32_accessors! {
        keysize,
        valuesize,
        blocksize,
        rootnode,
        freelist,
        freecount,
        numkeys,
    }
}

/// Slot geometry of a formatted tree. Copy-sized and derived entirely from
/// the format-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub keysize: usize,
    pub valuesize: usize,
    pub blocksize: usize,
}

impl NodeLayout {
    pub fn from_header(header: &NodeHeader) -> Self {
        Self {
            keysize: header.keysize() as usize,
            valuesize: header.valuesize() as usize,
            blocksize: header.blocksize() as usize,
        }
    }

    /// Worst-case slot pair width across both node kinds.
    pub fn slot_stride(&self) -> usize {
        (PTR_SIZE + self.keysize).max(self.keysize + self.valuesize)
    }

    /// Maximum key count per node, shared by interior and leaf nodes.
    pub fn max_keys(&self) -> usize {
        (self.blocksize - NODE_HEADER_SIZE - PTR_SIZE) / self.slot_stride()
    }

    /// A node holding more than this many keys must split.
    pub fn split_threshold(&self) -> usize {
        2 * self.max_keys() / 3
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.keysize > 0, "keysize must be nonzero");
        ensure!(self.valuesize > 0, "valuesize must be nonzero");
        ensure!(
            self.blocksize > NODE_HEADER_SIZE + PTR_SIZE,
            "block size {} leaves no room for slots",
            self.blocksize
        );
        ensure!(
            self.max_keys() >= MIN_MAX_KEYS,
            "geometry allows only {} keys per node, need at least {} \
             (blocksize={}, keysize={}, valuesize={})",
            self.max_keys(),
            MIN_MAX_KEYS,
            self.blocksize,
            self.keysize,
            self.valuesize
        );
        Ok(())
    }

    pub fn interior_ptr_offset(&self, index: usize) -> usize {
        NODE_HEADER_SIZE + index * (PTR_SIZE + self.keysize)
    }

    pub fn interior_key_offset(&self, index: usize) -> usize {
        self.interior_ptr_offset(index) + PTR_SIZE
    }

    pub fn leaf_key_offset(&self, index: usize) -> usize {
        NODE_HEADER_SIZE + PTR_SIZE + index * (self.keysize + self.valuesize)
    }

    pub fn leaf_value_offset(&self, index: usize) -> usize {
        self.leaf_key_offset(index) + self.keysize
    }
}
