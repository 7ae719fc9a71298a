//! # Leaf Node Views
//!
//! A leaf stores sorted fixed-width key/value pairs and a sibling pointer
//! chaining it to the next leaf in key order. Views borrow the block buffer
//! directly; every accessor returns a slice into it, so reads never copy.
//!
//! ## Slot Layout
//!
//! ```text
//! +-------------------+
//! | NodeHeader (32B)  |
//! +-------------------+
//! | sibling (4B)      |  Next leaf in key order, 0 at the chain end
//! +-------------------+
//! | key0 | val0       |  Fixed stride: keysize + valuesize
//! | key1 | val1       |
//! | ...               |
//! +-------------------+
//! ```
//!
//! Insertion shifts the packed slot region with a single `copy_within`, so
//! there is no per-slot shift loop to get wrong at offset zero.

use eyre::{ensure, Result, WrapErr};

use crate::error::IndexError;

use super::node::{NodeHeader, NodeKind, NodeLayout};

/// Outcome of a key search inside one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// Exact match at this slot.
    Found(usize),
    /// No match; the key would be inserted at this slot.
    NotFound(usize),
}

#[derive(Debug)]
pub struct LeafNode<'a> {
    layout: NodeLayout,
    data: &'a [u8],
}

pub struct LeafNodeMut<'a> {
    layout: NodeLayout,
    data: &'a mut [u8],
}

fn check_leaf(layout: &NodeLayout, data: &[u8]) -> Result<()> {
    ensure!(
        data.len() == layout.blocksize,
        "invalid block size: {} != {}",
        data.len(),
        layout.blocksize
    );
    let header = NodeHeader::from_bytes(data)?;
    match header.kind()? {
        NodeKind::Leaf => Ok(()),
        other => {
            Err(IndexError::BadKind).wrap_err_with(|| format!("expected a leaf, found {:?}", other))
        }
    }
}

impl<'a> LeafNode<'a> {
    pub fn from_block(layout: NodeLayout, data: &'a [u8]) -> Result<Self> {
        check_leaf(&layout, data)?;
        Ok(Self { layout, data })
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(self.data).unwrap()
    }

    pub fn numkeys(&self) -> u32 {
        self.header().numkeys()
    }

    pub fn sibling(&self) -> u32 {
        let offset = super::node::NODE_HEADER_SIZE;
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn key_at(&self, index: usize) -> Result<&'a [u8]> {
        ensure_slot(index, self.numkeys())?;
        let offset = self.layout.leaf_key_offset(index);
        Ok(&self.data[offset..offset + self.layout.keysize])
    }

    pub fn value_at(&self, index: usize) -> Result<&'a [u8]> {
        ensure_slot(index, self.numkeys())?;
        let offset = self.layout.leaf_value_offset(index);
        Ok(&self.data[offset..offset + self.layout.valuesize])
    }

    /// Linear scan for `key`. Slots are sorted, so the scan stops at the
    /// first larger key.
    pub fn find_key(&self, key: &[u8]) -> Result<SearchResult> {
        let count = self.numkeys() as usize;

        for i in 0..count {
            match key.cmp(self.key_at(i)?) {
                std::cmp::Ordering::Less => return Ok(SearchResult::NotFound(i)),
                std::cmp::Ordering::Equal => return Ok(SearchResult::Found(i)),
                std::cmp::Ordering::Greater => continue,
            }
        }

        Ok(SearchResult::NotFound(count))
    }
}

impl<'a> LeafNodeMut<'a> {
    pub fn from_block(layout: NodeLayout, data: &'a mut [u8]) -> Result<Self> {
        check_leaf(&layout, data)?;
        Ok(Self { layout, data })
    }

    /// Formats `data` as a fresh, empty leaf.
    pub fn init(layout: NodeLayout, data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == layout.blocksize,
            "invalid block size: {} != {}",
            data.len(),
            layout.blocksize
        );

        let header = NodeHeader::new(
            NodeKind::Leaf,
            layout.keysize as u32,
            layout.valuesize as u32,
            layout.blocksize as u32,
        );
        header.write_to(data)?;

        let mut leaf = Self { layout, data };
        leaf.set_sibling(super::node::NULL_BLOCK);
        Ok(leaf)
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(self.data).unwrap()
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        NodeHeader::from_bytes_mut(self.data).unwrap()
    }

    pub fn numkeys(&self) -> u32 {
        self.header().numkeys()
    }

    pub fn set_numkeys(&mut self, count: u32) {
        self.header_mut().set_numkeys(count);
    }

    pub fn sibling(&self) -> u32 {
        let offset = super::node::NODE_HEADER_SIZE;
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn set_sibling(&mut self, block_no: u32) {
        let offset = super::node::NODE_HEADER_SIZE;
        self.data[offset..offset + 4].copy_from_slice(&block_no.to_le_bytes());
    }

    pub fn key_at(&self, index: usize) -> Result<&[u8]> {
        ensure_slot(index, self.numkeys())?;
        let offset = self.layout.leaf_key_offset(index);
        Ok(&self.data[offset..offset + self.layout.keysize])
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) -> Result<()> {
        ensure_slot(index, self.numkeys())?;
        ensure!(
            key.len() == self.layout.keysize,
            "key length {} != keysize {}",
            key.len(),
            self.layout.keysize
        );
        let offset = self.layout.leaf_key_offset(index);
        self.data[offset..offset + self.layout.keysize].copy_from_slice(key);
        Ok(())
    }

    pub fn value_at(&self, index: usize) -> Result<&[u8]> {
        ensure_slot(index, self.numkeys())?;
        let offset = self.layout.leaf_value_offset(index);
        Ok(&self.data[offset..offset + self.layout.valuesize])
    }

    pub fn set_value_at(&mut self, index: usize, value: &[u8]) -> Result<()> {
        ensure_slot(index, self.numkeys())?;
        ensure!(
            value.len() == self.layout.valuesize,
            "value length {} != valuesize {}",
            value.len(),
            self.layout.valuesize
        );
        let offset = self.layout.leaf_value_offset(index);
        self.data[offset..offset + self.layout.valuesize].copy_from_slice(value);
        Ok(())
    }

    pub fn find_key(&self, key: &[u8]) -> Result<SearchResult> {
        let count = self.numkeys() as usize;

        for i in 0..count {
            match key.cmp(self.key_at(i)?) {
                std::cmp::Ordering::Less => return Ok(SearchResult::NotFound(i)),
                std::cmp::Ordering::Equal => return Ok(SearchResult::Found(i)),
                std::cmp::Ordering::Greater => continue,
            }
        }

        Ok(SearchResult::NotFound(count))
    }

    /// Inserts `(key, value)` at slot `index`, shifting later slots right.
    pub fn insert_at(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<()> {
        let count = self.numkeys() as usize;
        ensure!(
            count < self.layout.max_keys(),
            "leaf is at physical capacity ({} keys)",
            count
        );
        ensure!(
            index <= count,
            "insert offset {} past key count {}",
            index,
            count
        );

        if index < count {
            let start = self.layout.leaf_key_offset(index);
            let end = self.layout.leaf_key_offset(count);
            let stride = self.layout.keysize + self.layout.valuesize;
            self.data.copy_within(start..end, start + stride);
        }

        self.set_numkeys(count as u32 + 1);
        self.set_key_at(index, key)?;
        self.set_value_at(index, value)?;
        Ok(())
    }

    /// Drops every slot at `new_count` and beyond. Used by splits; the stale
    /// bytes past the new count are dead until overwritten.
    pub fn truncate(&mut self, new_count: u32) -> Result<()> {
        ensure!(
            new_count <= self.numkeys(),
            "truncate to {} would grow the node ({} keys)",
            new_count,
            self.numkeys()
        );
        self.set_numkeys(new_count);
        Ok(())
    }
}

fn ensure_slot(index: usize, numkeys: u32) -> Result<()> {
    if index >= numkeys as usize {
        return Err(IndexError::OutOfBounds)
            .wrap_err_with(|| format!("slot {} past key count {}", index, numkeys));
    }
    Ok(())
}
