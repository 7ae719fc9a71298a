//! # Interior Node Views
//!
//! Interior nodes (the root included) hold separator keys interleaved with
//! child block pointers, one more pointer than keys:
//!
//! ```text
//! +-------------------+
//! | NodeHeader (32B)  |
//! +-------------------+
//! | ptr0 | key0       |
//! | ptr1 | key1       |
//! | ...               |
//! | ptr(n-1) | key(n-1)
//! | ptrn              |
//! +-------------------+
//! ```
//!
//! A separator is an inclusive upper bound for the subtree to its left:
//! `find_child` descends through the first pointer whose key is `>=` the
//! search key, or the rightmost pointer when every separator is smaller.
//!
//! The interleaved layout makes entry insertion a single `copy_within` of
//! the packed region from the displaced key onward, followed by two writes.

use eyre::{ensure, Result, WrapErr};

use crate::error::IndexError;

use super::node::{NodeHeader, NodeKind, NodeLayout, PTR_SIZE};

#[derive(Debug)]
pub struct InteriorNode<'a> {
    layout: NodeLayout,
    data: &'a [u8],
}

pub struct InteriorNodeMut<'a> {
    layout: NodeLayout,
    data: &'a mut [u8],
}

fn check_interior(layout: &NodeLayout, data: &[u8]) -> Result<()> {
    ensure!(
        data.len() == layout.blocksize,
        "invalid block size: {} != {}",
        data.len(),
        layout.blocksize
    );
    let header = NodeHeader::from_bytes(data)?;
    match header.kind()? {
        NodeKind::Root | NodeKind::Interior => Ok(()),
        other => Err(IndexError::BadKind)
            .wrap_err_with(|| format!("expected an interior node, found {:?}", other)),
    }
}

impl<'a> InteriorNode<'a> {
    pub fn from_block(layout: NodeLayout, data: &'a [u8]) -> Result<Self> {
        check_interior(&layout, data)?;
        Ok(Self { layout, data })
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(self.data).unwrap()
    }

    pub fn numkeys(&self) -> u32 {
        self.header().numkeys()
    }

    pub fn key_at(&self, index: usize) -> Result<&'a [u8]> {
        let count = self.numkeys();
        if index >= count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("key slot {} past key count {}", index, count));
        }
        let offset = self.layout.interior_key_offset(index);
        Ok(&self.data[offset..offset + self.layout.keysize])
    }

    /// Child pointer `index`, valid for `0..=numkeys`.
    pub fn child_at(&self, index: usize) -> Result<u32> {
        let count = self.numkeys();
        if index > count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("pointer slot {} past key count {}", index, count));
        }
        let offset = self.layout.interior_ptr_offset(index);
        Ok(u32::from_le_bytes(
            self.data[offset..offset + PTR_SIZE].try_into().unwrap(),
        ))
    }

    /// Picks the child to descend into for `key`. Returns the child block
    /// and its pointer index; the index doubles as the insertion offset for
    /// a separator equal to `key`.
    pub fn find_child(&self, key: &[u8]) -> Result<(u32, usize)> {
        let count = self.numkeys() as usize;

        for i in 0..count {
            if key <= self.key_at(i)? {
                return Ok((self.child_at(i)?, i));
            }
        }

        Ok((self.child_at(count)?, count))
    }
}

impl<'a> InteriorNodeMut<'a> {
    pub fn from_block(layout: NodeLayout, data: &'a mut [u8]) -> Result<Self> {
        check_interior(&layout, data)?;
        Ok(Self { layout, data })
    }

    /// Formats `data` as an empty interior node of the given kind.
    pub fn init(layout: NodeLayout, data: &'a mut [u8], kind: NodeKind) -> Result<Self> {
        ensure!(
            data.len() == layout.blocksize,
            "invalid block size: {} != {}",
            data.len(),
            layout.blocksize
        );
        ensure!(
            matches!(kind, NodeKind::Root | NodeKind::Interior),
            "cannot init an interior view with kind {:?}",
            kind
        );

        let header = NodeHeader::new(
            kind,
            layout.keysize as u32,
            layout.valuesize as u32,
            layout.blocksize as u32,
        );
        header.write_to(data)?;

        Ok(Self { layout, data })
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

    pub fn key_at(&self, index: usize) -> Result<&[u8]> {
        let count = self.numkeys();
        if index >= count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("key slot {} past key count {}", index, count));
        }
        let offset = self.layout.interior_key_offset(index);
        Ok(&self.data[offset..offset + self.layout.keysize])
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) -> Result<()> {
        let count = self.numkeys();
        if index >= count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("key slot {} past key count {}", index, count));
        }
        ensure!(
            key.len() == self.layout.keysize,
            "key length {} != keysize {}",
            key.len(),
            self.layout.keysize
        );
        let offset = self.layout.interior_key_offset(index);
        self.data[offset..offset + self.layout.keysize].copy_from_slice(key);
        Ok(())
    }

    pub fn child_at(&self, index: usize) -> Result<u32> {
        let count = self.numkeys();
        if index > count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("pointer slot {} past key count {}", index, count));
        }
        let offset = self.layout.interior_ptr_offset(index);
        Ok(u32::from_le_bytes(
            self.data[offset..offset + PTR_SIZE].try_into().unwrap(),
        ))
    }

    pub fn set_child_at(&mut self, index: usize, block_no: u32) -> Result<()> {
        let count = self.numkeys();
        if index > count as usize {
            return Err(IndexError::OutOfBounds)
                .wrap_err_with(|| format!("pointer slot {} past key count {}", index, count));
        }
        let offset = self.layout.interior_ptr_offset(index);
        self.data[offset..offset + PTR_SIZE].copy_from_slice(&block_no.to_le_bytes());
        Ok(())
    }

    /// Inserts `key` at key slot `index` with `right_child` as the pointer
    /// to its right. Existing slots from `index` onward shift one stride.
    pub fn insert_entry(&mut self, index: usize, key: &[u8], right_child: u32) -> Result<()> {
        let count = self.numkeys() as usize;
        ensure!(
            count < self.layout.max_keys(),
            "interior node is at physical capacity ({} keys)",
            count
        );
        ensure!(
            index <= count,
            "insert offset {} past key count {}",
            index,
            count
        );
        ensure!(
            key.len() == self.layout.keysize,
            "key length {} != keysize {}",
            key.len(),
            self.layout.keysize
        );

        // Shift key(index)..ptr(count) right by one (key, ptr) stride; the
        // region is contiguous in the interleaved layout.
        let start = self.layout.interior_key_offset(index);
        let end = self.layout.interior_ptr_offset(count) + PTR_SIZE;
        let stride = self.layout.keysize + PTR_SIZE;
        if start < end {
            self.data.copy_within(start..end, start + stride);
        }

        self.set_numkeys(count as u32 + 1);
        self.set_key_at(index, key)?;
        self.set_child_at(index + 1, right_child)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_kind;

    const LAYOUT: NodeLayout = NodeLayout {
        keysize: 4,
        valuesize: 8,
        blocksize: 512,
    };

    fn build_node<'a>(data: &'a mut [u8], keys: &[&[u8; 4]], children: &[u32]) -> InteriorNodeMut<'a> {
        let mut node = InteriorNodeMut::init(LAYOUT, data, NodeKind::Interior).unwrap();
        node.set_numkeys(keys.len() as u32);
        for (i, key) in keys.iter().enumerate() {
            node.set_key_at(i, *key).unwrap();
        }
        for (i, child) in children.iter().enumerate() {
            node.set_child_at(i, *child).unwrap();
        }
        node
    }

    #[test]
    fn find_child_routes_by_inclusive_upper_bound() {
        let mut block = vec![0u8; 512];
        let node = build_node(&mut block, &[b"DDDD", b"MMMM"], &[2, 3, 4]);

        assert_eq!(node.header().numkeys(), 2);

        let read = InteriorNode::from_block(LAYOUT, &block).unwrap();
        assert_eq!(read.find_child(b"AAAA").unwrap(), (2, 0));
        assert_eq!(read.find_child(b"DDDD").unwrap(), (2, 0));
        assert_eq!(read.find_child(b"EEEE").unwrap(), (3, 1));
        assert_eq!(read.find_child(b"MMMM").unwrap(), (3, 1));
        assert_eq!(read.find_child(b"ZZZZ").unwrap(), (4, 2));
    }

    #[test]
    fn insert_entry_shifts_keys_and_pointers() {
        let mut block = vec![0u8; 512];
        let mut node = build_node(&mut block, &[b"DDDD", b"MMMM"], &[2, 3, 4]);

        node.insert_entry(1, b"HHHH", 9).unwrap();

        let read = InteriorNode::from_block(LAYOUT, &block).unwrap();
        assert_eq!(read.numkeys(), 3);
        assert_eq!(read.key_at(0).unwrap(), b"DDDD");
        assert_eq!(read.key_at(1).unwrap(), b"HHHH");
        assert_eq!(read.key_at(2).unwrap(), b"MMMM");
        assert_eq!(read.child_at(0).unwrap(), 2);
        assert_eq!(read.child_at(1).unwrap(), 3);
        assert_eq!(read.child_at(2).unwrap(), 9);
        assert_eq!(read.child_at(3).unwrap(), 4);
    }

    #[test]
    fn insert_entry_at_rightmost_slot() {
        let mut block = vec![0u8; 512];
        let mut node = build_node(&mut block, &[b"DDDD"], &[2, 3]);

        node.insert_entry(1, b"MMMM", 9).unwrap();

        let read = InteriorNode::from_block(LAYOUT, &block).unwrap();
        assert_eq!(read.key_at(1).unwrap(), b"MMMM");
        assert_eq!(read.child_at(1).unwrap(), 3);
        assert_eq!(read.child_at(2).unwrap(), 9);
    }

    #[test]
    fn pointer_count_is_numkeys_plus_one() {
        let mut block = vec![0u8; 512];
        let node = build_node(&mut block, &[b"DDDD", b"MMMM"], &[2, 3, 4]);

        assert!(node.child_at(2).is_ok());
        let result = node.child_at(3);
        assert!(result.is_err());
        assert_eq!(
            error_kind(&result.unwrap_err()),
            Some(IndexError::OutOfBounds)
        );
    }

    #[test]
    fn from_block_accepts_root_kind() {
        let mut block = vec![0u8; 512];
        InteriorNodeMut::init(LAYOUT, &mut block, NodeKind::Root).unwrap();

        assert!(InteriorNode::from_block(LAYOUT, &block).is_ok());
    }

    #[test]
    fn from_block_rejects_leaf_kind() {
        let mut block = vec![0u8; 512];
        NodeHeader::new(NodeKind::Leaf, 4, 8, 512)
            .write_to(&mut block)
            .unwrap();

        let result = InteriorNode::from_block(LAYOUT, &block);
        assert!(result.is_err());
        assert_eq!(
            error_kind(&result.unwrap_err()),
            Some(IndexError::BadKind)
        );
    }
}
