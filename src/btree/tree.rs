//! # B+Tree Engine
//!
//! `BTreeIndex` ties the node views and the free-list allocator together
//! into the public index surface: attach/detach, lookup, insert, update,
//! range scan, plus the sanity checker and the diagnostic dumps.
//!
//! ## Descent
//!
//! Every operation starts at the superblock's root pointer and walks down
//! by separator comparison:
//!
//! ```text
//! 1. Read the current block, dispatch on its header kind
//! 2. Root/Interior: take the first branch whose separator >= key,
//!    or the rightmost branch; push the block onto the trail
//! 3. Leaf: linear slot scan for the exact key
//! ```
//!
//! The trail of interior blocks recorded on the way down replaces parent
//! pointers: when a split must promote a separator, the parent is popped
//! off the trail.
//!
//! ## Insert
//!
//! ```text
//! 1. Lookup first; a hit is a Conflict
//! 2. Empty root: seed the tree with a pair of fresh leaves
//! 3. Otherwise descend, reserve blocks for the worst-case split cascade,
//!    and place the pair in its leaf
//! 4. While the newest written node exceeds the split threshold, split it:
//!    the over-full block keeps the lower half, a fresh block takes the
//!    upper half, and the separator goes into the parent (or into a newly
//!    allocated root when the cascade outgrows the trail)
//! ```
//!
//! Reserving up front means a NoSpace failure happens before the first
//! mutation, leaving the tree and the free list bytewise untouched.
//!
//! ## Failure Model
//!
//! Errors carry an [`IndexError`] kind and propagate to the caller; nothing
//! is retried or recovered internally. A store write failure mid-cascade
//! leaves the tree in an undefined state; the index is synchronous and
//! single-writer, and crash recovery belongs to the layer below.

use std::io;

use eyre::{ensure, eyre, Result, WrapErr};
use smallvec::SmallVec;

use crate::error::{error_kind, IndexError};
use crate::storage::BlockStore;

use super::check;
use super::display::{self, DisplayMode};
use super::freelist;
use super::interior::{InteriorNode, InteriorNodeMut};
use super::leaf::{LeafNode, LeafNodeMut, SearchResult};
use super::node::{NodeHeader, NodeKind, NodeLayout, NULL_BLOCK, SUPERBLOCK};

/// Blocks from the root to a leaf, recorded during descent. Eight levels
/// cover any realistic tree without spilling to the heap.
type Trail = SmallVec<[u32; 8]>;

pub struct BTreeIndex<S> {
    store: S,
    keysize: usize,
    valuesize: usize,
    #[allow(dead_code)]
    unique: bool,
    superblock: Option<NodeHeader>,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Creates a detached index over `store`. The `unique` flag is carried
    /// for interface compatibility; keys are always unique.
    pub fn new(store: S, keysize: usize, valuesize: usize, unique: bool) -> Self {
        Self {
            store,
            keysize,
            valuesize,
            unique,
            superblock: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the index and hands the store back.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn keysize(&self) -> usize {
        self.keysize
    }

    pub fn valuesize(&self) -> usize {
        self.valuesize
    }

    fn meta(&self) -> Result<&NodeHeader> {
        self.superblock
            .as_ref()
            .ok_or_else(|| eyre!("index is not attached"))
    }

    fn layout(&self) -> Result<NodeLayout> {
        Ok(NodeLayout::from_header(self.meta()?))
    }

    /// Formats (when `create`) and mounts the tree rooted at `init_block`.
    pub fn attach(&mut self, init_block: u32, create: bool) -> Result<()> {
        ensure!(
            init_block == SUPERBLOCK,
            "superblock must live at block 0, got {}",
            init_block
        );

        let blocksize = self.store.block_size();
        let block_count = self.store.block_count();
        let layout = NodeLayout {
            keysize: self.keysize,
            valuesize: self.valuesize,
            blocksize,
        };
        layout.validate()?;
        ensure!(
            block_count >= 3,
            "store must hold at least 3 blocks, has {}",
            block_count
        );

        if create {
            let existing = NodeHeader::from_bytes(self.store.block(SUPERBLOCK)?)?;
            ensure!(
                existing.kind_byte() != NodeKind::Superblock as u8,
                "store already contains a formatted index"
            );

            let mut superblock = NodeHeader::new(
                NodeKind::Superblock,
                self.keysize as u32,
                self.valuesize as u32,
                blocksize as u32,
            );
            superblock.set_rootnode(1);
            superblock.set_freelist(2);
            superblock.set_freecount(block_count - 2);
            superblock.write_to(self.store.block_mut(SUPERBLOCK)?)?;
            self.store.note_allocate(SUPERBLOCK);

            let mut root = NodeHeader::new(
                NodeKind::Root,
                self.keysize as u32,
                self.valuesize as u32,
                blocksize as u32,
            );
            root.set_rootnode(1);
            root.write_to(self.store.block_mut(1)?)?;
            self.store.note_allocate(1);

            for i in 2..block_count {
                let mut free = NodeHeader::new(
                    NodeKind::Unallocated,
                    self.keysize as u32,
                    self.valuesize as u32,
                    blocksize as u32,
                );
                free.set_freelist(if i + 1 < block_count { i + 1 } else { NULL_BLOCK });
                free.write_to(self.store.block_mut(i)?)?;
            }
        }

        // Mounting is just reading the superblock back.
        let header = *NodeHeader::from_bytes(self.store.block(init_block)?)?;
        match header.kind()? {
            NodeKind::Superblock => {}
            other => {
                return Err(IndexError::BadKind)
                    .wrap_err_with(|| format!("block 0 holds a {:?}, not a superblock", other));
            }
        }
        ensure!(
            header.keysize() as usize == self.keysize,
            "index was formatted with keysize {}, constructed with {}",
            header.keysize(),
            self.keysize
        );
        ensure!(
            header.valuesize() as usize == self.valuesize,
            "index was formatted with valuesize {}, constructed with {}",
            header.valuesize(),
            self.valuesize
        );
        ensure!(
            header.blocksize() as usize == blocksize,
            "index was formatted with blocksize {}, store has {}",
            header.blocksize(),
            blocksize
        );

        self.superblock = Some(header);
        Ok(())
    }

    /// Persists the superblock and syncs the store. Returns the superblock
    /// index for a later `attach`.
    pub fn detach(&mut self) -> Result<u32> {
        let meta = self
            .superblock
            .take()
            .ok_or_else(|| eyre!("index is not attached"))?;

        freelist::persist_superblock(&mut self.store, &meta)?;
        self.store.sync()?;
        Ok(SUPERBLOCK)
    }

    pub fn lookup(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;

        let (_, leaf_block) = self.descend(key)?;
        let leaf = LeafNode::from_block(self.layout()?, self.store.block(leaf_block)?)?;

        match leaf.find_key(key)? {
            SearchResult::Found(i) => Ok(leaf.value_at(i)?.to_vec()),
            SearchResult::NotFound(_) => Err(IndexError::NonExistent)
                .wrap_err_with(|| format!("key not found in leaf block {}", leaf_block)),
        }
    }

    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let layout = self.layout()?;
        let (_, leaf_block) = self.descend(key)?;

        let index = {
            let leaf = LeafNode::from_block(layout, self.store.block(leaf_block)?)?;
            match leaf.find_key(key)? {
                SearchResult::Found(i) => i,
                SearchResult::NotFound(_) => {
                    return Err(IndexError::NonExistent)
                        .wrap_err_with(|| format!("key not found in leaf block {}", leaf_block));
                }
            }
        };

        let mut leaf = LeafNodeMut::from_block(layout, self.store.block_mut(leaf_block)?)?;
        leaf.set_value_at(index, value)?;
        Ok(())
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        match self.lookup(key) {
            Ok(_) => {
                return Err(IndexError::Conflict)
                    .wrap_err_with(|| format!("key {:?} already present", ascii(key)));
            }
            Err(e) if error_kind(&e) == Some(IndexError::NonExistent) => {}
            Err(e) => return Err(e),
        }

        let layout = self.layout()?;
        let meta = self.meta()?;
        let root_block = meta.rootnode();
        let root_keys = NodeHeader::from_bytes(self.store.block(root_block)?)?.numkeys();

        if root_keys == 0 {
            self.seed_tree(root_block, key, value)?;
        } else {
            let (mut trail, leaf_block) = self.descend(key)?;

            let needed = self.blocks_needed(&trail, leaf_block)?;
            let free = self.meta()?.freecount();
            if free < needed {
                return Err(IndexError::NoSpace).wrap_err_with(|| {
                    format!("split cascade needs {} blocks, {} free", needed, free)
                });
            }

            let index = {
                let leaf = LeafNode::from_block(layout, self.store.block(leaf_block)?)?;
                match leaf.find_key(key)? {
                    SearchResult::NotFound(i) => i,
                    SearchResult::Found(_) => {
                        return Err(IndexError::Conflict)
                            .wrap_err_with(|| format!("key {:?} already present", ascii(key)));
                    }
                }
            };

            {
                let mut leaf = LeafNodeMut::from_block(layout, self.store.block_mut(leaf_block)?)?;
                leaf.insert_at(index, key, value)?;
            }

            let threshold = layout.split_threshold();
            let mut over = leaf_block;
            loop {
                let keys = NodeHeader::from_bytes(self.store.block(over)?)?.numkeys() as usize;
                if keys <= threshold {
                    break;
                }
                match self.split_node(over, &mut trail)? {
                    Some(parent) => over = parent,
                    None => break,
                }
            }
        }

        let Self {
            store, superblock, ..
        } = self;
        let meta = superblock
            .as_mut()
            .ok_or_else(|| eyre!("index is not attached"))?;
        meta.set_numkeys(meta.numkeys() + 1);
        freelist::persist_superblock(store, meta)?;
        Ok(())
    }

    pub fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(IndexError::Unimplemented).wrap_err("delete is not supported")
    }

    /// Collects every `(key, value)` pair with `min <= key <= max`, in key
    /// order, by walking the leaf sibling chain.
    pub fn range(&self, min: &[u8], max: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_key(min)?;
        self.check_key(max)?;

        let mut out = Vec::new();
        if min > max {
            return Ok(out);
        }

        let leaf_block = match self.descend(min) {
            Ok((_, leaf)) => leaf,
            Err(e) if error_kind(&e) == Some(IndexError::NonExistent) => return Ok(out),
            Err(e) => return Err(e),
        };

        let layout = self.layout()?;
        let mut current = leaf_block;
        loop {
            let leaf = LeafNode::from_block(layout, self.store.block(current)?)
                .wrap_err_with(|| format!("leaf sibling chain reached block {}", current))?;

            for i in 0..leaf.numkeys() as usize {
                let k = leaf.key_at(i)?;
                if k < min {
                    continue;
                }
                if k > max {
                    return Ok(out);
                }
                out.push((k.to_vec(), leaf.value_at(i)?.to_vec()));
            }

            current = leaf.sibling();
            if current == NULL_BLOCK {
                break;
            }
        }

        Ok(out)
    }

    /// Walks the whole tree and verifies every structural invariant.
    pub fn sanity_check(&self) -> Result<()> {
        check::sanity_walk(&self.store, self.meta()?)
    }

    /// Dumps the tree to `out` in the requested format. Observational only.
    pub fn display(&self, out: &mut dyn io::Write, mode: DisplayMode) -> Result<()> {
        display::dump(&self.store, self.meta()?, out, mode)
    }

    /// Total live keys in the tree.
    pub fn key_count(&self) -> Result<u32> {
        Ok(self.meta()?.numkeys())
    }

    /// Blocks remaining on the free list.
    pub fn free_blocks(&self) -> Result<u32> {
        Ok(self.meta()?.freecount())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        ensure!(
            key.len() == self.keysize,
            "key length {} != keysize {}",
            key.len(),
            self.keysize
        );
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        ensure!(
            value.len() == self.valuesize,
            "value length {} != valuesize {}",
            value.len(),
            self.valuesize
        );
        Ok(())
    }

    /// Shared descent: walks from the root to the leaf that would hold
    /// `key`, returning the interior trail and the leaf block. Fails with
    /// `NonExistent` when the tree is empty.
    fn descend(&self, key: &[u8]) -> Result<(Trail, u32)> {
        let layout = self.layout()?;
        let mut trail = Trail::new();
        let mut current = self.meta()?.rootnode();

        loop {
            let block = self.store.block(current)?;
            let header = NodeHeader::from_bytes(block)?;
            let kind = header
                .kind()
                .wrap_err_with(|| format!("while descending at block {}", current))?;

            match kind {
                NodeKind::Root | NodeKind::Interior => {
                    if header.numkeys() == 0 {
                        return Err(IndexError::NonExistent)
                            .wrap_err_with(|| format!("block {} has no keys to descend", current));
                    }
                    let interior = InteriorNode::from_block(layout, block)?;
                    let (child, _) = interior.find_child(key)?;
                    trail.push(current);
                    current = child;
                }
                NodeKind::Leaf => return Ok((trail, current)),
                other => {
                    return Err(IndexError::Insane).wrap_err_with(|| {
                        format!("block {} of kind {:?} on the descent path", current, other)
                    });
                }
            }
        }
    }

    /// First insert into an empty tree: one leaf holding the pair, one
    /// empty right sibling, and a single separator in the root.
    fn seed_tree(&mut self, root_block: u32, key: &[u8], value: &[u8]) -> Result<()> {
        let layout = self.layout()?;

        let free = self.meta()?.freecount();
        if free < 2 {
            return Err(IndexError::NoSpace)
                .wrap_err_with(|| format!("seeding the tree needs 2 blocks, {} free", free));
        }

        let left = self.allocate_block()?;
        let right = self.allocate_block()?;

        {
            let data = self.store.block_mut(left)?;
            let mut leaf = LeafNodeMut::init(layout, data)?;
            leaf.insert_at(0, key, value)?;
            leaf.set_sibling(right);
        }
        {
            let data = self.store.block_mut(right)?;
            LeafNodeMut::init(layout, data)?;
        }
        {
            let data = self.store.block_mut(root_block)?;
            let mut root = InteriorNodeMut::from_block(layout, data)?;
            root.set_numkeys(1);
            root.set_key_at(0, key)?;
            root.set_child_at(0, left)?;
            root.set_child_at(1, right)?;
        }

        Ok(())
    }

    /// Blocks the pending insertion could consume in the worst case: one
    /// per splitting level, plus one more if the cascade reaches the root.
    fn blocks_needed(&self, trail: &[u32], leaf_block: u32) -> Result<u32> {
        let layout = self.layout()?;
        let threshold = layout.split_threshold() as u32;

        let leaf_keys = NodeHeader::from_bytes(self.store.block(leaf_block)?)?.numkeys();
        if leaf_keys + 1 <= threshold {
            return Ok(0);
        }

        let mut needed = 1;
        for &node in trail.iter().rev() {
            let keys = NodeHeader::from_bytes(self.store.block(node)?)?.numkeys();
            if keys + 1 <= threshold {
                return Ok(needed);
            }
            needed += 1;
        }

        // The cascade swallows the whole trail; the root split allocates a
        // fresh root on top.
        Ok(needed + 1)
    }

    /// Splits the over-full `block`: the block keeps the lower half, a
    /// fresh block takes the upper half, and the separator is promoted into
    /// the parent popped from `trail`. Returns the parent (which may now be
    /// over-full itself) or `None` when a new root was created.
    fn split_node(&mut self, block: u32, trail: &mut Trail) -> Result<Option<u32>> {
        let layout = self.layout()?;
        let snapshot = self.store.block(block)?.to_vec();
        let header = NodeHeader::from_bytes(&snapshot)?;
        let kind = header.kind()?;
        let n = header.numkeys() as usize;
        let mid = n / 2;

        let right_block = self.allocate_block()?;
        let separator: Vec<u8>;

        match kind {
            NodeKind::Leaf => {
                let old = LeafNode::from_block(layout, &snapshot)?;
                // B+ leaf split: the separator is the left half's maximum
                // and the key itself stays in the leaf.
                separator = old.key_at(mid - 1)?.to_vec();

                {
                    let data = self.store.block_mut(right_block)?;
                    let mut right = LeafNodeMut::init(layout, data)?;
                    right.set_numkeys((n - mid) as u32);
                    for dst in 0..n - mid {
                        right.set_key_at(dst, old.key_at(mid + dst)?)?;
                        right.set_value_at(dst, old.value_at(mid + dst)?)?;
                    }
                    right.set_sibling(old.sibling());
                }
                {
                    let data = self.store.block_mut(block)?;
                    let mut left = LeafNodeMut::from_block(layout, data)?;
                    left.truncate(mid as u32)?;
                    left.set_sibling(right_block);
                }
            }
            NodeKind::Interior | NodeKind::Root => {
                let old = InteriorNode::from_block(layout, &snapshot)?;
                // Interior split: the median key moves up, it is not kept
                // in either half.
                separator = old.key_at(mid)?.to_vec();

                {
                    let data = self.store.block_mut(right_block)?;
                    let mut right = InteriorNodeMut::init(layout, data, NodeKind::Interior)?;
                    let right_keys = n - mid - 1;
                    right.set_numkeys(right_keys as u32);
                    for dst in 0..right_keys {
                        right.set_key_at(dst, old.key_at(mid + 1 + dst)?)?;
                        right.set_child_at(dst, old.child_at(mid + 1 + dst)?)?;
                    }
                    right.set_child_at(right_keys, old.child_at(n)?)?;
                }
                {
                    let data = self.store.block_mut(block)?;
                    NodeHeader::from_bytes_mut(data)?.set_numkeys(mid as u32);
                }
            }
            other => {
                return Err(IndexError::Insane)
                    .wrap_err_with(|| format!("attempted to split block {} of kind {:?}", block, other));
            }
        }

        if kind == NodeKind::Root {
            let new_root = self.allocate_block()?;

            {
                let data = self.store.block_mut(block)?;
                NodeHeader::from_bytes_mut(data)?.set_kind(NodeKind::Interior);
            }
            {
                let data = self.store.block_mut(new_root)?;
                let mut root = InteriorNodeMut::init(layout, data, NodeKind::Root)?;
                root.set_numkeys(1);
                root.set_key_at(0, &separator)?;
                root.set_child_at(0, block)?;
                root.set_child_at(1, right_block)?;
            }

            let Self {
                store, superblock, ..
            } = self;
            let meta = superblock
                .as_mut()
                .ok_or_else(|| eyre!("index is not attached"))?;
            meta.set_rootnode(new_root);
            freelist::persist_superblock(store, meta)?;

            Ok(None)
        } else {
            let parent = trail
                .pop()
                .ok_or(IndexError::Insane)
                .wrap_err("split cascade ran past the recorded trail")?;

            let pos = {
                let node = InteriorNode::from_block(layout, self.store.block(parent)?)?;
                node.find_child(&separator)?.1
            };
            let mut node = InteriorNodeMut::from_block(layout, self.store.block_mut(parent)?)?;
            node.insert_entry(pos, &separator, right_block)?;

            Ok(Some(parent))
        }
    }

    fn allocate_block(&mut self) -> Result<u32> {
        let Self {
            store, superblock, ..
        } = self;
        let meta = superblock
            .as_mut()
            .ok_or_else(|| eyre!("index is not attached"))?;
        freelist::allocate(store, meta)
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn fresh_index(blocksize: usize, blocks: u32) -> BTreeIndex<MemoryStore> {
        let store = MemoryStore::new(blocksize, blocks).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        index
    }

    fn key(i: usize) -> Vec<u8> {
        format!("{:04}", i).into_bytes()
    }

    fn value(i: usize) -> Vec<u8> {
        format!("val{:05}", i).into_bytes()
    }

    #[test]
    fn attach_formats_superblock_root_and_free_chain() {
        let index = fresh_index(512, 8);
        let store = index.store();

        let superblock = NodeHeader::from_bytes(store.block(0).unwrap()).unwrap();
        assert_eq!(superblock.kind().unwrap(), NodeKind::Superblock);
        assert_eq!(superblock.rootnode(), 1);
        assert_eq!(superblock.freelist(), 2);
        assert_eq!(superblock.freecount(), 6);

        let root = NodeHeader::from_bytes(store.block(1).unwrap()).unwrap();
        assert_eq!(root.kind().unwrap(), NodeKind::Root);
        assert_eq!(root.numkeys(), 0);

        for i in 2..8u32 {
            let free = NodeHeader::from_bytes(store.block(i).unwrap()).unwrap();
            assert_eq!(free.kind().unwrap(), NodeKind::Unallocated);
            assert_eq!(free.freelist(), if i < 7 { i + 1 } else { 0 });
        }
    }

    #[test]
    fn attach_refuses_nonzero_init_block() {
        let store = MemoryStore::new(512, 8).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);

        assert!(index.attach(1, true).is_err());
    }

    #[test]
    fn attach_refuses_reformat() {
        let mut index = fresh_index(512, 8);
        let result = index.attach(0, true);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("already contains a formatted index"));
    }

    #[test]
    fn attach_rejects_mismatched_geometry() {
        let mut index = fresh_index(512, 8);
        index.detach().unwrap();
        let store = std::mem::replace(&mut index.store, MemoryStore::new(512, 8).unwrap());

        let mut reopened = BTreeIndex::new(store, 8, 8, true);
        let result = reopened.attach(0, false);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("keysize"));
    }

    #[test]
    fn lookup_on_empty_tree_is_nonexistent() {
        let index = fresh_index(512, 8);

        let result = index.lookup(b"ZZZZ");

        assert!(result.is_err());
        assert_eq!(
            error_kind(&result.unwrap_err()),
            Some(IndexError::NonExistent)
        );
    }

    #[test]
    fn first_insert_seeds_root_and_two_leaves() {
        let mut index = fresh_index(512, 8);

        index.insert(b"AAAA", b"xxxxxxxx").unwrap();

        assert_eq!(index.lookup(b"AAAA").unwrap(), b"xxxxxxxx");
        index.sanity_check().unwrap();

        let root = InteriorNode::from_block(
            index.layout().unwrap(),
            index.store().block(1).unwrap(),
        )
        .unwrap();
        assert_eq!(root.numkeys(), 1);
        assert_eq!(root.key_at(0).unwrap(), b"AAAA");
    }

    #[test]
    fn duplicate_insert_is_conflict_and_keeps_first_value() {
        let mut index = fresh_index(512, 8);

        index.insert(b"AAAA", b"value--1").unwrap();
        let result = index.insert(b"AAAA", b"value--2");

        assert!(result.is_err());
        assert_eq!(error_kind(&result.unwrap_err()), Some(IndexError::Conflict));
        assert_eq!(index.lookup(b"AAAA").unwrap(), b"value--1");
        assert_eq!(index.key_count().unwrap(), 1);
    }

    #[test]
    fn update_overwrites_in_place() {
        let mut index = fresh_index(512, 8);

        index.insert(b"AAAA", b"value--1").unwrap();
        index.update(b"AAAA", b"value--2").unwrap();

        assert_eq!(index.lookup(b"AAAA").unwrap(), b"value--2");
        assert_eq!(index.key_count().unwrap(), 1);
    }

    #[test]
    fn update_of_missing_key_is_nonexistent() {
        let mut index = fresh_index(512, 8);
        index.insert(b"AAAA", b"value--1").unwrap();

        let result = index.update(b"BBBB", b"value--2");

        assert!(result.is_err());
        assert_eq!(
            error_kind(&result.unwrap_err()),
            Some(IndexError::NonExistent)
        );
    }

    #[test]
    fn delete_is_unimplemented() {
        let mut index = fresh_index(512, 8);

        let result = index.delete(b"AAAA");

        assert!(result.is_err());
        assert_eq!(
            error_kind(&result.unwrap_err()),
            Some(IndexError::Unimplemented)
        );
    }

    #[test]
    fn inserts_survive_leaf_splits() {
        let mut index = fresh_index(512, 64);

        for i in 0..60 {
            index.insert(&key(i), &value(i)).unwrap();
        }

        index.sanity_check().unwrap();
        for i in 0..60 {
            assert_eq!(index.lookup(&key(i)).unwrap(), value(i), "key {}", i);
        }
    }

    #[test]
    fn descending_inserts_split_correctly() {
        let mut index = fresh_index(512, 64);

        for i in (0..60).rev() {
            index.insert(&key(i), &value(i)).unwrap();
        }

        index.sanity_check().unwrap();
        for i in 0..60 {
            assert_eq!(index.lookup(&key(i)).unwrap(), value(i));
        }
    }

    #[test]
    fn root_split_grows_the_tree() {
        let mut index = fresh_index(512, 256);

        for i in 0..1000 {
            index.insert(&key(i), &value(i)).unwrap();
        }

        // The root moved off block 1 once it split.
        assert_ne!(index.meta().unwrap().rootnode(), 1);
        index.sanity_check().unwrap();
        for i in 0..1000 {
            assert_eq!(index.lookup(&key(i)).unwrap(), value(i));
        }
    }

    #[test]
    fn exhaustion_is_nospace_and_leaves_a_sane_tree() {
        let mut index = fresh_index(512, 8);

        let mut stored = Vec::new();
        let mut hit_nospace = false;
        for i in 0..500 {
            match index.insert(&key(i), &value(i)) {
                Ok(()) => stored.push(i),
                Err(e) => {
                    assert_eq!(error_kind(&e), Some(IndexError::NoSpace));
                    hit_nospace = true;
                    break;
                }
            }
        }

        assert!(hit_nospace);
        assert!(!stored.is_empty());
        index.sanity_check().unwrap();
        for i in stored {
            assert_eq!(index.lookup(&key(i)).unwrap(), value(i));
        }
    }

    #[test]
    fn range_scans_across_leaves() {
        let mut index = fresh_index(512, 64);

        for i in 0..60 {
            index.insert(&key(i), &value(i)).unwrap();
        }

        let pairs = index.range(b"0010", b"0020").unwrap();
        assert_eq!(pairs.len(), 11);
        assert_eq!(pairs[0].0, key(10));
        assert_eq!(pairs[10].0, key(20));
        assert_eq!(pairs[3].1, value(13));
    }

    #[test]
    fn range_on_empty_tree_is_empty() {
        let index = fresh_index(512, 8);

        assert!(index.range(b"0000", b"9999").unwrap().is_empty());
    }

    #[test]
    fn range_with_inverted_bounds_is_empty() {
        let mut index = fresh_index(512, 8);
        index.insert(b"AAAA", b"value--1").unwrap();

        assert!(index.range(b"ZZZZ", b"AAAA").unwrap().is_empty());
    }

    #[test]
    fn detach_persists_and_returns_superblock_index() {
        let mut index = fresh_index(512, 8);
        index.insert(b"AAAA", b"value--1").unwrap();

        let init_block = index.detach().unwrap();

        assert_eq!(init_block, 0);
        assert!(index.lookup(b"AAAA").is_err());

        index.attach(0, false).unwrap();
        assert_eq!(index.lookup(b"AAAA").unwrap(), b"value--1");
    }

    #[test]
    fn key_size_is_enforced() {
        let mut index = fresh_index(512, 8);

        assert!(index.insert(b"AA", b"value--1").is_err());
        assert!(index.insert(b"AAAA", b"v").is_err());
        assert!(index.lookup(b"AA").is_err());
    }
}
