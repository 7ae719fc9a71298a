//! # Sanity Checker
//!
//! Depth-first verification of every structural invariant the engine is
//! supposed to maintain. The walk is observational; it reads blocks and
//! never writes.
//!
//! Checked per node:
//!
//! - kind is legal for its position (Root only at the top, no Superblock or
//!   Unallocated block reachable from the root)
//! - keys strictly ascending and inside the subtree's separator bounds
//! - key count within the split threshold
//! - interior nodes expose `numkeys + 1` in-range child pointers
//! - no block is reached twice
//!
//! Checked globally:
//!
//! - all leaves sit at the same depth
//! - the leaf sibling chain visits exactly the leaves, in key order
//! - the free list is a well-formed chain of Unallocated blocks whose
//!   length matches the superblock's `freecount`
//! - the reachable set and the free set are disjoint and, with the
//!   superblock, account for every block in the store
//!
//! The first violation is reported as `Insane` with a description; the walk
//! stops there.

use eyre::{Result, WrapErr};
use hashbrown::HashSet;

use crate::error::IndexError;
use crate::storage::BlockStore;

use super::interior::InteriorNode;
use super::leaf::LeafNode;
use super::node::{NodeHeader, NodeKind, NodeLayout, NULL_BLOCK, SUPERBLOCK};

struct WalkState {
    visited: HashSet<u32>,
    leaves: Vec<u32>,
    leaf_depth: Option<usize>,
}

/// Verifies the whole tree under `meta`. Returns the first violation found.
pub fn sanity_walk<S: BlockStore>(store: &S, meta: &NodeHeader) -> Result<()> {
    let layout = NodeLayout::from_header(meta);
    let mut state = WalkState {
        visited: HashSet::new(),
        leaves: Vec::new(),
        leaf_depth: None,
    };

    walk_node(store, layout, meta.rootnode(), 0, None, None, &mut state)?;

    check_sibling_chain(store, layout, &state.leaves)?;
    check_freelist(store, meta, &state.visited)?;

    Ok(())
}

fn insane(msg: String) -> eyre::Report {
    eyre::Report::new(IndexError::Insane).wrap_err(msg)
}

fn walk_node<S: BlockStore>(
    store: &S,
    layout: NodeLayout,
    block: u32,
    depth: usize,
    lo: Option<&[u8]>,
    hi: Option<&[u8]>,
    state: &mut WalkState,
) -> Result<()> {
    if block == SUPERBLOCK || block >= store.block_count() {
        return Err(insane(format!("child pointer {} out of range", block)));
    }
    if !state.visited.insert(block) {
        return Err(insane(format!("block {} reached twice", block)));
    }

    let data = store.block(block)?;
    let header = NodeHeader::from_bytes(data)?;
    let kind = header
        .kind()
        .wrap_err_with(|| format!("while checking block {}", block))?;
    let numkeys = header.numkeys() as usize;

    let threshold = layout.split_threshold();
    if numkeys > threshold {
        return Err(insane(format!(
            "block {} holds {} keys, over the split threshold {}",
            block, numkeys, threshold
        )));
    }

    match kind {
        NodeKind::Root => {
            if depth != 0 {
                return Err(insane(format!("root-kind block {} below the root", block)));
            }
            check_interior_node(store, layout, block, depth, lo, hi, state)
        }
        NodeKind::Interior => {
            if depth == 0 {
                return Err(insane(format!(
                    "superblock points at interior-kind block {}",
                    block
                )));
            }
            check_interior_node(store, layout, block, depth, lo, hi, state)
        }
        NodeKind::Leaf => {
            state.leaves.push(block);
            match state.leaf_depth {
                None => state.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(insane(format!(
                        "leaf block {} at depth {}, others at {}",
                        block, depth, expected
                    )));
                }
                Some(_) => {}
            }
            check_leaf_node(layout, block, data, lo, hi)
        }
        other => Err(insane(format!(
            "block {} of kind {:?} reachable from the root",
            block, other
        ))),
    }
}

fn check_interior_node<S: BlockStore>(
    store: &S,
    layout: NodeLayout,
    block: u32,
    depth: usize,
    lo: Option<&[u8]>,
    hi: Option<&[u8]>,
    state: &mut WalkState,
) -> Result<()> {
    let data = store.block(block)?;
    let node = InteriorNode::from_block(layout, data)?;
    let numkeys = node.numkeys() as usize;

    if numkeys == 0 {
        // Only the root of an empty tree may be keyless; it has no children.
        if depth == 0 {
            return Ok(());
        }
        return Err(insane(format!("interior block {} has no keys", block)));
    }

    for i in 0..numkeys {
        let key = node.key_at(i)?;
        if i + 1 < numkeys && node.key_at(i + 1)? <= key {
            return Err(insane(format!("keys out of order in block {}", block)));
        }
        if let Some(lo) = lo {
            if key <= lo {
                return Err(insane(format!(
                    "key below its subtree lower bound in block {}",
                    block
                )));
            }
        }
        if let Some(hi) = hi {
            if key > hi {
                return Err(insane(format!(
                    "key above its subtree upper bound in block {}",
                    block
                )));
            }
        }
    }

    for i in 0..=numkeys {
        let child = node.child_at(i)?;
        let child_lo = if i == 0 { lo } else { Some(node.key_at(i - 1)?) };
        let child_hi = if i == numkeys {
            hi
        } else {
            Some(node.key_at(i)?)
        };
        walk_node(store, layout, child, depth + 1, child_lo, child_hi, state)?;
    }

    Ok(())
}

fn check_leaf_node(
    layout: NodeLayout,
    block: u32,
    data: &[u8],
    lo: Option<&[u8]>,
    hi: Option<&[u8]>,
) -> Result<()> {
    let leaf = LeafNode::from_block(layout, data)?;
    let numkeys = leaf.numkeys() as usize;

    for i in 0..numkeys {
        let key = leaf.key_at(i)?;
        leaf.value_at(i)?;

        if i + 1 < numkeys && leaf.key_at(i + 1)? <= key {
            return Err(insane(format!("keys out of order in leaf block {}", block)));
        }
        if let Some(lo) = lo {
            if key <= lo {
                return Err(insane(format!(
                    "key below its subtree lower bound in leaf block {}",
                    block
                )));
            }
        }
        if let Some(hi) = hi {
            if key > hi {
                return Err(insane(format!(
                    "key above its subtree upper bound in leaf block {}",
                    block
                )));
            }
        }
    }

    Ok(())
}

fn check_sibling_chain<S: BlockStore>(store: &S, layout: NodeLayout, leaves: &[u32]) -> Result<()> {
    for pair in leaves.windows(2) {
        let leaf = LeafNode::from_block(layout, store.block(pair[0])?)?;
        if leaf.sibling() != pair[1] {
            return Err(insane(format!(
                "leaf block {} chains to {} instead of {}",
                pair[0],
                leaf.sibling(),
                pair[1]
            )));
        }
    }

    if let Some(&last) = leaves.last() {
        let leaf = LeafNode::from_block(layout, store.block(last)?)?;
        if leaf.sibling() != NULL_BLOCK {
            return Err(insane(format!(
                "rightmost leaf block {} chains to {}",
                last,
                leaf.sibling()
            )));
        }
    }

    Ok(())
}

fn check_freelist<S: BlockStore>(
    store: &S,
    meta: &NodeHeader,
    visited: &HashSet<u32>,
) -> Result<()> {
    let mut free: HashSet<u32> = HashSet::new();
    let mut head = meta.freelist();

    while head != NULL_BLOCK {
        if head >= store.block_count() {
            return Err(insane(format!("free list points at block {}", head)));
        }
        if visited.contains(&head) {
            return Err(insane(format!(
                "block {} is both in the tree and on the free list",
                head
            )));
        }
        if !free.insert(head) {
            return Err(insane(format!("free list cycles back to block {}", head)));
        }

        let header = NodeHeader::from_bytes(store.block(head)?)?;
        match header.kind()? {
            NodeKind::Unallocated => {}
            other => {
                return Err(insane(format!(
                    "free block {} has kind {:?}",
                    head, other
                )));
            }
        }
        head = header.freelist();
    }

    if free.len() as u32 != meta.freecount() {
        return Err(insane(format!(
            "superblock freecount {} does not match free list length {}",
            meta.freecount(),
            free.len()
        )));
    }

    let accounted = visited.len() + free.len() + 1;
    if accounted != store.block_count() as usize {
        return Err(insane(format!(
            "{} blocks reachable, {} free, {} total: store does not add up",
            visited.len(),
            free.len(),
            store.block_count()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::tree::BTreeIndex;
    use crate::error::error_kind;
    use crate::storage::MemoryStore;

    const LAYOUT: NodeLayout = NodeLayout {
        keysize: 4,
        valuesize: 8,
        blocksize: 512,
    };

    fn populated_store() -> MemoryStore {
        let store = MemoryStore::new(512, 64).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        for i in 0..40 {
            let key = format!("{:04}", i);
            let value = format!("val{:05}", i);
            index.insert(key.as_bytes(), value.as_bytes()).unwrap();
        }
        index.detach().unwrap();
        index.into_store()
    }

    fn check(store: &MemoryStore) -> Result<()> {
        let meta = *NodeHeader::from_bytes(store.block(0).unwrap()).unwrap();
        sanity_walk(store, &meta)
    }

    fn assert_insane(result: Result<()>) {
        let err = result.unwrap_err();
        assert_eq!(error_kind(&err), Some(IndexError::Insane));
    }

    /// Leftmost leaf of the tree in `store`.
    fn first_leaf(store: &MemoryStore) -> u32 {
        let meta = NodeHeader::from_bytes(store.block(0).unwrap()).unwrap();
        let mut current = meta.rootnode();
        loop {
            let data = store.block(current).unwrap();
            let header = NodeHeader::from_bytes(data).unwrap();
            if header.kind().unwrap() == NodeKind::Leaf {
                return current;
            }
            let node = InteriorNode::from_block(LAYOUT, data).unwrap();
            current = node.child_at(0).unwrap();
        }
    }

    #[test]
    fn clean_tree_passes() {
        let store = populated_store();

        check(&store).unwrap();
    }

    #[test]
    fn empty_tree_passes() {
        let store = MemoryStore::new(512, 16).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        index.detach().unwrap();
        let store = index.into_store();

        check(&store).unwrap();
    }

    #[test]
    fn detects_unsorted_leaf_keys() {
        let mut store = populated_store();
        let leaf_block = first_leaf(&store);

        // Swap the first two keys of the leftmost leaf.
        let data = store.block_mut(leaf_block).unwrap();
        let k0 = LAYOUT.leaf_key_offset(0);
        let k1 = LAYOUT.leaf_key_offset(1);
        let first: Vec<u8> = data[k0..k0 + 4].to_vec();
        let second: Vec<u8> = data[k1..k1 + 4].to_vec();
        data[k0..k0 + 4].copy_from_slice(&second);
        data[k1..k1 + 4].copy_from_slice(&first);

        assert_insane(check(&store));
    }

    #[test]
    fn detects_block_shared_with_free_list() {
        let mut store = populated_store();

        // Point the free list head at the root.
        let root = NodeHeader::from_bytes(store.block(0).unwrap())
            .unwrap()
            .rootnode();
        let data = store.block_mut(0).unwrap();
        NodeHeader::from_bytes_mut(data).unwrap().set_freelist(root);

        assert_insane(check(&store));
    }

    #[test]
    fn detects_freecount_drift() {
        let mut store = populated_store();

        let data = store.block_mut(0).unwrap();
        let header = NodeHeader::from_bytes_mut(data).unwrap();
        header.set_freecount(header.freecount() + 1);

        assert_insane(check(&store));
    }

    #[test]
    fn detects_overfull_node() {
        let mut store = populated_store();
        let leaf_block = first_leaf(&store);

        let data = store.block_mut(leaf_block).unwrap();
        let header = NodeHeader::from_bytes_mut(data).unwrap();
        header.set_numkeys(LAYOUT.split_threshold() as u32 + 1);

        assert_insane(check(&store));
    }

    #[test]
    fn detects_broken_sibling_chain() {
        let mut store = populated_store();
        let leaf_block = first_leaf(&store);

        let data = store.block_mut(leaf_block).unwrap();
        let offset = super::super::node::NODE_HEADER_SIZE;
        data[offset..offset + 4].copy_from_slice(&0u32.to_le_bytes());

        assert_insane(check(&store));
    }

    #[test]
    fn detects_stray_kind_on_descent_path() {
        let mut store = populated_store();
        let leaf_block = first_leaf(&store);

        let data = store.block_mut(leaf_block).unwrap();
        NodeHeader::from_bytes_mut(data)
            .unwrap()
            .set_kind(NodeKind::Superblock);

        assert_insane(check(&store));
    }
}
