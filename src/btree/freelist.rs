//! # Free-List Allocator
//!
//! Unallocated blocks form an intrusive singly-linked list: each free block
//! stores the index of the next one in its own header's `freelist` field,
//! and the superblock holds the head. Allocation pops the head; release
//! pushes onto it.
//!
//! ```text
//! superblock.freelist ──▶ [free 7] ──▶ [free 3] ──▶ [free 12] ──▶ 0
//! ```
//!
//! Both operations persist the superblock before returning, so the on-disk
//! head always matches the chain. A pop and the caller's subsequent
//! initialization of the block are not atomic as a pair; crash consistency
//! is outside this allocator's contract.
//!
//! The superblock's `freecount` mirrors the chain length. The tree engine
//! reads it to reserve every block a split cascade will need before touching
//! the tree, which is what keeps a `NoSpace` failure side-effect free.

use eyre::{ensure, Result, WrapErr};

use crate::error::IndexError;
use crate::storage::BlockStore;

use super::node::{NodeHeader, NodeKind, NULL_BLOCK, SUPERBLOCK};

/// Pops the head of the free list. The block keeps its Unallocated header
/// until the caller formats it.
pub fn allocate<S: BlockStore>(store: &mut S, superblock: &mut NodeHeader) -> Result<u32> {
    let head = superblock.freelist();
    if head == NULL_BLOCK {
        return Err(IndexError::NoSpace).wrap_err("free list is empty");
    }

    let next = {
        let block = store.block(head)?;
        let header = NodeHeader::from_bytes(block)?;
        match header.kind()? {
            NodeKind::Unallocated => {}
            other => {
                return Err(IndexError::Insane).wrap_err_with(|| {
                    format!("free list head {} has kind {:?}", head, other)
                });
            }
        }
        header.freelist()
    };

    superblock.set_freelist(next);
    superblock.set_freecount(superblock.freecount().saturating_sub(1));
    persist_superblock(store, superblock)?;
    store.note_allocate(head);

    Ok(head)
}

/// Relabels `block_no` Unallocated and pushes it onto the free list.
pub fn release<S: BlockStore>(
    store: &mut S,
    superblock: &mut NodeHeader,
    block_no: u32,
) -> Result<()> {
    ensure!(
        block_no != SUPERBLOCK,
        "cannot release the superblock"
    );
    ensure!(
        block_no < store.block_count(),
        "block {} out of bounds (block_count={})",
        block_no,
        store.block_count()
    );

    {
        let block = store.block_mut(block_no)?;
        let header = NodeHeader::from_bytes_mut(block)?;
        match header.kind()? {
            NodeKind::Unallocated => {
                return Err(IndexError::Insane)
                    .wrap_err_with(|| format!("double release of block {}", block_no));
            }
            _ => {}
        }
        header.set_kind(NodeKind::Unallocated);
        header.set_freelist(superblock.freelist());
        header.set_numkeys(0);
    }

    superblock.set_freelist(block_no);
    superblock.set_freecount(superblock.freecount() + 1);
    persist_superblock(store, superblock)?;
    store.note_release(block_no);

    Ok(())
}

/// Writes the in-memory superblock header back to block 0.
pub fn persist_superblock<S: BlockStore>(store: &mut S, superblock: &NodeHeader) -> Result<()> {
    let block = store.block_mut(SUPERBLOCK)?;
    superblock.write_to(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_kind;
    use crate::storage::MemoryStore;

    fn formatted_store(blocks: u32) -> (MemoryStore, NodeHeader) {
        let mut store = MemoryStore::new(128, blocks).unwrap();

        let mut superblock = NodeHeader::new(NodeKind::Superblock, 4, 8, 128);
        superblock.set_rootnode(1);
        superblock.set_freelist(if blocks > 2 { 2 } else { NULL_BLOCK });
        superblock.set_freecount(blocks.saturating_sub(2));

        let root = NodeHeader::new(NodeKind::Root, 4, 8, 128);
        root.write_to(store.block_mut(1).unwrap()).unwrap();

        for i in 2..blocks {
            let mut free = NodeHeader::new(NodeKind::Unallocated, 4, 8, 128);
            free.set_freelist(if i + 1 < blocks { i + 1 } else { NULL_BLOCK });
            free.write_to(store.block_mut(i).unwrap()).unwrap();
        }

        persist_superblock(&mut store, &superblock).unwrap();
        (store, superblock)
    }

    #[test]
    fn allocate_pops_blocks_in_chain_order() {
        let (mut store, mut superblock) = formatted_store(6);

        assert_eq!(allocate(&mut store, &mut superblock).unwrap(), 2);
        assert_eq!(allocate(&mut store, &mut superblock).unwrap(), 3);
        assert_eq!(allocate(&mut store, &mut superblock).unwrap(), 4);
        assert_eq!(superblock.freecount(), 1);
        assert_eq!(store.allocations(), 3);
    }

    #[test]
    fn allocate_exhausted_list_is_no_space() {
        let (mut store, mut superblock) = formatted_store(3);

        allocate(&mut store, &mut superblock).unwrap();
        let result = allocate(&mut store, &mut superblock);

        assert!(result.is_err());
        assert_eq!(error_kind(&result.unwrap_err()), Some(IndexError::NoSpace));
    }

    #[test]
    fn allocate_persists_superblock_head() {
        let (mut store, mut superblock) = formatted_store(6);

        allocate(&mut store, &mut superblock).unwrap();

        let on_disk = NodeHeader::from_bytes(store.block(SUPERBLOCK).unwrap()).unwrap();
        assert_eq!(on_disk.freelist(), 3);
        assert_eq!(on_disk.freecount(), 3);
    }

    #[test]
    fn release_pushes_onto_head() {
        let (mut store, mut superblock) = formatted_store(6);

        let a = allocate(&mut store, &mut superblock).unwrap();
        NodeHeader::new(NodeKind::Leaf, 4, 8, 128)
            .write_to(store.block_mut(a).unwrap())
            .unwrap();

        release(&mut store, &mut superblock, a).unwrap();

        assert_eq!(superblock.freelist(), a);
        assert_eq!(superblock.freecount(), 4);
        assert_eq!(store.releases(), 1);

        let header = NodeHeader::from_bytes(store.block(a).unwrap()).unwrap();
        assert_eq!(header.kind().unwrap(), NodeKind::Unallocated);
        assert_eq!(header.freelist(), 3);
    }

    #[test]
    fn release_of_free_block_is_insane() {
        let (mut store, mut superblock) = formatted_store(6);

        let result = release(&mut store, &mut superblock, 3);

        assert!(result.is_err());
        assert_eq!(error_kind(&result.unwrap_err()), Some(IndexError::Insane));
    }

    #[test]
    fn allocate_detects_corrupt_chain() {
        let (mut store, mut superblock) = formatted_store(6);

        NodeHeader::new(NodeKind::Leaf, 4, 8, 128)
            .write_to(store.block_mut(2).unwrap())
            .unwrap();

        let result = allocate(&mut store, &mut superblock);

        assert!(result.is_err());
        assert_eq!(error_kind(&result.unwrap_err()), Some(IndexError::Insane));
    }
}
