//! # Diagnostic Dumps
//!
//! Depth-first renderings of the tree, for eyeballing and for piping into
//! graph tooling. All three formats are observational and never mutate a
//! block.
//!
//! - `Depth`: one node per line, `nodenum:` prefix, kind tag, then the
//!   pointer and key literals in slot order
//! - `DepthDot`: a `digraph tree { ... }` document with one labeled vertex
//!   per node and one edge per child pointer
//! - `SortedKeyVal`: one `(key,value)` line per pair, in tree order, which
//!   is key order

use std::io;

use eyre::{Result, WrapErr};

use crate::error::IndexError;
use crate::storage::BlockStore;

use super::interior::InteriorNode;
use super::leaf::LeafNode;
use super::node::{NodeHeader, NodeKind, NodeLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Indented-by-traversal dump, one node per line.
    Depth,
    /// DOT digraph suitable for rendering.
    DepthDot,
    /// Flat `(key,value)` dump in ascending key order.
    SortedKeyVal,
}

/// Renders the tree under `meta` to `out`.
pub fn dump<S: BlockStore>(
    store: &S,
    meta: &NodeHeader,
    out: &mut dyn io::Write,
    mode: DisplayMode,
) -> Result<()> {
    let layout = NodeLayout::from_header(meta);

    if mode == DisplayMode::DepthDot {
        writeln!(out, "digraph tree {{ ")?;
    }

    dump_node(store, layout, meta.rootnode(), out, mode)?;

    if mode == DisplayMode::DepthDot {
        writeln!(out, "}}")?;
    }

    Ok(())
}

fn dump_node<S: BlockStore>(
    store: &S,
    layout: NodeLayout,
    block: u32,
    out: &mut dyn io::Write,
    mode: DisplayMode,
) -> Result<()> {
    let data = store.block(block)?;
    let header = NodeHeader::from_bytes(data)?;
    let kind = header
        .kind()
        .wrap_err_with(|| format!("while displaying block {}", block))?;

    print_node(layout, block, data, kind, out, mode)?;

    if mode == DisplayMode::DepthDot {
        write!(out, ";")?;
    }
    if mode != DisplayMode::SortedKeyVal {
        writeln!(out)?;
    }

    match kind {
        NodeKind::Root | NodeKind::Interior => {
            let node = InteriorNode::from_block(layout, data)?;
            let numkeys = node.numkeys() as usize;
            if numkeys > 0 {
                for i in 0..=numkeys {
                    let child = node.child_at(i)?;
                    if mode == DisplayMode::DepthDot {
                        writeln!(out, "{} -> {};", block, child)?;
                    }
                    dump_node(store, layout, child, out, mode)?;
                }
            }
            Ok(())
        }
        NodeKind::Leaf => Ok(()),
        other => Err(IndexError::Insane)
            .wrap_err_with(|| format!("block {} of kind {:?} in the tree", block, other)),
    }
}

fn print_node(
    layout: NodeLayout,
    block: u32,
    data: &[u8],
    kind: NodeKind,
    out: &mut dyn io::Write,
    mode: DisplayMode,
) -> Result<()> {
    match mode {
        DisplayMode::DepthDot => write!(out, "{} [ label=\"{}: ", block, block)?,
        DisplayMode::Depth => write!(out, "{}: ", block)?,
        DisplayMode::SortedKeyVal => {}
    }

    match kind {
        NodeKind::Root | NodeKind::Interior => {
            if mode != DisplayMode::SortedKeyVal {
                if mode == DisplayMode::Depth {
                    write!(out, "Interior: ")?;
                }
                let node = InteriorNode::from_block(layout, data)?;
                let numkeys = node.numkeys() as usize;
                if numkeys > 0 {
                    for i in 0..=numkeys {
                        write!(out, "*{} ", node.child_at(i)?)?;
                        if i == numkeys {
                            break;
                        }
                        write!(out, "{} ", ascii(node.key_at(i)?))?;
                    }
                }
            }
        }
        NodeKind::Leaf => {
            let leaf = LeafNode::from_block(layout, data)?;
            if mode == DisplayMode::Depth {
                write!(out, "Leaf: ")?;
            }
            for i in 0..leaf.numkeys() as usize {
                if i == 0 && mode != DisplayMode::SortedKeyVal {
                    write!(out, "*{} ", leaf.sibling())?;
                }
                match mode {
                    DisplayMode::SortedKeyVal => writeln!(
                        out,
                        "({},{})",
                        ascii(leaf.key_at(i)?),
                        ascii(leaf.value_at(i)?)
                    )?,
                    _ => write!(out, "{} {} ", ascii(leaf.key_at(i)?), ascii(leaf.value_at(i)?))?,
                }
            }
        }
        other => {
            if mode != DisplayMode::DepthDot {
                write!(out, "Unsupported Node Type {:?}", other)?;
            }
        }
    }

    if mode == DisplayMode::DepthDot {
        write!(out, "\" ]")?;
    }
    Ok(())
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
