//! # Cairn CLI Entry Point
//!
//! Binary entry point for the cairn shell.
//!
//! ## Usage
//!
//! ```bash
//! # Open an existing index
//! cairn ./my.cairn
//!
//! # Create a new index with explicit geometry
//! cairn --create --block-size 512 --blocks 1024 --keysize 8 --valuesize 32 ./my.cairn
//!
//! # Show help
//! cairn --help
//! ```

use eyre::{bail, ensure, Result, WrapErr};
use std::env;
use std::path::PathBuf;

use cairn::btree::{BTreeIndex, NodeHeader, NodeKind};
use cairn::cli::Repl;
use cairn::{BlockStore, MmapStore};

const DEFAULT_BLOCK_SIZE: usize = 4096;
const DEFAULT_BLOCK_COUNT: u32 = 1024;
const DEFAULT_KEYSIZE: usize = 16;
const DEFAULT_VALUESIZE: usize = 32;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut create_mode = false;
    let mut block_size = DEFAULT_BLOCK_SIZE;
    let mut block_count = DEFAULT_BLOCK_COUNT;
    let mut keysize = DEFAULT_KEYSIZE;
    let mut valuesize = DEFAULT_VALUESIZE;
    let mut path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("cairn {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--create" | "-c" => {
                create_mode = true;
            }
            "--block-size" => {
                block_size = parse_flag(&args, &mut i, "--block-size")?;
            }
            "--blocks" => {
                block_count = parse_flag(&args, &mut i, "--blocks")?;
            }
            "--keysize" => {
                keysize = parse_flag(&args, &mut i, "--keysize")?;
            }
            "--valuesize" => {
                valuesize = parse_flag(&args, &mut i, "--valuesize")?;
            }
            arg if arg.starts_with('-') => {
                bail!("unknown option: {}", arg);
            }
            p => {
                if path.is_some() {
                    bail!("multiple index paths specified");
                }
                path = Some(PathBuf::from(p));
            }
        }
        i += 1;
    }

    let Some(path) = path else {
        print_usage();
        return Ok(());
    };

    let index = if create_mode || !path.exists() {
        let store = MmapStore::create(&path, block_size, block_count)
            .wrap_err_with(|| format!("failed to create store at {:?}", path))?;
        let mut index = BTreeIndex::new(store, keysize, valuesize, true);
        index
            .attach(0, true)
            .wrap_err_with(|| format!("failed to format index at {:?}", path))?;
        index
    } else {
        let store = MmapStore::open(&path)
            .wrap_err_with(|| format!("failed to open store at {:?}", path))?;

        // The superblock knows the key and value widths it was formatted with.
        let header = *NodeHeader::from_bytes(store.block(0)?)?;
        ensure!(
            header.kind().map(|k| k == NodeKind::Superblock).unwrap_or(false),
            "{:?} does not contain a formatted index",
            path
        );

        let mut index = BTreeIndex::new(
            store,
            header.keysize() as usize,
            header.valuesize() as usize,
            true,
        );
        index
            .attach(0, false)
            .wrap_err_with(|| format!("failed to mount index at {:?}", path))?;
        index
    };

    let mut repl = Repl::new(index)?;
    repl.run()?;

    Ok(())
}

fn parse_flag<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T> {
    *i += 1;
    let Some(value) = args.get(*i) else {
        bail!("{} expects a value", flag);
    };
    value
        .parse()
        .map_err(|_| eyre::eyre!("invalid value for {}: {}", flag, value))
}

fn print_usage() {
    println!("Cairn - disk-backed B+tree index");
    println!();
    println!("USAGE:");
    println!("    cairn [OPTIONS] <INDEX_PATH>");
    println!();
    println!("ARGS:");
    println!("    <INDEX_PATH>       Path to the index file");
    println!();
    println!("OPTIONS:");
    println!("    -c, --create       Create a new index (default if the path does not exist)");
    println!("    --block-size N     Block size in bytes for --create (default {})", DEFAULT_BLOCK_SIZE);
    println!("    --blocks N         Block count for --create (default {})", DEFAULT_BLOCK_COUNT);
    println!("    --keysize N        Key width in bytes for --create (default {})", DEFAULT_KEYSIZE);
    println!("    --valuesize N      Value width in bytes for --create (default {})", DEFAULT_VALUESIZE);
    println!("    -h, --help         Print help information");
    println!("    -v, --version      Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    cairn ./my.cairn            Open or create an index at ./my.cairn");
    println!("    cairn --create ./new.cairn  Create a new index at ./new.cairn");
}
