//! Debug tool exercising the tree engine against the in-memory backend.

use anyhow::Result;
use pagetree_engine::{MemoryIo, Tree, ROOT_ID};

const WORDS: &[&str] = &[
    "apple", "apricot", "banana", "blueberry", "cherry", "cranberry", "date", "elderberry",
    "fig", "grape", "guava", "kiwi", "lemon", "lime", "mango", "melon", "nectarine", "orange",
    "papaya", "peach", "pear", "plum", "quince", "raspberry", "strawberry", "tangerine",
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let io = MemoryIo::new();
    let store = io.store();
    let mut tree = Tree::with_io(Box::new(io));
    tree.with_node(ROOT_ID, |node| node.init(0, b'L', 0))??;

    println!("=== Inserting {} keys ===", WORDS.len());
    for (i, word) in WORDS.iter().enumerate() {
        let (srch, leaf) = tree.lookup(word.as_bytes())?;
        if srch.found {
            println!("  duplicate: {word}");
            continue;
        }
        let count = tree.with_node(leaf, |node| {
            node.insert_entry(srch.index, word.as_bytes(), &(i as u64).to_be_bytes())
        })??;
        println!("  {word} -> leaf {leaf} at index {} ({count} entries)", srch.index);
        if count > tree.full() {
            tree.split(leaf)?;
        }
        while tree.nextsplit() != 0 {
            let next = tree.nextsplit();
            tree.split(next)?;
        }
    }

    println!("\n=== Leaves in order ===");
    let (_, mut leaf) = tree.lookup(b"")?;
    loop {
        let count = tree.with_node(leaf, |node| node.entry_count())??;
        print!("  [{leaf}]");
        for i in 0..count {
            let key = tree.with_node(leaf, |node| node.key(i))??;
            print!(" {}", String::from_utf8_lossy(&key));
        }
        println!();
        match tree.next_leaf(leaf)? {
            Some(next) => leaf = next,
            None => break,
        }
    }

    println!("\n=== Consistency check ===");
    tree.check()?;
    println!("check passed, {} resident nodes", tree.resident_count());

    tree.destroy()?;
    println!("\n{} pages flushed to the store", store.lock().len());
    Ok(())
}
