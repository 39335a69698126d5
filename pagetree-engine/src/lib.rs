//! Pagetree Engine - embedded pageable B+ tree keyed by byte strings
//!
//! Each node of the tree is a single self-describing byte page: a fixed
//! header, a key heap growing up from the low end, and fixed-size entry
//! records packed against the high end, ready for direct I/O. The engine
//! provides ordered key storage with opaque fixed-size payloads,
//! logarithmic point lookup, in-order leaf traversal, and explicit node
//! splitting. Open nodes live in a resident cache that talks to storage
//! through the pluggable [`PageIo`] interface.

pub mod error;
pub mod io;
pub mod storage;
pub mod tree;

mod check;

pub use error::{TreeError, TreeResult};
pub use io::{MemoryIo, MemoryStore, PageIo};
pub use storage::node::{Node, SearchResult, PREFIX_CMP};
pub use storage::page::NodeId;
pub use tree::{Tree, ROOT_ID};
