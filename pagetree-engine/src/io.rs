//! Page-I/O interface and the in-memory backend.
//!
//! The engine never touches storage directly: a backend implements
//! [`PageIo`] and the tree drives it on cache miss (`open` then `read`)
//! and at eviction (`write` if healthy, then `close`). Writes are
//! deferred until eviction or destroy; there is no ordering guarantee
//! between flushes of distinct nodes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TreeResult;
use crate::storage::node::Node;
use crate::storage::page::NodeId;

/// Backend interface for node page storage.
///
/// Each call returns `Err` on failure; the tree records the failure in
/// its error counter and, on the read path, latches the node corrupt.
/// Per-node backend state (a file handle, say) lives in `node.iodata`.
pub trait PageIo {
    /// Prepare backend state for a node; called once per cache miss.
    fn open(&mut self, node: &mut Node) -> TreeResult<()>;

    /// Fill the node's image from storage, up to `max_bytes`. A node
    /// with no stored image is left empty.
    fn read(&mut self, node: &mut Node, max_bytes: usize) -> TreeResult<()>;

    /// Write the node's image back to storage. `node.clean()` marks the
    /// prefix already on storage; backends may use it to shorten writes.
    fn write(&mut self, node: &mut Node) -> TreeResult<()>;

    /// Release backend state for the node.
    fn close(&mut self, node: &mut Node) -> TreeResult<()>;

    /// Tear down the backend as a whole; called from tree destroy.
    fn destroy(&mut self) -> TreeResult<()>;
}

/// Shared page store backing [`MemoryIo`]. Clone the handle to reopen
/// the same pages with a fresh tree.
pub type MemoryStore = Arc<Mutex<HashMap<NodeId, Vec<u8>>>>;

/// In-memory [`PageIo`] backend.
///
/// Pages live in a shared map, so the store survives `Tree::destroy` and
/// can be handed to a new tree to reopen the same data. Used by the test
/// suite and the demo; durable backends are built outside the engine.
#[derive(Default)]
pub struct MemoryIo {
    store: MemoryStore,
}

impl MemoryIo {
    /// Backend over a fresh, empty store.
    pub fn new() -> MemoryIo {
        MemoryIo::default()
    }

    /// Backend over an existing store.
    pub fn with_store(store: MemoryStore) -> MemoryIo {
        MemoryIo { store }
    }

    /// Handle on the backing store.
    pub fn store(&self) -> MemoryStore {
        Arc::clone(&self.store)
    }
}

impl PageIo for MemoryIo {
    fn open(&mut self, node: &mut Node) -> TreeResult<()> {
        // Marks the node as backend-managed so eviction flushes it.
        node.iodata = Some(Box::new(node.nodeid()));
        Ok(())
    }

    fn read(&mut self, node: &mut Node, max_bytes: usize) -> TreeResult<()> {
        if let Some(image) = self.store.lock().get(&node.nodeid()) {
            let len = image.len().min(max_bytes);
            node.set_image(&image[..len]);
        }
        Ok(())
    }

    fn write(&mut self, node: &mut Node) -> TreeResult<()> {
        self.store.lock().insert(node.nodeid(), node.image().to_vec());
        Ok(())
    }

    fn close(&mut self, node: &mut Node) -> TreeResult<()> {
        node.iodata = None;
        Ok(())
    }

    fn destroy(&mut self) -> TreeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_io_roundtrip() {
        let mut io = MemoryIo::new();
        let store = io.store();

        let mut node = Node::new(5);
        io.open(&mut node).unwrap();
        assert!(node.iodata.is_some());

        node.set_image(b"some page image");
        io.write(&mut node).unwrap();
        io.close(&mut node).unwrap();
        assert!(node.iodata.is_none());

        let mut again = Node::new(5);
        let mut io2 = MemoryIo::with_store(store);
        io2.open(&mut again).unwrap();
        io2.read(&mut again, 1 << 20).unwrap();
        assert_eq!(again.image(), b"some page image");
    }

    #[test]
    fn test_read_missing_page_leaves_node_empty() {
        let mut io = MemoryIo::new();
        let mut node = Node::new(9);
        io.open(&mut node).unwrap();
        io.read(&mut node, 1 << 20).unwrap();
        assert!(node.image().is_empty());
    }

    #[test]
    fn test_read_honors_max_bytes() {
        let mut io = MemoryIo::new();
        let mut node = Node::new(2);
        io.open(&mut node).unwrap();
        node.set_image(&[0xAAu8; 64]);
        io.write(&mut node).unwrap();

        let mut partial = Node::new(2);
        io.read(&mut partial, 16).unwrap();
        assert_eq!(partial.image().len(), 16);
    }
}
