//! Error types for the tree engine.
//!
//! Every operation surfaces failure as a [`TreeError`]. Structural damage
//! additionally latches a nonzero diagnostic code on the affected node (by
//! convention the source line that detected it); once latched, further
//! operations against that node short-circuit with [`TreeError::Corrupt`].

use thiserror::Error;

use crate::storage::page::NodeId;

/// Main error type for the tree engine
#[derive(Error, Debug)]
pub enum TreeError {
    /// The node's on-page structure violates an invariant. `code` is the
    /// source line that first detected the damage.
    #[error("node {nodeid} corrupt (code {code})")]
    Corrupt { nodeid: NodeId, code: u32 },

    #[error("key length {0} exceeds the maximum key size")]
    KeyTooLong(usize),

    #[error("payload length {0} does not fit the node's record size")]
    PayloadSize(usize),

    #[error("entry index {index} out of range in node {nodeid}")]
    IndexOutOfRange { nodeid: NodeId, index: usize },

    #[error("node {0} is too short to hold a header")]
    ShortNode(NodeId),

    #[error("node {0} is not resident")]
    NotResident(NodeId),

    #[error("node {0} has no parent to split into")]
    NoParent(NodeId),

    #[error("node {0} has too few entries to split")]
    SplitUnderflow(NodeId),

    #[error("tree recorded {0} errors")]
    Errors(u32),

    #[error("backend error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TreeError::Corrupt { nodeid: 7, code: 123 };
        assert_eq!(err.to_string(), "node 7 corrupt (code 123)");

        let err = TreeError::NotResident(3);
        assert_eq!(err.to_string(), "node 3 is not resident");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = TreeError::from(io);
        assert!(matches!(err, TreeError::Io(_)));
    }
}
