//! On-page layout of a B+ tree node.
//!
//! A node is one contiguous byte image: a fixed header, an optional
//! zero-filled header extension, a key heap growing upward from the low
//! end, and fixed-size entry records packed against the high end. Entry 0
//! sits lowest in the record pack and the last entry ends flush with the
//! buffer end, so the trailer in the final bytes of the buffer names the
//! entry count and record size for the whole node.
//!
//! Node page layout:
//! - Header (8 bytes):
//!   - bytes 0-3: magic (u32 BE)
//!   - byte 4: format version
//!   - byte 5: node type tag (free form)
//!   - byte 6: level (0 at leaves)
//!   - byte 7: header extension size, in SIZE_UNITS
//! - Header extension (`extsz * SIZE_UNITS` bytes, reserved, zeroed)
//! - Key heap (raw key bytes, appended at the free-low watermark)
//! - Entry records (`entsz * SIZE_UNITS` bytes each): payload || trailer
//!
//! Entry trailer (16 bytes):
//!   - bytes 0-3: koff0 (u32 BE), bytes 4-5: ksiz0 (u16 BE)
//!   - bytes 6-9: koff1 (u32 BE), bytes 10-11: ksiz1 (u16 BE)
//!   - bytes 12-13: entdx (u16 BE)
//!   - byte 14: level (must match the header)
//!   - byte 15: entsz (record size in SIZE_UNITS)
//!
//! The logical key of an entry is span `[koff0, koff0+ksiz0)` followed by
//! span `[koff1, koff1+ksiz1)`; a simple entry uses only the first span.

use crate::storage::codec::{fetchval, storeval};

/// Allocation granularity for records and header extensions, in bytes.
pub const SIZE_UNITS: usize = 8;

/// Magic number identifying a node page.
pub const NODE_MAGIC: u32 = 0x053a_de78;

/// On-page format version.
pub const NODE_VERSION: u8 = 1;

/// Sentinel byte opening an interior-node payload.
pub const INTERNAL_MAGIC: u8 = 0xcc;

/// Upper bound on key length, from the 2-byte ksiz fields.
pub const MAX_KEY_SIZE: usize = 65535;

/// Upper bound on a node image read through a backend.
pub const MAX_NODE_BYTES: usize = 1 << 20;

/// Node identifier. Ids fit the 4-byte child and koff fields and are
/// never reused over the life of a tree.
pub type NodeId = u32;

/// Smallest buffer that can hold any entries at all.
pub const MIN_NODE_BYTES: usize = NodeHeader::SIZE + EntryTrailer::SIZE;

/// Round `n` up to the next multiple of [`SIZE_UNITS`].
pub const fn round_up(n: usize) -> usize {
    (n + SIZE_UNITS - 1) / SIZE_UNITS * SIZE_UNITS
}

/// Fixed node header at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub magic: u32,
    pub version: u8,
    /// Free-form tag recorded at init time; not interpreted by the engine.
    pub nodetype: u8,
    /// 0 at leaves, +1 per interior level.
    pub level: u8,
    /// Header extension size in SIZE_UNITS.
    pub extsz: u8,
}

impl NodeHeader {
    /// Size of the fixed header in bytes
    pub const SIZE: usize = 8;

    /// Read the header from the front of a page image.
    /// The caller must have checked `buf.len() >= SIZE`.
    pub fn read(buf: &[u8]) -> NodeHeader {
        NodeHeader {
            magic: fetchval(buf, 0, 4) as u32,
            version: fetchval(buf, 4, 1) as u8,
            nodetype: fetchval(buf, 5, 1) as u8,
            level: fetchval(buf, 6, 1) as u8,
            extsz: fetchval(buf, 7, 1) as u8,
        }
    }

    /// Write the header to the front of a page image.
    pub fn write(&self, buf: &mut [u8]) {
        storeval(buf, 0, 4, u64::from(self.magic));
        storeval(buf, 4, 1, u64::from(self.version));
        storeval(buf, 5, 1, u64::from(self.nodetype));
        storeval(buf, 6, 1, u64::from(self.level));
        storeval(buf, 7, 1, u64::from(self.extsz));
    }
}

/// Fixed-size suffix of every entry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTrailer {
    pub koff0: u32,
    pub ksiz0: u16,
    pub koff1: u32,
    pub ksiz1: u16,
    /// Entry index; must match the entry's position in the pack.
    pub entdx: u16,
    /// Must equal the header level.
    pub level: u8,
    /// Record size in SIZE_UNITS, payload and trailer together.
    pub entsz: u8,
}

impl EntryTrailer {
    /// Size of the trailer in bytes
    pub const SIZE: usize = 16;

    /// Byte offset of the entdx field within a trailer.
    const ENTDX_OFF: usize = 12;

    /// Read a trailer from `buf` at byte offset `off`.
    /// The caller must have checked `off + SIZE <= buf.len()`.
    pub fn read(buf: &[u8], off: usize) -> EntryTrailer {
        EntryTrailer {
            koff0: fetchval(buf, off, 4) as u32,
            ksiz0: fetchval(buf, off + 4, 2) as u16,
            koff1: fetchval(buf, off + 6, 4) as u32,
            ksiz1: fetchval(buf, off + 10, 2) as u16,
            entdx: fetchval(buf, off + 12, 2) as u16,
            level: fetchval(buf, off + 14, 1) as u8,
            entsz: fetchval(buf, off + 15, 1) as u8,
        }
    }

    /// Write a trailer into `buf` at byte offset `off`.
    pub fn write(&self, buf: &mut [u8], off: usize) {
        storeval(buf, off, 4, u64::from(self.koff0));
        storeval(buf, off + 4, 2, u64::from(self.ksiz0));
        storeval(buf, off + 6, 4, u64::from(self.koff1));
        storeval(buf, off + 10, 2, u64::from(self.ksiz1));
        storeval(buf, off + 12, 2, u64::from(self.entdx));
        storeval(buf, off + 14, 1, u64::from(self.level));
        storeval(buf, off + 15, 1, u64::from(self.entsz));
    }

    /// Rewrite just the entdx field of the trailer at `off`; used when a
    /// shifted pack is renumbered.
    pub fn store_entdx(buf: &mut [u8], off: usize, entdx: u16) {
        storeval(buf, off + Self::ENTDX_OFF, 2, u64::from(entdx));
    }
}

/// Payload carried by interior-node entries: a sentinel byte, padding,
/// and the child node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalPayload {
    pub child: NodeId,
}

impl InternalPayload {
    /// Size of an interior payload in bytes
    pub const SIZE: usize = 8;

    /// The sentinel byte at the front of the payload at `off`.
    pub fn magic(buf: &[u8], off: usize) -> u8 {
        fetchval(buf, off, 1) as u8
    }

    /// Read the child pointer from the payload at `off`.
    pub fn read(buf: &[u8], off: usize) -> InternalPayload {
        InternalPayload {
            child: fetchval(buf, off + 4, 4) as NodeId,
        }
    }

    /// Serialize the payload, sentinel included.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        storeval(&mut buf, 0, 1, u64::from(INTERNAL_MAGIC));
        storeval(&mut buf, 4, 4, u64::from(self.child));
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0), 0);
        assert_eq!(round_up(1), SIZE_UNITS);
        assert_eq!(round_up(SIZE_UNITS), SIZE_UNITS);
        assert_eq!(round_up(SIZE_UNITS + 1), 2 * SIZE_UNITS);
    }

    #[test]
    fn test_header_roundtrip() {
        let hdr = NodeHeader {
            magic: NODE_MAGIC,
            version: NODE_VERSION,
            nodetype: b'L',
            level: 3,
            extsz: 2,
        };

        let mut buf = [0u8; NodeHeader::SIZE];
        hdr.write(&mut buf);
        let parsed = NodeHeader::read(&buf);

        assert_eq!(parsed, hdr);
    }

    #[test]
    fn test_trailer_roundtrip() {
        let trailer = EntryTrailer {
            koff0: 40,
            ksiz0: 5,
            koff1: 120,
            ksiz1: 7,
            entdx: 9,
            level: 1,
            entsz: 3,
        };

        let mut buf = [0u8; 64];
        trailer.write(&mut buf, 48);
        let parsed = EntryTrailer::read(&buf, 48);

        assert_eq!(parsed, trailer);
    }

    #[test]
    fn test_store_entdx_in_place() {
        let trailer = EntryTrailer {
            entdx: 4,
            ..EntryTrailer::default()
        };
        let mut buf = [0u8; EntryTrailer::SIZE];
        trailer.write(&mut buf, 0);

        EntryTrailer::store_entdx(&mut buf, 0, 5);
        let parsed = EntryTrailer::read(&buf, 0);
        assert_eq!(parsed.entdx, 5);
        assert_eq!(parsed.entsz, trailer.entsz);
    }

    #[test]
    fn test_internal_payload_roundtrip() {
        let link = InternalPayload { child: 42 };
        let bytes = link.to_bytes();

        assert_eq!(InternalPayload::magic(&bytes, 0), INTERNAL_MAGIC);
        assert_eq!(InternalPayload::read(&bytes, 0).child, 42);
    }
}
