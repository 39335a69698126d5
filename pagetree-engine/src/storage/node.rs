//! In-memory node handle and the single-node page algorithms: entry
//! location, key access, comparison, binary search, insertion, and the
//! consistency checker.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use bytes::BytesMut;

use crate::error::{TreeError, TreeResult};
use crate::storage::page::{
    round_up, EntryTrailer, InternalPayload, NodeHeader, NodeId, INTERNAL_MAGIC, MAX_KEY_SIZE,
    MIN_NODE_BYTES, NODE_MAGIC, NODE_VERSION, SIZE_UNITS,
};

/// Returned by [`Node::compare`] when the probe key is a strict prefix of
/// the stored key. Search treats it like any other negative result;
/// higher layers use it to detect prefix matches.
pub const PREFIX_CMP: i32 = -9999;

/// Outcome of an in-node binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// Index of the hit, or the position the key would be inserted at:
    /// the first stored key strictly greater than the probe.
    pub index: usize,
    /// Whether the key is present at `index`.
    pub found: bool,
}

impl SearchResult {
    /// The `2 * index + found` encoding: odd results are hits at `index`,
    /// even results are misses at the insertion position.
    pub fn encoded(self) -> usize {
        2 * self.index + usize::from(self.found)
    }
}

/// An open node: the page image plus the bookkeeping the engine keeps
/// while the node is resident.
///
/// Handles are not stable across cache mutations; fetch, use immediately,
/// and re-fetch after any call that may grow or evict.
pub struct Node {
    pub(crate) nodeid: NodeId,
    /// The page image.
    pub(crate) buf: BytesMut,
    /// Advisory parent link; may be stale after a split above this node.
    pub(crate) parent: NodeId,
    /// First free byte of the key heap. 0 means "unknown, recompute".
    pub(crate) freelow: usize,
    /// Bytes below this offset are unchanged since the last backend write.
    pub(crate) clean: usize,
    /// 0 while healthy; otherwise the source line that detected damage.
    pub(crate) corrupt: u32,
    /// Backend-owned per-node state, set by `PageIo::open`.
    pub iodata: Option<Box<dyn Any>>,
}

impl Node {
    pub(crate) fn new(nodeid: NodeId) -> Node {
        Node {
            nodeid,
            buf: BytesMut::new(),
            parent: 0,
            freelow: 0,
            clean: 0,
            corrupt: 0,
            iodata: None,
        }
    }

    /// This node's id.
    pub fn nodeid(&self) -> NodeId {
        self.nodeid
    }

    /// Advisory parent id, 0 if unknown. Stale after a split above.
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Offset below which the image is unchanged since the last write.
    pub fn clean(&self) -> usize {
        self.clean
    }

    /// First free byte of the key heap, 0 if not yet computed.
    pub fn freelow(&self) -> usize {
        self.freelow
    }

    /// Whether a structural violation has been latched.
    pub fn is_corrupt(&self) -> bool {
        self.corrupt != 0
    }

    /// The latched diagnostic code, 0 while healthy.
    pub fn corrupt_code(&self) -> u32 {
        self.corrupt
    }

    /// The raw page image.
    pub fn image(&self) -> &[u8] {
        &self.buf
    }

    /// Replace the page image wholesale; backends use this on read.
    pub fn set_image(&mut self, bytes: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn mark_corrupt(&mut self, code: u32) -> TreeError {
        self.corrupt = code;
        self.corrupt_err()
    }

    pub(crate) fn corrupt_err(&self) -> TreeError {
        TreeError::Corrupt {
            nodeid: self.nodeid,
            code: self.corrupt,
        }
    }

    /// Node level straight from the header; leaves are level 0.
    pub fn level(&self) -> TreeResult<u8> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        if self.buf.len() < NodeHeader::SIZE {
            return Err(TreeError::ShortNode(self.nodeid));
        }
        Ok(NodeHeader::read(&self.buf).level)
    }

    /// Number of entries; 0 for a buffer too short to hold any.
    pub fn entry_count(&self) -> TreeResult<usize> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        if self.buf.len() < MIN_NODE_BYTES {
            return Ok(0);
        }
        let t = EntryTrailer::read(&self.buf, self.buf.len() - EntryTrailer::SIZE);
        Ok(usize::from(t.entdx) + 1)
    }

    /// Record size in bytes, trailer included; 0 when there are no entries.
    pub fn entry_size(&self) -> TreeResult<usize> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        if self.buf.len() < MIN_NODE_BYTES {
            return Ok(0);
        }
        let t = EntryTrailer::read(&self.buf, self.buf.len() - EntryTrailer::SIZE);
        Ok(usize::from(t.entsz) * SIZE_UNITS)
    }

    /// Payload size in bytes, padded to SIZE_UNITS; 0 when empty.
    pub fn payload_size(&self) -> TreeResult<usize> {
        let mut ans = self.entry_size()?;
        if ans >= EntryTrailer::SIZE {
            ans -= EntryTrailer::SIZE;
        }
        Ok(ans)
    }

    /// Locate the trailer of entry `i`, returning its byte offset.
    ///
    /// The trailer at the very end of the buffer holds the index of the
    /// last entry and the common record size; the target trailer sits a
    /// whole number of records below it.
    fn seek_trailer(&mut self, i: usize) -> TreeResult<usize> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        if self.buf.len() < MIN_NODE_BYTES {
            return Err(TreeError::IndexOutOfRange {
                nodeid: self.nodeid,
                index: i,
            });
        }
        let t = EntryTrailer::read(&self.buf, self.buf.len() - EntryTrailer::SIZE);
        let last = usize::from(t.entdx);
        let ent = usize::from(t.entsz) * SIZE_UNITS;
        if ent < EntryTrailer::SIZE {
            return Err(self.mark_corrupt(line!()));
        }
        if ent * (last + 1) >= self.buf.len() {
            return Err(self.mark_corrupt(line!()));
        }
        if i > last {
            return Err(TreeError::IndexOutOfRange {
                nodeid: self.nodeid,
                index: i,
            });
        }
        let off = self.buf.len() - ent * (last - i) - EntryTrailer::SIZE;
        if usize::from(EntryTrailer::read(&self.buf, off).entdx) != i {
            return Err(self.mark_corrupt(line!()));
        }
        Ok(off)
    }

    /// Byte offset of entry `i`'s record, validating the caller's idea of
    /// the payload size against the record size on the page.
    fn entry_offset(&mut self, payload_bytes: usize, i: usize) -> TreeResult<usize> {
        let entry_bytes = payload_bytes + EntryTrailer::SIZE;
        let off = self.seek_trailer(i)?;
        if usize::from(EntryTrailer::read(&self.buf, off).entsz) * SIZE_UNITS != entry_bytes {
            return Err(self.mark_corrupt(line!()));
        }
        Ok(off + EntryTrailer::SIZE - entry_bytes)
    }

    /// Borrow entry `i`'s payload, `payload_bytes` wide.
    pub fn payload(&mut self, payload_bytes: usize, i: usize) -> TreeResult<&[u8]> {
        let off = self.entry_offset(payload_bytes, i)?;
        Ok(&self.buf[off..off + payload_bytes])
    }

    /// Child pointer held by interior entry `i`.
    pub fn child(&mut self, i: usize) -> TreeResult<NodeId> {
        let off = self.entry_offset(InternalPayload::SIZE, i)?;
        if InternalPayload::magic(&self.buf, off) != INTERNAL_MAGIC {
            return Err(self.mark_corrupt(line!()));
        }
        Ok(InternalPayload::read(&self.buf, off).child)
    }

    /// Append entry `i`'s key, both fragments, to `dst`.
    pub fn key_append(&mut self, dst: &mut Vec<u8>, i: usize) -> TreeResult<()> {
        let off = self.seek_trailer(i)?;
        let t = EntryTrailer::read(&self.buf, off);
        let spans = [
            (t.koff0 as usize, usize::from(t.ksiz0)),
            (t.koff1 as usize, usize::from(t.ksiz1)),
        ];
        for (koff, ksiz) in spans {
            if koff > self.buf.len() || ksiz > self.buf.len() - koff {
                return Err(self.mark_corrupt(line!()));
            }
            dst.extend_from_slice(&self.buf[koff..koff + ksiz]);
        }
        Ok(())
    }

    /// Fetch entry `i`'s key, replacing `dst`'s contents.
    pub fn key_fetch(&mut self, dst: &mut Vec<u8>, i: usize) -> TreeResult<()> {
        dst.clear();
        self.key_append(dst, i)
    }

    /// Entry `i`'s key in a fresh buffer.
    pub fn key(&mut self, i: usize) -> TreeResult<Vec<u8>> {
        let mut ans = Vec::new();
        self.key_append(&mut ans, i)?;
        Ok(ans)
    }

    /// Lexicographic comparison of `key` against entry `i`'s stored key.
    ///
    /// Returns negative, zero, or positive as usual, except that a probe
    /// that is a strict prefix of the stored key yields [`PREFIX_CMP`].
    pub fn compare(&mut self, key: &[u8], i: usize) -> TreeResult<i32> {
        let off = self.seek_trailer(i)?;
        let t = EntryTrailer::read(&self.buf, off);
        let spans = [
            (t.koff0 as usize, usize::from(t.ksiz0)),
            (t.koff1 as usize, usize::from(t.ksiz1)),
        ];
        let mut rest = key;
        for (koff, ksiz) in spans {
            if koff > self.buf.len() || ksiz > self.buf.len() - koff {
                return Err(self.mark_corrupt(line!()));
            }
            let cmplen = rest.len().min(ksiz);
            match rest[..cmplen].cmp(&self.buf[koff..koff + cmplen]) {
                Ordering::Less => return Ok(-1),
                Ordering::Greater => return Ok(1),
                Ordering::Equal => {}
            }
            if rest.len() < ksiz {
                return Ok(PREFIX_CMP);
            }
            rest = &rest[cmplen..];
        }
        Ok(i32::from(!rest.is_empty()))
    }

    /// Binary search for `key` among this node's entries. Keys on the
    /// page must be sorted and unique.
    pub fn search(&mut self, key: &[u8]) -> TreeResult<SearchResult> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        let mut i = 0usize;
        let mut j = self.entry_count()?;
        while i < j {
            let mid = (i + j) >> 1;
            let res = self.compare(key, mid)?;
            if res == 0 {
                return Ok(SearchResult {
                    index: mid,
                    found: true,
                });
            }
            if res < 0 {
                j = mid;
            } else {
                i = mid + 1;
            }
        }
        Ok(SearchResult {
            index: i,
            found: false,
        })
    }

    /// Reset this node to an empty page at `level`, with a free-form type
    /// tag and a zero-filled header extension of `extsz` SIZE_UNITS.
    ///
    /// Any previous content of the image is discarded.
    pub fn init(&mut self, level: u8, nodetype: u8, extsz: u8) -> TreeResult<()> {
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        let bytes = NodeHeader::SIZE + usize::from(extsz) * SIZE_UNITS;
        self.clean = 0;
        self.buf.clear();
        self.buf.resize(bytes, 0);
        NodeHeader {
            magic: NODE_MAGIC,
            version: NODE_VERSION,
            nodetype,
            level,
            extsz,
        }
        .write(&mut self.buf);
        self.freelow = bytes;
        Ok(())
    }

    /// Insert a new entry at index `i`, which becomes the entry's index.
    ///
    /// The caller chooses `i` (normally the miss index from [`search`])
    /// and is responsible for keeping keys unique and sorted, and for
    /// triggering a split once the node passes the tree's full threshold.
    /// The first insert into an empty node establishes its record size;
    /// later payloads must match it.
    ///
    /// Returns the new entry count.
    pub fn insert_entry(&mut self, i: usize, key: &[u8], payload: &[u8]) -> TreeResult<usize> {
        if self.freelow == 0 {
            self.chknode()?;
        }
        if self.corrupt != 0 {
            return Err(self.corrupt_err());
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(TreeError::KeyTooLong(key.len()));
        }
        let pb = round_up(payload.len());
        let n = self.entry_count()?;
        if i > n {
            return Err(TreeError::IndexOutOfRange {
                nodeid: self.nodeid,
                index: i,
            });
        }
        if n > usize::from(u16::MAX) {
            return Err(TreeError::Internal(format!(
                "node {} entry pack is full",
                self.nodeid
            )));
        }
        let k = pb + EntryTrailer::SIZE;
        if k / SIZE_UNITS > usize::from(u8::MAX) {
            return Err(TreeError::PayloadSize(payload.len()));
        }
        let org = if n == 0 {
            self.buf.len()
        } else {
            // Also validates the payload size against the record size.
            self.entry_offset(pb, 0)?
        };
        // Prefix reuse between neighboring keys is not implemented: the
        // whole key goes into span 0. Interior entry 0 keeps an empty key.
        if i == 0 && !key.is_empty() && self.level()? != 0 {
            return Err(TreeError::Internal(format!(
                "interior node {} entry 0 must carry an empty key",
                self.nodeid
            )));
        }
        let trailer = EntryTrailer {
            koff0: self.freelow as u32,
            ksiz0: key.len() as u16,
            koff1: 0,
            ksiz1: 0,
            entdx: 0, // renumbered below with the rest of the pack
            level: self.level()?,
            entsz: (k / SIZE_UNITS) as u8,
        };
        if !key.is_empty() && self.clean > self.freelow {
            self.clean = self.freelow;
        }
        let minnewsize = round_up((n + 1) * k + self.freelow + key.len());
        let pre = i * k; // bytes of records below the new entry
        let post = (n - i) * k; // bytes of records above it
        let write_pos;
        if minnewsize <= self.buf.len() {
            // Room already; slide the records below index i down one slot.
            let to = org - k;
            if self.clean > to {
                self.clean = to;
            }
            self.buf.copy_within(org..org + pre, to);
            write_pos = to + pre;
        } else {
            if self.clean > org {
                self.clean = org;
            }
            self.buf.resize(minnewsize, 0);
            let to = minnewsize - (pre + k + post);
            self.buf.copy_within(org + pre..org + pre + post, to + pre + k);
            self.buf.copy_within(org..org + pre, to);
            self.buf[org..to].fill(0x33);
            write_pos = to + pre;
        }
        self.buf[write_pos..write_pos + k].fill(0);
        self.buf[write_pos..write_pos + payload.len()].copy_from_slice(payload);
        trailer.write(&mut self.buf, write_pos + pb);
        // Renumber the new entry and everything shifted above it.
        let mut t = write_pos + pb;
        for j in i..=n {
            EntryTrailer::store_entdx(&mut self.buf, t, j as u16);
            t += k;
        }
        // Finally, append the key bytes to the heap.
        let fl = self.freelow;
        self.buf[fl..fl + key.len()].copy_from_slice(key);
        self.freelow += key.len();
        Ok(n + 1)
    }

    /// Recompute the free-low watermark and verify every page invariant
    /// in one pass.
    ///
    /// A clean pass resets a previously latched corrupt code and returns
    /// the prior value, so callers can notice a condition that was noted
    /// and has now been repaired. A fresh violation latches and fails. A
    /// zero-length image is healthy with `freelow = 0`; header plus
    /// extension alone is healthy with no entries.
    pub fn chknode(&mut self) -> TreeResult<u32> {
        let saved = self.corrupt;
        self.corrupt = 0;
        if self.buf.is_empty() {
            self.freelow = 0;
            return Ok(0);
        }
        if self.buf.len() < NodeHeader::SIZE {
            return Err(self.mark_corrupt(line!()));
        }
        let hdr = NodeHeader::read(&self.buf);
        if hdr.magic != NODE_MAGIC {
            return Err(self.mark_corrupt(line!()));
        }
        if hdr.version != NODE_VERSION {
            return Err(self.mark_corrupt(line!()));
        }
        // nodetype values are not checked
        let strbase = NodeHeader::SIZE + usize::from(hdr.extsz) * SIZE_UNITS;
        if strbase > self.buf.len() {
            return Err(self.mark_corrupt(line!()));
        }
        if strbase == self.buf.len() {
            self.freelow = strbase;
            return Ok(saved); // no entries
        }
        let nent = self.entry_count()?;
        let mut freelow = 0usize;
        let mut freemax = 0usize;
        let mut entsz = 0u8;
        for i in 0..nent {
            let off = self.seek_trailer(i)?;
            let p = EntryTrailer::read(&self.buf, off);
            if i == 0 {
                freemax = off;
                entsz = p.entsz;
            }
            if p.entsz != entsz {
                return Err(self.mark_corrupt(line!()));
            }
            if p.level != hdr.level {
                return Err(self.mark_corrupt(line!()));
            }
            let spans = [
                (p.koff0 as usize, usize::from(p.ksiz0)),
                (p.koff1 as usize, usize::from(p.ksiz1)),
            ];
            for (koff, ksiz) in spans {
                if koff < strbase && ksiz != 0 {
                    return Err(self.mark_corrupt(line!()));
                }
                if koff > freemax {
                    return Err(self.mark_corrupt(line!()));
                }
                if ksiz > freemax - koff {
                    return Err(self.mark_corrupt(line!()));
                }
                if koff + ksiz > freelow {
                    freelow = koff + ksiz;
                }
            }
        }
        self.freelow = freelow;
        Ok(saved)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("nodeid", &self.nodeid)
            .field("len", &self.buf.len())
            .field("parent", &self.parent)
            .field("freelow", &self.freelow)
            .field("clean", &self.clean)
            .field("corrupt", &self.corrupt)
            .finish()
    }
}
