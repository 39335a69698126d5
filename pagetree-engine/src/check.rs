//! Operator-facing whole-tree consistency walk.
//!
//! `check` is a diagnostic tool, not part of the hot path: it walks the
//! resident tree depth first, re-verifies every node, and reports what it
//! sees on stderr, one line per entry. The exact text is informational.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::mem;

use crate::error::{TreeError, TreeResult};
use crate::storage::page::NodeId;
use crate::tree::{Tree, ROOT_ID};

/// Depth cap for the explicit walk stack.
const MAX_DEPTH: usize = 40;

const TABS: &str = "\t\t\t\t\t\t\t\t";

/// Render `src` with control and quoting-hazard bytes octal-escaped.
fn append_escaped(dst: &mut String, src: &[u8]) {
    for &c in src {
        if !(b' '..=b'~').contains(&c) || matches!(c, b'\\' | b'(' | b')' | b'"') {
            let _ = write!(dst, "\\{c:03o}");
        } else {
            dst.push(c as char);
        }
    }
}

impl Tree {
    /// Depth-first walk of the resident tree, validating node health, key
    /// ordering, and parent linkage.
    ///
    /// Summary and problem lines on stderr are prefixed `%I`, `%W`, or
    /// `%E`; every visited entry gets a line of its own. Stale parent
    /// links are warned about and repaired in place. A pending error or
    /// missed-split indication is reset before the walk; the call fails
    /// if the walk itself finds problems.
    pub fn check(&mut self) -> TreeResult<()> {
        eprintln!(
            "%I start btree check {} {} {} {}",
            self.resident_count(),
            self.nextsplit(),
            self.missedsplit(),
            self.errors()
        );
        if self.missedsplit() != 0 || self.errors() != 0 {
            eprintln!("%W reset error indications");
            self.reset_check_indicators();
        }
        if self.rnode(ROOT_ID).is_none() {
            eprintln!("%E no root node!");
            return self.check_bail();
        }
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut prev: Vec<u8> = Vec::new();
        let mut cur: Vec<u8> = Vec::new();
        let mut nodeid = ROOT_ID;
        let mut k = 0usize;
        let mut halted = false;
        loop {
            if k == 0 {
                // First visit of this node; re-verify it wholesale.
                let chk = match self.rnode(nodeid) {
                    Some(node) => node.chknode().map_err(|_| node.corrupt_code()),
                    None => return self.check_bail(),
                };
                match chk {
                    Err(code) => {
                        eprintln!("%E chknode({nodeid}) error ({code})");
                        self.count_error();
                        return self.check_bail();
                    }
                    Ok(prior) if prior != 0 => {
                        eprintln!("%W chknode({nodeid}) returned {prior}");
                    }
                    Ok(_) => {}
                }
            }
            let (l, n) = {
                let Some(node) = self.rnode(nodeid) else {
                    return self.check_bail();
                };
                match (node.level(), node.entry_count()) {
                    (Ok(l), Ok(n)) => (l, n),
                    _ => return self.check_bail(),
                }
            };
            if k == n {
                // Done here; resume in the parent.
                match stack.pop() {
                    None => break,
                    Some((up, upk)) => {
                        nodeid = up;
                        k = upk;
                        continue;
                    }
                }
            }
            if k == 0 && l > 0 {
                // Key 0 of an interior node must be empty.
                let bad = {
                    let Some(node) = self.rnode(nodeid) else {
                        return self.check_bail();
                    };
                    if matches!(node.compare(&[], 0), Ok(0)) {
                        None
                    } else {
                        let mut q = String::new();
                        if let Ok(key) = node.key(0) {
                            append_escaped(&mut q, &key);
                        }
                        Some(q)
                    }
                };
                if let Some(q) = bad {
                    eprintln!("%E Key [{nodeid} 0] {l} not empty: ({q})");
                    self.count_error();
                }
            } else {
                mem::swap(&mut prev, &mut cur);
                let fetched = {
                    let Some(node) = self.rnode(nodeid) else {
                        return self.check_bail();
                    };
                    node.key_fetch(&mut cur, k).is_ok()
                };
                if !fetched {
                    eprintln!("%E could not fetch key {k} of node {nodeid}");
                    self.count_error();
                    halted = true;
                } else {
                    let ordered = match prev.as_slice().cmp(cur.as_slice()) {
                        Ordering::Less => true,
                        // An ancestor's separator may equal the first key
                        // of the leaf below it.
                        Ordering::Equal => k == 0 && l == 0,
                        Ordering::Greater => false,
                    };
                    if !ordered {
                        eprintln!("%E Keys are out of order! [{nodeid} {k}]");
                        self.count_error();
                        if self.errors() > 10 {
                            halted = true;
                        }
                    }
                    let mut q = String::new();
                    append_escaped(&mut q, &cur);
                    let tag = if l == 0 { "leaf" } else { "node" };
                    eprintln!(
                        "{}({q}) [{nodeid} {k}] {l} {tag}",
                        &TABS[8 - stack.len() % 8..]
                    );
                }
            }
            if halted {
                break;
            }
            if l == 0 {
                k += 1;
            } else {
                stack.push((nodeid, k + 1));
                if stack.len() == MAX_DEPTH {
                    return self.check_bail();
                }
                let childid = {
                    let Some(node) = self.rnode(nodeid) else {
                        return self.check_bail();
                    };
                    match node.child(k) {
                        Ok(c) => c,
                        Err(_) => return self.check_bail(),
                    }
                };
                let stale = {
                    let Some(child) = self.rnode(childid) else {
                        return self.check_bail();
                    };
                    if child.parent == nodeid {
                        None
                    } else {
                        // Expected after a split above the child; repair.
                        let stale = child.parent;
                        child.parent = nodeid;
                        Some(stale)
                    }
                };
                if let Some(stale) = stale {
                    eprintln!("%W child parent link {stale} != {nodeid}, repaired");
                }
                nodeid = childid;
                k = 0;
            }
        }
        if !halted && self.errors() == 0 {
            Ok(())
        } else {
            self.check_bail()
        }
    }

    fn check_bail(&mut self) -> TreeResult<()> {
        self.count_error();
        eprintln!(
            "%W finish btree check {} {} {} {}",
            self.resident_count(),
            self.nextsplit(),
            self.missedsplit(),
            self.errors()
        );
        Err(TreeError::Errors(self.errors()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_tree(count: u64) -> Tree {
        let mut tree = Tree::new();
        tree.with_node(ROOT_ID, |node| node.init(0, b'L', 0))
            .unwrap()
            .unwrap();
        for i in 0..count {
            let key = format!("key{i:04}");
            let (srch, leaf) = tree.lookup(key.as_bytes()).unwrap();
            let n = tree
                .with_node(leaf, |node| {
                    node.insert_entry(srch.index, key.as_bytes(), &i.to_be_bytes())
                })
                .unwrap()
                .unwrap();
            if n > tree.full() {
                tree.split(leaf).unwrap();
            }
            while tree.nextsplit() != 0 {
                let next = tree.nextsplit();
                tree.split(next).unwrap();
            }
        }
        tree
    }

    #[test]
    fn test_check_empty_root() {
        let mut tree = Tree::new();
        tree.with_node(ROOT_ID, |node| node.init(0, b'L', 0))
            .unwrap()
            .unwrap();
        tree.check().unwrap();
    }

    #[test]
    fn test_check_without_root_fails() {
        let mut tree = Tree::new();
        assert!(matches!(tree.check(), Err(TreeError::Errors(_))));
    }

    #[test]
    fn test_check_multi_level_tree() {
        let mut tree = populated_tree(120);
        tree.check().unwrap();
        assert_eq!(tree.errors(), 0);
    }

    #[test]
    fn test_check_detects_out_of_order_keys() {
        let mut tree = populated_tree(3);

        // Scribble over the middle key's heap bytes so ordering breaks.
        let node = tree.rnode(ROOT_ID).unwrap();
        let mut key = node.key(1).unwrap();
        let heap_off = node
            .image()
            .windows(key.len())
            .position(|w| w == key.as_slice())
            .unwrap();
        key.fill(b'z');
        node.buf[heap_off..heap_off + key.len()].copy_from_slice(&key);

        assert!(tree.check().is_err());
        assert!(tree.errors() > 0);
    }

    #[test]
    fn test_check_repairs_stale_parent_link() {
        let mut tree = populated_tree(40);
        let (_, leaf) = tree.lookup(b"key0000").unwrap();
        tree.rnode(leaf).unwrap().parent = 999;

        tree.check().unwrap();
        assert_ne!(tree.rnode(leaf).unwrap().parent(), 999);
    }

    #[test]
    fn test_check_resets_error_indications() {
        let mut tree = populated_tree(10);
        tree.count_error();
        assert_eq!(tree.errors(), 1);
        tree.check().unwrap();
        assert_eq!(tree.errors(), 0);
    }

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        append_escaped(&mut out, b"plain");
        assert_eq!(out, "plain");

        let mut out = String::new();
        append_escaped(&mut out, b"a(b)\\\"\x01\xff");
        assert_eq!(out, "a\\050b\\051\\134\\042\\001\\377");
    }
}
