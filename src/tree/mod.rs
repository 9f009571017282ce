//! Aggregated call tree
//!
//! A [`Tree`] maps a stack key (frame names joined by `;`) to the cumulative
//! number of samples observed for that exact stack. It is the unit handed to
//! storage for every ingested profile.

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::convert::varint::{expect_uvarint, read_bytes_into, read_uvarint, write_uvarint};
use crate::convert::DecodeError;

/// Frame separator inside stack keys
pub const FRAME_SEPARATOR: u8 = b';';

/// Per-entry bookkeeping overhead used by [`Tree::memory_usage`]
const ENTRY_OVERHEAD_BYTES: usize = 48;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    stacks: BTreeMap<Vec<u8>, u64>,
    samples: u64,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` samples to `key`. Counts for repeated keys accumulate.
    pub fn insert(&mut self, key: &[u8], count: u64) {
        if count == 0 {
            return;
        }
        match self.stacks.get_mut(key) {
            Some(existing) => *existing = existing.saturating_add(count),
            None => {
                self.stacks.insert(key.to_vec(), count);
            }
        }
        self.samples = self.samples.saturating_add(count);
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.stacks.get(key).copied()
    }

    /// Number of distinct stacks
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Total samples across all stacks
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Iterate stacks in key order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], u64)> {
        self.stacks.iter().map(|(k, v)| (k.as_slice(), *v))
    }

    pub fn merge(&mut self, other: &Tree) {
        for (key, count) in other.iter() {
            self.insert(key, count);
        }
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        self.stacks
            .keys()
            .map(|k| k.len() + ENTRY_OVERHEAD_BYTES)
            .sum()
    }

    /// Write the tree in the binary tree format.
    ///
    /// Records are pre-order `uvarint(name_len) name uvarint(self) uvarint(children)`
    /// starting with an unnamed root. Frames are split on [`FRAME_SEPARATOR`].
    pub fn serialize(&self, out: &mut Vec<u8>) {
        let mut root = Node::default();
        for (key, count) in self.iter() {
            let mut node = &mut root;
            for frame in key.split(|&b| b == FRAME_SEPARATOR) {
                node = node.children.entry(frame).or_default();
            }
            node.self_count += count;
        }
        root.write(b"", out);
    }

    /// Read a tree written in the binary tree format.
    pub fn deserialize(r: &mut dyn BufRead) -> Result<Tree, DecodeError> {
        let mut tree = Tree::new();
        let mut key = Vec::new();
        // (key length for this node's children, children still to read)
        let mut open: Vec<(usize, u64)> = Vec::new();

        loop {
            match open.last_mut() {
                Some((prefix_len, remaining)) => {
                    key.truncate(*prefix_len);
                    *remaining -= 1;
                }
                None => key.clear(),
            }

            let name_len = match read_uvarint(r)? {
                Some(len) => len,
                None if open.is_empty() => return Ok(tree),
                None => return Err(DecodeError::UnexpectedEof),
            };
            // The root and its direct children start a fresh key; empty frame names still count.
            if open.len() > 1 {
                key.push(FRAME_SEPARATOR);
            }
            read_bytes_into(r, name_len, &mut key)?;

            let self_count = expect_uvarint(r)?;
            tree.insert(&key, self_count);

            let children = expect_uvarint(r)?;
            if children > 0 {
                open.push((key.len(), children));
            }
            while matches!(open.last(), Some((_, 0))) {
                open.pop();
            }
        }
    }
}

#[derive(Default)]
struct Node<'a> {
    self_count: u64,
    children: BTreeMap<&'a [u8], Node<'a>>,
}

impl Node<'_> {
    fn write(&self, name: &[u8], out: &mut Vec<u8>) {
        write_uvarint(out, name.len() as u64);
        out.extend_from_slice(name);
        write_uvarint(out, self.self_count);
        write_uvarint(out, self.children.len() as u64);
        for (child_name, child) in &self.children {
            child.write(child_name, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_accumulates() {
        let mut tree = Tree::new();
        tree.insert(b"main;work", 3);
        tree.insert(b"main;work", 2);
        tree.insert(b"main;idle", 1);
        tree.insert(b"main;noop", 0);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(b"main;work"), Some(5));
        assert_eq!(tree.get(b"main;noop"), None);
        assert_eq!(tree.samples(), 6);
    }

    #[test]
    fn test_merge() {
        let mut a = Tree::new();
        a.insert(b"x;y", 1);
        let mut b = Tree::new();
        b.insert(b"x;y", 4);
        b.insert(b"x", 2);

        a.merge(&b);
        assert_eq!(a.get(b"x;y"), Some(5));
        assert_eq!(a.get(b"x"), Some(2));
        assert_eq!(a.samples(), 7);
    }

    #[test]
    fn test_binary_format_preserves_stacks() {
        let mut tree = Tree::new();
        tree.insert(b"main;run;parse", 3);
        tree.insert(b"main;run", 1);
        tree.insert(b"main;gc", 7);

        let mut data = Vec::new();
        tree.serialize(&mut data);

        let mut r: &[u8] = &data;
        let decoded = Tree::deserialize(&mut r).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_deserialize_hand_built() {
        // root -> "a" (0) -> { "b" (2), "c" (5) }
        let data = [
            0, 0, 1, //
            1, b'a', 0, 2, //
            1, b'b', 2, 0, //
            1, b'c', 5, 0,
        ];
        let mut r: &[u8] = &data;
        let tree = Tree::deserialize(&mut r).unwrap();

        let stacks: Vec<_> = tree.iter().map(|(k, v)| (k.to_vec(), v)).collect();
        assert_eq!(stacks, vec![(b"a;b".to_vec(), 2), (b"a;c".to_vec(), 5)]);
    }

    #[test]
    fn test_empty_frame_names_survive_binary_format() {
        let mut tree = Tree::new();
        tree.insert(b"a;;b", 2);
        tree.insert(b";lead", 1);
        tree.insert(b"a;b", 4);

        let mut data = Vec::new();
        tree.serialize(&mut data);

        let mut r: &[u8] = &data;
        let decoded = Tree::deserialize(&mut r).unwrap();
        assert_eq!(decoded.get(b"a;;b"), Some(2));
        assert_eq!(decoded.get(b";lead"), Some(1));
        assert_eq!(decoded.get(b"a;b"), Some(4));
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_deserialize_truncated() {
        let data = [0, 0, 1, 1, b'a'];
        let mut r: &[u8] = &data;
        assert!(matches!(
            Tree::deserialize(&mut r),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
