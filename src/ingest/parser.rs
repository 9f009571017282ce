//! One parsing contract over decoders with different call shapes
//!
//! Decoders either stream `(stack, count)` pairs through a callback, with or
//! without a caller-supplied scratch buffer, or return a finished tree.
//! [`Parser`] closes over one of them and always yields a [`Tree`].

use std::fmt;
use std::io::BufRead;

use crate::convert::{parse_groups, parse_individual_lines, parse_trie_buf, DecodeError};
use crate::tree::Tree;

/// Streams pairs through a callback
pub type ConvertFn = fn(&mut dyn BufRead, &mut dyn FnMut(&[u8], u64)) -> Result<(), DecodeError>;

/// Streams pairs through a callback, using a scratch buffer while decoding
pub type ConvertBufFn =
    fn(&mut dyn BufRead, &mut Vec<u8>, &mut dyn FnMut(&[u8], u64)) -> Result<(), DecodeError>;

/// Decodes straight into a tree
pub type ConvertTreeFn = fn(&mut dyn BufRead) -> Result<Tree, DecodeError>;

#[derive(Clone, Copy)]
pub enum Parser {
    Callback(ConvertFn),
    CallbackBuf(ConvertBufFn),
    Direct(ConvertTreeFn),
}

impl Parser {
    /// Decode `r` into a fresh tree. `tmp_buf` is only lent to decoders that use one.
    pub fn parse(&self, r: &mut dyn BufRead, tmp_buf: &mut Vec<u8>) -> Result<Tree, DecodeError> {
        match *self {
            Parser::Callback(convert) => {
                let mut tree = Tree::new();
                convert(r, &mut |key, count| tree.insert(key, count))?;
                Ok(tree)
            }
            Parser::CallbackBuf(convert) => {
                let mut tree = Tree::new();
                convert(r, tmp_buf, &mut |key, count| tree.insert(key, count))?;
                Ok(tree)
            }
            Parser::Direct(convert) => convert(r),
        }
    }
}

/// Payload formats accepted on ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Binary tree (`format=tree`, `binary/octet-stream+tree`)
    Tree,
    /// Binary prefix trie (`format=trie`, `binary/octet-stream+trie`)
    Trie,
    /// One stack per line (`format=lines`)
    Lines,
    /// Collapsed `stack count` groups, the default
    Groups,
}

impl Format {
    pub fn parser(self) -> Parser {
        match self {
            Format::Tree => Parser::Direct(Tree::deserialize),
            Format::Trie => Parser::CallbackBuf(parse_trie_buf),
            Format::Lines => Parser::Callback(parse_individual_lines),
            Format::Groups => Parser::Callback(parse_groups),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Tree => "tree",
            Format::Trie => "trie",
            Format::Lines => "lines",
            Format::Groups => "groups",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::serialize_trie;

    fn parse(format: Format, body: &[u8], tmp_buf: &mut Vec<u8>) -> Result<Tree, DecodeError> {
        let mut r = body;
        format.parser().parse(&mut r, tmp_buf)
    }

    #[test]
    fn test_groups_build_tree() {
        let tree = parse(Format::Groups, b"a;b 2\na;c 3\na;b 1\n", &mut Vec::new()).unwrap();
        assert_eq!(tree.get(b"a;b"), Some(3));
        assert_eq!(tree.get(b"a;c"), Some(3));
        assert_eq!(tree.samples(), 6);
    }

    #[test]
    fn test_lines_build_tree() {
        let tree = parse(Format::Lines, b"stack;trace 5\n", &mut Vec::new()).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(b"stack;trace 5"), Some(1));
    }

    #[test]
    fn test_trie_uses_scratch_buffer() {
        let deep = vec!["frame"; 40].join(";");
        let mut body = Vec::new();
        serialize_trie(&[(deep.as_str(), 4), ("main;idle", 1)], &mut body);

        let mut tmp_buf = Vec::new();
        let tree = parse(Format::Trie, &body, &mut tmp_buf).unwrap();
        assert_eq!(tree.get(deep.as_bytes()), Some(4));
        assert_eq!(tree.get(b"main;idle"), Some(1));
        // keys were assembled in the lent buffer, which is cleared but keeps its growth
        assert!(tmp_buf.is_empty());
        assert!(tmp_buf.capacity() >= deep.len());
    }

    #[test]
    fn test_tree_ignores_scratch_buffer() {
        let mut expected = Tree::new();
        expected.insert(b"main;work", 9);
        let mut body = Vec::new();
        expected.serialize(&mut body);

        let mut tmp_buf = b"untouched".to_vec();
        let tree = parse(Format::Tree, &body, &mut tmp_buf).unwrap();
        assert_eq!(tree, expected);
        assert_eq!(tmp_buf, b"untouched");
    }

    #[test]
    fn test_decode_errors_propagate() {
        assert!(matches!(
            parse(Format::Groups, b"no-count-here\n", &mut Vec::new()),
            Err(DecodeError::MissingCount { line: 1 })
        ));
        assert!(matches!(
            parse(Format::Trie, &[0, 0, 1], &mut Vec::new()),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
