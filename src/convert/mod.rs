//! Profile payload decoders
//!
//! Each decoder turns a request body into `(stack key, count)` pairs or, for
//! the binary tree format, straight into a [`Tree`](crate::tree::Tree).
//! Decoders have differing call shapes; [`crate::ingest::parser`] puts them
//! behind one signature.

pub mod groups;
pub mod lines;
pub mod trie;
pub mod varint;

pub use groups::parse_groups;
pub use lines::parse_individual_lines;
pub use trie::{parse_trie_buf, serialize_trie};

/// Errors raised while decoding a profile payload
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("varint overflows 64 bits")]
    VarintOverflow,

    #[error("length {0} does not fit in memory")]
    LengthOverflow(u64),

    #[error("line {line}: missing sample count")]
    MissingCount { line: usize },

    #[error("line {line}: invalid sample count '{value}'")]
    InvalidCount { line: usize, value: String },
}
