use std::io::BufRead;

use super::varint::{expect_uvarint, read_bytes_into, read_uvarint, write_uvarint};
use super::DecodeError;

/// Walk a serialized prefix trie, reporting every node that carries a value.
///
/// Records are laid out pre-order as
/// `uvarint(label_len) label uvarint(value) uvarint(child_count)`. A node's key
/// is the concatenation of the labels on its path, assembled in `tmp_buf` so
/// no per-node allocation happens. Several top-level tries may follow each
/// other in one stream.
pub fn parse_trie_buf(
    r: &mut dyn BufRead,
    tmp_buf: &mut Vec<u8>,
    cb: &mut dyn FnMut(&[u8], u64),
) -> Result<(), DecodeError> {
    // (key length for this node's children, children still to read)
    let mut open: Vec<(usize, u64)> = Vec::new();

    loop {
        match open.last_mut() {
            Some((prefix_len, remaining)) => {
                tmp_buf.truncate(*prefix_len);
                *remaining -= 1;
            }
            None => tmp_buf.clear(),
        }

        let label_len = match read_uvarint(r)? {
            Some(len) => len,
            None if open.is_empty() => return Ok(()),
            None => return Err(DecodeError::UnexpectedEof),
        };
        read_bytes_into(r, label_len, tmp_buf)?;

        let value = expect_uvarint(r)?;
        if value > 0 {
            cb(tmp_buf.as_slice(), value);
        }

        let children = expect_uvarint(r)?;
        if children > 0 {
            open.push((tmp_buf.len(), children));
        }
        while matches!(open.last(), Some((_, 0))) {
            open.pop();
        }
    }
}

/// Serialize `(key, value)` pairs as a prefix trie readable by [`parse_trie_buf`].
///
/// Keys sharing a prefix share trie nodes; repeated keys are summed.
pub fn serialize_trie<K: AsRef<[u8]>>(pairs: &[(K, u64)], out: &mut Vec<u8>) {
    let mut entries: Vec<(&[u8], u64)> = pairs.iter().map(|(k, v)| (k.as_ref(), *v)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    write_node(out, b"", &entries);
}

fn write_node(out: &mut Vec<u8>, label: &[u8], entries: &[(&[u8], u64)]) {
    let value: u64 = entries
        .iter()
        .filter(|(k, _)| k.is_empty())
        .map(|(_, v)| *v)
        .sum();
    let rest: Vec<(&[u8], u64)> = entries.iter().filter(|(k, _)| !k.is_empty()).copied().collect();

    // Entries are sorted, so children are runs sharing a first byte.
    let mut groups: Vec<&[(&[u8], u64)]> = Vec::new();
    let mut start = 0;
    for i in 1..=rest.len() {
        if i == rest.len() || rest[i].0[0] != rest[start].0[0] {
            groups.push(&rest[start..i]);
            start = i;
        }
    }

    write_uvarint(out, label.len() as u64);
    out.extend_from_slice(label);
    write_uvarint(out, value);
    write_uvarint(out, groups.len() as u64);

    for group in groups {
        let lcp = common_prefix_len(group);
        let suffixes: Vec<(&[u8], u64)> = group.iter().map(|&(k, v)| (&k[lcp..], v)).collect();
        write_node(out, &group[0].0[..lcp], &suffixes);
    }
}

fn common_prefix_len(group: &[(&[u8], u64)]) -> usize {
    let first = group[0].0;
    group[1..].iter().fold(first.len(), |len, (k, _)| {
        first
            .iter()
            .zip(k.iter())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count()
    })
}
