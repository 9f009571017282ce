use std::io::{self, BufRead, Read};

use super::DecodeError;

/// Read an unsigned LEB128 varint.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes consumed), which lets
/// record-oriented decoders tell "no more records" apart from truncation.
pub fn read_uvarint<R: BufRead + ?Sized>(r: &mut R) -> Result<Option<u64>, DecodeError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut first = true;

    loop {
        let byte = match read_byte(r)? {
            Some(b) => b,
            None if first => return Ok(None),
            None => return Err(DecodeError::UnexpectedEof),
        };
        first = false;

        if shift == 63 && byte > 1 {
            return Err(DecodeError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}

/// Like [`read_uvarint`] but treats end of stream as truncation.
pub fn expect_uvarint<R: BufRead + ?Sized>(r: &mut R) -> Result<u64, DecodeError> {
    read_uvarint(r)?.ok_or(DecodeError::UnexpectedEof)
}

/// Append exactly `len` bytes from the stream to `out`.
pub fn read_bytes_into<R: BufRead + ?Sized>(
    r: &mut R,
    len: u64,
    out: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let expected = usize::try_from(len).map_err(|_| DecodeError::LengthOverflow(len))?;
    // Grow with the data actually present; a bogus length must not allocate up front.
    let read = Read::take(&mut *r, len).read_to_end(out)?;
    if read < expected {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(())
}

pub fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_byte<R: BufRead + ?Sized>(r: &mut R) -> Result<Option<u8>, DecodeError> {
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
}
