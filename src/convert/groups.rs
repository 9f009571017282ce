use std::io::BufRead;

use super::DecodeError;

/// Parse the collapsed-stack text format: one `<stack> <count>` group per line.
///
/// The count is everything after the last space, so frame names may contain
/// spaces. Blank lines are skipped.
pub fn parse_groups(
    r: &mut dyn BufRead,
    cb: &mut dyn FnMut(&[u8], u64),
) -> Result<(), DecodeError> {
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if r.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        line_no += 1;

        let trimmed = trim_line_ending(&line);
        if trimmed.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let split = trimmed
            .iter()
            .rposition(|&b| b == b' ')
            .ok_or(DecodeError::MissingCount { line: line_no })?;
        let (stack, count) = (&trimmed[..split], &trimmed[split + 1..]);

        let count = std::str::from_utf8(count)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| DecodeError::InvalidCount {
                line: line_no,
                value: String::from_utf8_lossy(count).into_owned(),
            })?;

        cb(stack, count);
    }
}

pub(super) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
