use std::io::BufRead;

use super::groups::trim_line_ending;
use super::DecodeError;

/// Parse one stack per line, each line counting as a single sample.
pub fn parse_individual_lines(
    r: &mut dyn BufRead,
    cb: &mut dyn FnMut(&[u8], u64),
) -> Result<(), DecodeError> {
    let mut line = Vec::new();

    loop {
        line.clear();
        if r.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }

        let stack = trim_line_ending(&line);
        if stack.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        cb(stack, 1);
    }
}
