//! Interactive page range entry

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::recognition::parse_page_range;

/// Ask for a page range until it resolves to at least one page.
///
/// `initial` is tried first without prompting. Returns `None` when the
/// input ends before a valid range was entered.
pub fn prompt_page_range<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    initial: Option<String>,
    page_count: usize,
) -> Result<Option<Vec<usize>>> {
    let mut pending = initial;
    loop {
        let text = match pending.take() {
            Some(text) => text,
            None => {
                write!(output, "Pages to recognize (e.g. 1-3,5) [1-{}]: ", page_count)?;
                output.flush()?;
                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                line
            }
        };

        match parse_page_range(text.trim(), page_count) {
            Ok(pages) => return Ok(Some(pages)),
            Err(e) => writeln!(output, "{}", e)?,
        }
    }
}
