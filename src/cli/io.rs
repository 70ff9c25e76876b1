//! Line-oriented I/O for the CLI
//!
//! - Input: one JSON object (or one raw line) per stdin line
//! - Output: one JSON object per stdout line
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a single line, without its line terminator
pub fn read_line<R: BufRead>(input: &mut R) -> CliResult<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;

    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(line.to_string())
}

/// Parse one JSON request per non-blank line
///
/// A line that is not valid JSON yields `Ok(Err(..))` so the caller can
/// answer it and carry on; only read failures end the stream.
pub fn read_requests<R: BufRead>(
    input: R,
) -> impl Iterator<Item = CliResult<Result<Value, String>>> {
    input
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| {
            let line = line.map_err(CliError::from)?;
            Ok(serde_json::from_str(&line).map_err(|e| e.to_string()))
        })
}

/// Write one JSON value as a line
pub fn write_json<W: Write>(output: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *output, value)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
