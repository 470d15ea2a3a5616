//! Line-oriented allocation trace format.
//!
//! Each non-blank, non-comment line is one operation:
//!
//! ```text
//! a <id> <size>   allocate <size> bytes, remember the result under <id>
//! r <id> <size>   reallocate the block remembered under <id> to <size> bytes
//! f <id>          free the block remembered under <id>
//! ```
//!
//! `#` starts a comment that runs to the end of the line. `<id>` is an
//! arbitrary token used only to pair a later `f`/`r` with the `a` that
//! produced it; it need not be numeric or contiguous.

use std::fs;
use std::path::Path;

/// One operation in a trace.
#[derive(Debug, Clone)]
pub enum Op {
    /// Allocate `size` bytes, keyed by `id`.
    Alloc { id: String, size: usize },
    /// Reallocate the block keyed by `id` to `size` bytes.
    Realloc { id: String, size: usize },
    /// Free the block keyed by `id`.
    Free { id: String },
}

/// Failure to parse a trace file.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The file could not be read from disk.
    #[error("failed to read trace file {path}: {source}")]
    Io {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A line did not match any known operation shape.
    #[error("line {line}: malformed operation {text:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line, verbatim.
        text: String,
    },
}

/// Reads and parses every operation out of the trace file at `path`.
///
/// # Errors
/// Returns [`TraceError::Io`] if the file cannot be read, or
/// [`TraceError::Malformed`] on the first line that isn't a valid operation.
pub fn load(path: &Path) -> Result<Vec<Op>, TraceError> {
    let contents = fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut ops = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        ops.push(parse_line(line, idx + 1)?);
    }
    Ok(ops)
}

fn parse_line(line: &str, line_no: usize) -> Result<Op, TraceError> {
    let mut fields = line.split_whitespace();
    let malformed = || TraceError::Malformed {
        line: line_no,
        text: line.to_string(),
    };

    let op = fields.next().ok_or_else(malformed)?;
    match op {
        "a" => {
            let id = fields.next().ok_or_else(malformed)?.to_string();
            let size = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(malformed)?;
            Ok(Op::Alloc { id, size })
        }
        "r" => {
            let id = fields.next().ok_or_else(malformed)?.to_string();
            let size = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(malformed)?;
            Ok(Op::Realloc { id, size })
        }
        "f" => {
            let id = fields.next().ok_or_else(malformed)?.to_string();
            Ok(Op::Free { id })
        }
        _ => Err(malformed()),
    }
}
