//! Rolling boundary scan over a part body.
//!
//! A part body ends at the first line break that is directly followed by `--`, the
//! boundary token and either a line break (more parts follow) or `--` (closing
//! delimiter). CRLF and bare LF are both accepted as line breaks.
//! Anything else that starts with `--` after a line break is ordinary body data.
//!
//! The scanner never buffers the body: it walks the stream byte by byte, remembers where
//! the current candidate line break started, and on `--` reads a fixed lookahead of
//! `boundary.len() + 2` bytes to confirm or reject the candidate. A rejected candidate
//! resumes right after its `--`, so a real delimiter overlapping the false one is still
//! found.

use std::io::{self, Read, Seek};

use tracing::trace;

use super::source::ByteSource;

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const HYPHEN: u8 = b'-';

/// Kind of delimiter that ended a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    /// `--boundary` followed by a line break, another part follows
    Mid,
    /// `--boundary--`, the body is complete
    Final,
}

/// A confirmed delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundaryMatch {
    /// Offset of the line break (CR, or LF when bare) that precedes the dashes
    pub(crate) line_start: u64,
    pub(crate) delimiter: Delimiter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Inside body data, waiting for a line feed
    Body,
    /// Right after a line feed, a delimiter may start here
    LineStart,
}

pub(crate) struct BoundaryScanner {
    boundary: Box<[u8]>,
    /// Holds the boundary token plus the two bytes that follow it
    lookahead: Box<[u8]>,
}

impl BoundaryScanner {
    pub(crate) fn new(boundary: &[u8]) -> Self {
        Self { boundary: boundary.into(), lookahead: vec![0u8; boundary.len() + 2].into_boxed_slice() }
    }

    /// Scans forward from the current position for the next delimiter.
    ///
    /// On success the source is left at the line break preceding the delimiter, so the
    /// next header scan starts with a blank line followed by the delimiter line. Returns
    /// `None` when the stream ends first.
    pub(crate) fn scan<R: Read + Seek>(&mut self, src: &mut ByteSource<R>) -> io::Result<Option<BoundaryMatch>> {
        let mut state = ScanState::Body;
        let mut got_cr = false;
        let mut line_start = src.position();
        let mut current = src.read_byte()?;

        loop {
            let Some(byte) = current else {
                return Ok(None);
            };

            match state {
                ScanState::Body => {
                    if byte == LF {
                        // the LF sits one byte behind the read position, the CR one more
                        line_start = src.position() - 1 - u64::from(got_cr);
                        got_cr = false;
                        state = ScanState::LineStart;
                    } else {
                        got_cr = byte == CR;
                    }
                    current = src.read_byte()?;
                }

                ScanState::LineStart => {
                    // re-examine this byte as body data
                    state = ScanState::Body;
                    if byte != HYPHEN {
                        continue;
                    }

                    current = src.read_byte()?;
                    match current {
                        None => return Ok(None),
                        Some(HYPHEN) => {}
                        Some(_) => continue,
                    }

                    let dashes_end = src.position();
                    if let Some(delimiter) = self.confirm(src)? {
                        src.set_position(line_start)?;
                        trace!(line_start, ?delimiter, "found multipart boundary");
                        return Ok(Some(BoundaryMatch { line_start, delimiter }));
                    }

                    trace!(offset = line_start, "boundary candidate rejected, resuming scan");
                    src.set_position(dashes_end)?;
                    current = src.read_byte()?;
                }
            }
        }
    }

    /// Reads the lookahead right after a `--` and classifies it.
    ///
    /// `Ok(None)` means the bytes do not form a delimiter, or the stream is too short to
    /// hold one.
    fn confirm<R: Read + Seek>(&mut self, src: &mut ByteSource<R>) -> io::Result<Option<Delimiter>> {
        let read = src.read_full(&mut self.lookahead)?;
        if read != self.lookahead.len() {
            return Ok(None);
        }

        let (token, tail) = self.lookahead.split_at(self.boundary.len());
        if token != &self.boundary[..] {
            return Ok(None);
        }

        Ok(match tail {
            [HYPHEN, HYPHEN] => Some(Delimiter::Final),
            [CR, LF] | [LF, _] => Some(Delimiter::Mid),
            _ => None,
        })
    }
}
