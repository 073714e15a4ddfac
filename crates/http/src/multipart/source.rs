//! Position-tracking byte source over a seekable stream.
//!
//! The multipart scanner reads one byte at a time and frequently jumps back a few
//! bytes after a false boundary candidate. [`ByteSource`] keeps a `BufReader` in front of
//! the stream and tracks the logical position itself, so short backward jumps stay inside
//! the buffer instead of hitting the underlying stream.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};

const LF: u8 = b'\n';
const CR: u8 = b'\r';

const BUFFER_CAPACITY: usize = 8 * 1024;

pub(crate) struct ByteSource<R> {
    reader: BufReader<R>,
    position: u64,
}

impl<R: Read + Seek> ByteSource<R> {
    pub(crate) fn new(stream: R) -> io::Result<Self> {
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, stream);
        let position = reader.stream_position()?;
        Ok(Self { reader, position })
    }

    /// Absolute offset of the next byte to be read.
    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: u64) -> io::Result<()> {
        if position == self.position {
            return Ok(());
        }

        let offset = if position > self.position {
            i64::try_from(position - self.position)
        } else {
            i64::try_from(self.position - position).map(|delta| -delta)
        }
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

        self.reader.seek_relative(offset)?;
        self.position = position;
        Ok(())
    }

    /// Reads a single byte, `None` at end of stream.
    pub(crate) fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = loop {
            match self.reader.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        };

        if byte.is_some() {
            self.reader.consume(1);
            self.position += 1;
        }
        Ok(byte)
    }

    /// Fills `buf` as far as the stream allows and returns the number of bytes read.
    ///
    /// A short count means the stream ended.
    pub(crate) fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Reads one line into `line`, without its terminator.
    ///
    /// Lines end with LF; a CR directly before the LF is dropped as well. Returns `false`
    /// when the stream ends before a terminator, in which case the partial line is
    /// discarded.
    pub(crate) fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        loop {
            match self.read_byte()? {
                None => return Ok(false),
                Some(LF) => break,
                Some(byte) => line.push(byte),
            }
        }

        if line.last() == Some(&CR) {
            line.pop();
        }
        Ok(true)
    }

    /// Gives the stream back, positioned at the logical position.
    pub(crate) fn into_inner(mut self) -> io::Result<R> {
        let position = self.position;
        self.reader.seek(SeekFrom::Start(position))?;
        Ok(self.reader.into_inner())
    }
}
