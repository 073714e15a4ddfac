//! Streaming `multipart/form-data` parser over a seekable byte stream.
//!
//! [`MultipartParser`] walks a multipart body one part at a time and reports each part
//! as a [`Part`]: its `name`, `filename` and `Content-Type` plus the byte range of its
//! body inside the original stream. Part bodies are never copied by the parser; callers
//! read them afterwards through [`MultipartParser::read_part`],
//! [`MultipartParser::part_reader`], or by slicing the source buffer directly.
//!
//! # Parsing model
//!
//! Each call to [`MultipartParser::read_next_element`]:
//!
//! 1. skips blank and preamble lines up to a `--boundary` line
//! 2. reads the header block up to the first blank line
//! 3. records the body start and scans forward for the next delimiter
//!    (`CRLF--boundary` followed by a line break or `--`)
//! 4. rewinds to the line break before the delimiter and returns the part
//!
//! Both CRLF and bare LF line endings are accepted.
//!
//! # Errors
//!
//! A body that ends before its closing delimiter yields
//! [`MultipartError::UnterminatedBody`]. This is distinct from the normal end of the
//! sequence (`Ok(None)`) and means the whole body must be rejected.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use gatehouse_http::multipart::MultipartParser;
//!
//! let body = b"--xyz\r\n\
//!     Content-Disposition: form-data; name=\"greeting\"\r\n\
//!     \r\n\
//!     hello\r\n\
//!     --xyz--\r\n";
//!
//! let mut parser = MultipartParser::new(Cursor::new(&body[..]), "xyz", encoding_rs::UTF_8).unwrap();
//! let part = parser.read_next_element().unwrap().unwrap();
//!
//! assert_eq!(part.name(), Some("greeting"));
//! assert_eq!(parser.read_part(&part).unwrap(), b"hello");
//! assert!(parser.read_next_element().unwrap().is_none());
//! ```

mod boundary;
mod header;
mod source;

use std::io::{self, ErrorKind, Read, Seek};
use std::iter::FusedIterator;
use std::ops::Range;

use encoding_rs::Encoding;
use tracing::{debug, trace};

use crate::ensure;
use crate::protocol::MultipartError;

use boundary::{BoundaryScanner, Delimiter};
use header::PartHeaders;
use source::ByteSource;

const DELIMITER_PREFIX: &[u8] = b"--";

/// One part of a multipart body.
///
/// `start` and `length` locate the body in the stream the parser was built on. The range
/// never includes the line break or dashes of the surrounding delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    start: u64,
    length: u64,
}

impl Part {
    /// The `name` attribute of `Content-Disposition`.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `filename` attribute with any client-side directory removed.
    #[inline]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Absolute offset of the first body byte.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Half-open byte range of the body in the source stream.
    #[inline]
    pub fn range(&self) -> Range<u64> {
        self.start..self.start + self.length
    }

    /// Returns true if the part carries a `filename`, i.e. is a file upload.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }
}

/// Forward-only parser producing the [`Part`]s of a multipart body.
///
/// The parser owns the stream and moves its position. It is not meant to be shared
/// between threads; one parser handles one request body.
pub struct MultipartParser<R> {
    source: ByteSource<R>,
    boundary: Box<str>,
    scanner: BoundaryScanner,
    encoding: &'static Encoding,
    /// Where scanning resumes; reading a part body moves the stream elsewhere
    resume_at: u64,
    at_eof: bool,
    failed: bool,
    line: Vec<u8>,
}

impl<R> std::fmt::Debug for MultipartParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartParser")
            .field("boundary", &self.boundary)
            .field("encoding", &self.encoding.name())
            .field("resume_at", &self.resume_at)
            .field("at_eof", &self.at_eof)
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> MultipartParser<R> {
    /// Creates a parser positioned at the current position of `stream`.
    ///
    /// `boundary` is the token from the `boundary=` parameter, without the leading `--`.
    /// `encoding` is the request encoding; it is used to decode `filename` attributes.
    ///
    /// # Errors
    ///
    /// Returns [`MultipartError::InvalidBoundary`] for an empty or non-ASCII boundary and
    /// [`MultipartError::Io`] if the stream position can't be read.
    pub fn new(stream: R, boundary: &str, encoding: &'static Encoding) -> Result<Self, MultipartError> {
        ensure!(!boundary.is_empty(), MultipartError::invalid_boundary("boundary is empty"));
        ensure!(boundary.is_ascii(), MultipartError::invalid_boundary(format!("boundary {boundary:?} is not ascii")));

        let source = ByteSource::new(stream)?;
        let resume_at = source.position();

        Ok(Self {
            source,
            boundary: boundary.into(),
            scanner: BoundaryScanner::new(boundary.as_bytes()),
            encoding,
            resume_at,
            at_eof: false,
            failed: false,
            line: Vec::with_capacity(128),
        })
    }

    /// Reads the next part.
    ///
    /// Returns `Ok(None)` once the closing delimiter has been seen, or when the stream
    /// holds no further delimiter line at all. Calling again after that keeps returning
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`MultipartError::UnterminatedBody`] if the stream ends inside a part body, and
    /// [`MultipartError::Io`] for stream failures. Either way the body as a whole is
    /// invalid and no further parts should be accepted.
    pub fn read_next_element(&mut self) -> Result<Option<Part>, MultipartError> {
        if self.at_eof {
            return Ok(None);
        }

        self.source.set_position(self.resume_at)?;

        if !self.seek_delimiter_line()? {
            trace!("no further multipart delimiter");
            self.at_eof = true;
            self.resume_at = self.source.position();
            return Ok(None);
        }

        let headers = self.read_headers()?;

        let start = self.source.position();
        let Some(found) = self.scanner.scan(&mut self.source)? else {
            debug!(start, name = ?headers.name, "multipart body ended inside a part");
            self.at_eof = true;
            return Err(MultipartError::unterminated_body(start, headers.name));
        };

        if found.delimiter == Delimiter::Final {
            self.at_eof = true;
        }
        self.resume_at = self.source.position();

        let part = Part {
            name: headers.name,
            file_name: headers.file_name,
            content_type: headers.content_type,
            start,
            length: found.line_start - start,
        };

        trace!(name = ?part.name, file_name = ?part.file_name, start = part.start, length = part.length, "read multipart part");
        Ok(Some(part))
    }

    /// Copies the body of `part` out of the stream.
    ///
    /// The scan position is kept, so this may be called at any point, for any part.
    pub fn read_part(&mut self, part: &Part) -> Result<Vec<u8>, MultipartError> {
        let len = usize::try_from(part.length).map_err(|e| MultipartError::io(io::Error::new(ErrorKind::OutOfMemory, e)))?;

        let mut body = vec![0u8; len];
        self.source.set_position(part.start)?;
        let read = self.source.read_full(&mut body)?;
        ensure!(read == len, MultipartError::io(io::Error::from(ErrorKind::UnexpectedEof)));

        self.source.set_position(self.resume_at)?;
        Ok(body)
    }

    /// Returns a reader over the body of `part`.
    ///
    /// The reader borrows the parser; the next [`read_next_element`](Self::read_next_element)
    /// continues where scanning stopped, wherever the reader left the stream.
    pub fn part_reader(&mut self, part: &Part) -> Result<PartReader<'_, R>, MultipartError> {
        self.source.set_position(part.start)?;
        Ok(PartReader { source: &mut self.source, remaining: part.length })
    }

    /// The boundary token this parser looks for.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Gives back the stream, positioned where scanning stopped.
    pub fn into_inner(mut self) -> Result<R, MultipartError> {
        self.source.set_position(self.resume_at)?;
        Ok(self.source.into_inner()?)
    }

    /// Skips lines until a `--boundary` line. Returns false at end of stream.
    fn seek_delimiter_line(&mut self) -> io::Result<bool> {
        loop {
            if !self.source.read_line(&mut self.line)? {
                return Ok(false);
            }

            if self.line.is_empty() {
                continue;
            }

            if !self.line.starts_with(DELIMITER_PREFIX) {
                debug!(len = self.line.len(), "skipping multipart preamble line");
                continue;
            }

            if self.line.ends_with(self.boundary.as_bytes()) {
                return Ok(true);
            }

            // closing delimiter of an empty body, or a foreign delimiter
            debug!(len = self.line.len(), "skipping delimiter line without our boundary");
        }
    }

    fn read_headers(&mut self) -> io::Result<PartHeaders> {
        let mut headers = PartHeaders::default();
        while self.source.read_line(&mut self.line)? && !self.line.is_empty() {
            headers.apply_line(&self.line, self.encoding);
        }
        Ok(headers)
    }
}

impl<R: Read + Seek> Iterator for MultipartParser<R> {
    type Item = Result<Part, MultipartError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.read_next_element() {
            Ok(part) => part.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> FusedIterator for MultipartParser<R> {}

/// Bounded reader over one part body, see [`MultipartParser::part_reader`].
pub struct PartReader<'p, R> {
    source: &'p mut ByteSource<R>,
    remaining: u64,
}

impl<R> std::fmt::Debug for PartReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartReader").field("remaining", &self.remaining).finish_non_exhaustive()
    }
}

impl<R: Read + Seek> PartReader<'_, R> {
    /// Bytes of the part body not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read + Seek> Read for PartReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let limit = usize::try_from(self.remaining).map_or(buf.len(), |remaining| remaining.min(buf.len()));
        let read = self.source.read_full(&mut buf[..limit])?;
        if read == 0 {
            return Err(io::Error::from(ErrorKind::UnexpectedEof));
        }

        self.remaining -= read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use indoc::indoc;
    use std::io::Cursor;

    const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

    struct Fixture<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content_type: Option<&'a str>,
        body: &'a [u8],
    }

    fn build(parts: &[Fixture<'_>], boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part.file_name {
                Some(file_name) => out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n", part.name).as_bytes(),
                ),
                None => out.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes()),
            }
            if let Some(content_type) = part.content_type {
                out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        out
    }

    fn parser<'a>(data: &'a [u8], boundary: &str) -> MultipartParser<Cursor<&'a [u8]>> {
        MultipartParser::new(Cursor::new(data), boundary, UTF_8).unwrap()
    }

    fn slice<'a>(data: &'a [u8], part: &Part) -> &'a [u8] {
        &data[part.start() as usize..(part.start() + part.length()) as usize]
    }

    #[test]
    fn extracts_every_part_then_ends() {
        let fixtures = [
            Fixture { name: "title", file_name: None, content_type: None, body: b"Quarterly report" },
            Fixture { name: "empty", file_name: None, content_type: None, body: b"" },
            Fixture {
                name: "attachment",
                file_name: Some(r"C:\Users\bob\photo.jpg"),
                content_type: Some("image/jpeg"),
                body: &[0xff, 0xd8, 0xff, 0x00, b'\r', b'\n', 0x10, b'-', b'-'],
            },
            Fixture { name: "notes", file_name: Some("notes.txt"), content_type: Some("text/plain"), body: b"line one\r\nline two\n" },
        ];
        let data = build(&fixtures, BOUNDARY);

        let mut parser = parser(&data, BOUNDARY);
        for fixture in &fixtures {
            let part = parser.read_next_element().unwrap().expect("part expected");
            assert_eq!(part.name(), Some(fixture.name));
            assert_eq!(part.content_type(), fixture.content_type);
            assert_eq!(slice(&data, &part), fixture.body);
            assert_eq!(parser.read_part(&part).unwrap(), fixture.body);
        }

        assert!(parser.read_next_element().unwrap().is_none());
        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn file_names_lose_their_directories() {
        let fixtures = [
            Fixture { name: "a", file_name: Some(r"C:\Users\bob\photo.jpg"), content_type: None, body: b"1" },
            Fixture { name: "b", file_name: Some(r"\\server\share\x.png"), content_type: None, body: b"2" },
            Fixture { name: "c", file_name: Some("plain.txt"), content_type: None, body: b"3" },
        ];
        let data = build(&fixtures, BOUNDARY);

        let names: Vec<_> = parser(&data, BOUNDARY).map(|part| part.unwrap().file_name().map(str::to_owned)).collect();
        assert_eq!(names, [Some("photo.jpg".to_owned()), Some("x.png".to_owned()), Some("plain.txt".to_owned())]);
    }

    #[test]
    fn unterminated_body_is_an_error() {
        let data = build(&[Fixture { name: "first", file_name: None, content_type: None, body: b"complete" }], "xyz");
        // drop the closing delimiter, keep a second part that never ends
        let mut truncated = data[..data.len() - "--xyz--\r\n".len()].to_vec();
        truncated.extend_from_slice(b"--xyz\r\nContent-Disposition: form-data; name=\"second\"\r\n\r\npartial data");

        let mut parser = parser(&truncated, "xyz");
        let first = parser.read_next_element().unwrap().unwrap();
        assert_eq!(parser.read_part(&first).unwrap(), b"complete");

        match parser.read_next_element() {
            Err(MultipartError::UnterminatedBody { name, .. }) => assert_eq!(name.as_deref(), Some("second")),
            other => panic!("expected unterminated body, got {other:?}"),
        }
        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn iterator_stops_after_error() {
        let data = b"--xyz\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nnever closed";
        let results: Vec<_> = parser(data, "xyz").collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().is_err_and(MultipartError::is_unterminated));
    }

    #[test]
    fn boundary_text_inside_body_is_not_a_delimiter() {
        let body = b"binary--xyz data\r\nmore --xyz\r\n-- xyz\r\n--xyzzy\r\nend";
        let data = build(&[Fixture { name: "blob", file_name: Some("b.bin"), content_type: None, body }], "xyz");

        let mut parser = parser(&data, "xyz");
        let part = parser.read_next_element().unwrap().unwrap();
        assert_eq!(slice(&data, &part), body);
        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn body_edges_stay_in_the_part() {
        let data = b"--xyz\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\r\n\
            value\r\r\n\
            --xyz\r\n\
            Content-Disposition: form-data; name=\"b\"\r\n\r\n\
            one\r\n----xyz\r\ntwo\r\n\
            --xyz--\r\n";

        let mut parser = parser(data, "xyz");

        let first = parser.read_next_element().unwrap().unwrap();
        assert_eq!(slice(data, &first), b"value\r");

        let second = parser.read_next_element().unwrap().unwrap();
        assert_eq!(slice(data, &second), b"one\r\n----xyz\r\ntwo");

        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn accepts_bare_lf_and_preamble() {
        let data = indoc! {r#"
            This is the preamble, ignored by the parser.

            --xyz
            Content-Disposition: form-data; name="field"
            X-Unknown: dropped

            value
            --xyz
            Content-Disposition: form-data; name="other"
            Content-Type: text/plain

            second
            --xyz--
            epilogue
        "#};

        let mut parser = parser(data.as_bytes(), "xyz");

        let first = parser.read_next_element().unwrap().unwrap();
        assert_eq!(first.name(), Some("field"));
        assert_eq!(parser.read_part(&first).unwrap(), b"value");

        let second = parser.read_next_element().unwrap().unwrap();
        assert_eq!(second.name(), Some("other"));
        assert_eq!(second.content_type(), Some("text/plain"));
        assert_eq!(parser.read_part(&second).unwrap(), b"second");

        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn foreign_delimiter_lines_are_skipped() {
        let data = b"--other\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n--xyz\r\nContent-Disposition: form-data; name=\"y\"\r\n\r\nok\r\n--xyz--";

        let mut parser = parser(data, "xyz");
        let part = parser.read_next_element().unwrap().unwrap();
        assert_eq!(part.name(), Some("y"));
        assert_eq!(slice(data, &part), b"ok");
    }

    #[test]
    fn empty_and_delimiterless_bodies_have_no_parts() {
        assert!(parser(b"", "xyz").read_next_element().unwrap().is_none());
        assert!(parser(b"--xyz--\r\n", "xyz").read_next_element().unwrap().is_none());
        assert!(parser(b"just some text\r\n", "xyz").read_next_element().unwrap().is_none());
    }

    #[test]
    fn part_reader_is_bounded_and_scan_resumes() {
        let fixtures = [
            Fixture { name: "a", file_name: Some("a.txt"), content_type: None, body: b"first body" },
            Fixture { name: "b", file_name: Some("b.txt"), content_type: None, body: b"second body" },
        ];
        let data = build(&fixtures, "xyz");
        let mut parser = parser(&data, "xyz");

        let first = parser.read_next_element().unwrap().unwrap();
        {
            let mut reader = parser.part_reader(&first).unwrap();
            let mut head = [0u8; 5];
            reader.read_exact(&mut head).unwrap();
            assert_eq!(&head, b"first");
            assert_eq!(reader.remaining(), 5);
        }

        // stream was left mid-part, scanning still continues after the first part
        let second = parser.read_next_element().unwrap().unwrap();
        let mut body = Vec::new();
        parser.part_reader(&second).unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"second body");
        assert!(parser.read_next_element().unwrap().is_none());
    }

    #[test]
    fn parses_from_current_stream_offset() {
        let mut data = b"GARBAGE".to_vec();
        data.extend(build(&[Fixture { name: "n", file_name: None, content_type: None, body: b"v" }], "xyz"));

        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(7);
        let mut parser = MultipartParser::new(cursor, "xyz", UTF_8).unwrap();

        let part = parser.read_next_element().unwrap().unwrap();
        assert_eq!(slice(&data, &part), b"v");
        assert!(part.start() > 7);

        let cursor = parser.into_inner().unwrap();
        assert_eq!(cursor.position(), part.start() + part.length());
    }

    #[test]
    fn rejects_unusable_boundaries() {
        assert!(matches!(MultipartParser::new(Cursor::new(&b""[..]), "", UTF_8), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(MultipartParser::new(Cursor::new(&b""[..]), "b\u{e9}", UTF_8), Err(MultipartError::InvalidBoundary { .. })));
    }
}
