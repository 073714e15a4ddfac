//! Form loading on top of the multipart parser.
//!
//! [`FormData`] splits a `multipart/form-data` body into plain form fields and posted
//! files. Parts without a `filename` become fields whose value is decoded with the request
//! encoding; parts with a `filename` become [`PostedFile`]s that share the request body
//! buffer instead of copying it.
//!
//! A body that fails to parse is rejected as a whole: no fields or files from a
//! truncated upload are ever exposed.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use gatehouse_http::form::FormData;
//!
//! let body = Bytes::from_static(
//!     b"--xyz\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
//!       --xyz\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
//!       Content-Type: text/plain\r\n\r\nfile body\r\n--xyz--\r\n",
//! );
//!
//! let form = FormData::parse(body, "xyz", encoding_rs::UTF_8).unwrap();
//! assert_eq!(form.field("title"), Some("hello"));
//! assert_eq!(form.file("doc").unwrap().data().as_ref(), b"file body");
//! ```

mod content_type;

pub use content_type::is_multipart_form;
pub use content_type::multipart_boundary;
pub use content_type::request_encoding;

use std::fmt::Display;
use std::io::{self, Cursor, ErrorKind};
use std::ops::Range;

use bytes::Bytes;
use encoding_rs::Encoding;
use http::Request;
use http::header::CONTENT_TYPE;
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{debug, trace};

use crate::multipart::{MultipartParser, Part};
use crate::protocol::{FormError, MultipartError};

/// An uploaded file: a part of the body that carried a `filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

impl PostedFile {
    /// The client file name, without directories.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The file content, a view into the request body.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// Fields and files of a `multipart/form-data` body, in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<(String, PostedFile)>,
}

impl FormData {
    /// Parses a complete multipart body.
    ///
    /// Field values are decoded with `encoding`, as are file names. A part without a
    /// `name` is stored under the empty name.
    ///
    /// # Errors
    ///
    /// Any [`MultipartError`], most notably an unterminated body, rejects the whole form.
    pub fn parse(body: Bytes, boundary: &str, encoding: &'static Encoding) -> Result<Self, FormError> {
        let parser = MultipartParser::new(Cursor::new(body.clone()), boundary, encoding)?;

        let mut form = FormData::default();
        for part in parser {
            let part = part?;
            let data = body.slice(part_range(&part)?);
            form.push(part, data, encoding);
        }

        trace!(fields = form.fields.len(), files = form.files.len(), "parsed multipart form");
        Ok(form)
    }

    /// Reads and parses the body of a `multipart/form-data` request.
    ///
    /// The boundary and the encoding come from the request's `Content-Type`.
    pub async fn from_request<B>(request: Request<B>) -> Result<Self, FormError>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = request.into_parts();

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .ok_or(FormError::NotMultipart)?
            .to_str()
            .map_err(FormError::invalid_content_type)?;

        let boundary = multipart_boundary(content_type)?;
        let encoding = request_encoding(content_type);

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(cause = %e, "can't read multipart request body");
                return Err(FormError::body(e));
            }
        };

        Self::parse(bytes, &boundary, encoding)
    }

    /// First value of the field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// First file posted under `name`.
    pub fn file(&self, name: &str) -> Option<&PostedFile> {
        self.files.iter().find(|(key, _)| key == name).map(|(_, file)| file)
    }

    pub fn files(&self) -> &[(String, PostedFile)] {
        &self.files
    }

    fn push(&mut self, part: Part, data: Bytes, encoding: &'static Encoding) {
        let name = part.name().unwrap_or_default().to_owned();
        match part.file_name() {
            Some(file_name) => {
                let file = PostedFile { file_name: file_name.to_owned(), content_type: part.content_type().map(str::to_owned), data };
                self.files.push((name, file));
            }
            None => {
                let value = encoding.decode_without_bom_handling(&data).0.into_owned();
                self.fields.push((name, value));
            }
        }
    }
}

fn part_range(part: &Part) -> Result<Range<usize>, MultipartError> {
    let range = part.range();
    let offset = |value: u64| usize::try_from(value).map_err(|e| MultipartError::io(io::Error::new(ErrorKind::InvalidData, e)));
    Ok(offset(range.start)?..offset(range.end)?)
}
