use std::io;
use thiserror::Error;

/// Errors raised while walking a `multipart/form-data` body.
///
/// A malformed header line inside a part is not an error: it is skipped while the
/// header block is parsed and never reaches the caller.
#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("multipart body ended before a closing boundary, part started at offset {start}")]
    UnterminatedBody { start: u64, name: Option<String> },

    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl MultipartError {
    pub fn unterminated_body(start: u64, name: Option<String>) -> Self {
        Self::UnterminatedBody { start, name }
    }

    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if the body was cut off before its closing boundary.
    #[inline]
    pub fn is_unterminated(&self) -> bool {
        matches!(self, MultipartError::UnterminatedBody { .. })
    }
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("request content type is not multipart/form-data")]
    NotMultipart,

    #[error("multipart/form-data content type has no boundary parameter")]
    MissingBoundary,

    #[error("invalid content type: {reason}")]
    InvalidContentType { reason: String },

    #[error("can't read request body: {reason}")]
    Body { reason: String },

    #[error("multipart error: {source}")]
    Multipart {
        #[from]
        source: MultipartError,
    },
}

impl FormError {
    pub fn invalid_content_type<S: ToString>(str: S) -> Self {
        Self::InvalidContentType { reason: str.to_string() }
    }

    pub fn body<S: ToString>(str: S) -> Self {
        Self::Body { reason: str.to_string() }
    }
}
