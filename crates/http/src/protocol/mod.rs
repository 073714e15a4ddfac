//! Error types shared by the multipart parser and the form loader.
//!
//! - [`MultipartError`]: raised while scanning a multipart body. The only fatal body
//!   condition is [`MultipartError::UnterminatedBody`], which means the stream ended
//!   before a closing boundary and the whole body must be discarded.
//! - [`FormError`]: raised while turning an HTTP request into [`FormData`](crate::form::FormData).

mod error;
pub use error::FormError;
pub use error::MultipartError;
