//! Request body plumbing for the gatehouse web runtime
//!
//! This crate turns `multipart/form-data` request bodies into parts, fields and posted
//! files. The parser works on any seekable byte stream and reports each part as a byte
//! range into that stream, so uploads are never copied while they are being parsed.
//!
//! # Features
//!
//! - Forward-only multipart parsing with a rolling boundary scan
//! - CRLF and bare LF line endings
//! - Windows client paths stripped from uploaded file names
//! - Legacy recovery of UTF-8 file names sent in raw header bytes
//! - Zero-copy posted files when the body is held in [`bytes::Bytes`]
//! - Truncated uploads rejected as a whole
//!
//! # Example
//!
//! ```no_run
//! use http::Request;
//! use http_body_util::Full;
//! use bytes::Bytes;
//! use gatehouse_http::form::FormData;
//! use gatehouse_http::protocol::FormError;
//!
//! async fn handle(request: Request<Full<Bytes>>) -> Result<(), FormError> {
//!     let form = FormData::from_request(request).await?;
//!
//!     for (name, value) in form.fields() {
//!         tracing::info!(%name, %value, "form field");
//!     }
//!     for (name, file) in form.files() {
//!         tracing::info!(%name, file_name = file.file_name(), size = file.len(), "posted file");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`multipart`]: the stream parser, [`multipart::MultipartParser`] and [`multipart::Part`]
//! - [`form`]: content type helpers and [`form::FormData`] built on top of the parser
//! - [`protocol`]: error types
//!
//! # Error Handling
//!
//! - [`protocol::MultipartError`]: parser errors; an unterminated body is the one fatal
//!   body condition
//! - [`protocol::FormError`]: request level errors while loading a form

pub mod form;
pub mod multipart;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
