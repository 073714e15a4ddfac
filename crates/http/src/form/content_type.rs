//! `Content-Type` helpers for multipart requests.

use encoding_rs::{Encoding, UTF_8};
use mime::Mime;

use crate::protocol::FormError;

/// Returns true if `content_type` is `multipart/form-data`, with or without parameters.
pub fn is_multipart_form(content_type: &str) -> bool {
    content_type.parse::<Mime>().is_ok_and(|media_type| is_form_data(&media_type))
}

/// Extracts the `boundary` parameter of a `multipart/form-data` content type.
///
/// Surrounding quotes are removed; the returned token does not start with `--`.
///
/// # Errors
///
/// - [`FormError::InvalidContentType`] if the value does not parse as a media type
/// - [`FormError::NotMultipart`] for any other media type
/// - [`FormError::MissingBoundary`] if the parameter is absent or empty
pub fn multipart_boundary(content_type: &str) -> Result<String, FormError> {
    let media_type = content_type.parse::<Mime>().map_err(FormError::invalid_content_type)?;
    if !is_form_data(&media_type) {
        return Err(FormError::NotMultipart);
    }

    media_type
        .get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().trim_matches('"'))
        .filter(|boundary| !boundary.is_empty())
        .map(str::to_owned)
        .ok_or(FormError::MissingBoundary)
}

/// Resolves the `charset` parameter to an encoding, UTF-8 when absent or unknown.
pub fn request_encoding(content_type: &str) -> &'static Encoding {
    content_type
        .parse::<Mime>()
        .ok()
        .and_then(|media_type| {
            media_type.get_param(mime::CHARSET).and_then(|charset| Encoding::for_label(charset.as_str().trim_matches('"').as_bytes()))
        })
        .unwrap_or(UTF_8)
}

fn is_form_data(media_type: &Mime) -> bool {
    media_type.type_() == mime::MULTIPART && media_type.subtype() == mime::FORM_DATA
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{SHIFT_JIS, WINDOWS_1252};

    #[test]
    fn extracts_boundary() {
        let boundary = multipart_boundary("multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW").unwrap();
        assert_eq!(boundary, "----WebKitFormBoundary7MA4YWxkTrZu0gW");

        let quoted = multipart_boundary(r#"multipart/form-data; charset=utf-8; boundary="simple-boundary""#).unwrap();
        assert_eq!(quoted, "simple-boundary");
    }

    #[test]
    fn rejects_other_types_and_missing_boundary() {
        assert!(matches!(multipart_boundary("application/x-www-form-urlencoded"), Err(FormError::NotMultipart)));
        assert!(matches!(multipart_boundary("multipart/mixed; boundary=abc"), Err(FormError::NotMultipart)));
        assert!(matches!(multipart_boundary("multipart/form-data"), Err(FormError::MissingBoundary)));
        assert!(matches!(multipart_boundary("not a mime"), Err(FormError::InvalidContentType { .. })));
    }

    #[test]
    fn detects_multipart_form() {
        assert!(is_multipart_form("multipart/form-data; boundary=x"));
        assert!(is_multipart_form("multipart/form-data"));
        assert!(!is_multipart_form("text/plain"));
        assert!(!is_multipart_form(""));
    }

    #[test]
    fn resolves_request_encoding() {
        assert_eq!(request_encoding("multipart/form-data; boundary=x"), UTF_8);
        assert_eq!(request_encoding("multipart/form-data; charset=iso-8859-1; boundary=x"), WINDOWS_1252);
        assert_eq!(request_encoding("multipart/form-data; charset=Shift_JIS; boundary=x"), SHIFT_JIS);
        assert_eq!(request_encoding("multipart/form-data; charset=unknown-charset"), UTF_8);
        assert_eq!(request_encoding("garbage"), UTF_8);
    }
}
