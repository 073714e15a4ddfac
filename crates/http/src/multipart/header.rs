//! Part header block parsing.
//!
//! Header lines are taken one byte per character, the way browsers' raw header bytes
//! reach the server. Only two headers matter: `Content-Disposition` for the `name` and
//! `filename` attributes, and `Content-Type`. Everything else, including lines that look
//! like neither, is ignored.

use encoding_rs::Encoding;

const CONTENT_DISPOSITION: &[u8] = b"content-disposition:";
const CONTENT_TYPE: &[u8] = b"content-type:";

/// The headers of one part that survive parsing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct PartHeaders {
    pub(crate) name: Option<String>,
    pub(crate) file_name: Option<String>,
    pub(crate) content_type: Option<String>,
}

impl PartHeaders {
    /// Folds one raw header line into the collected headers.
    pub(crate) fn apply_line(&mut self, line: &[u8], encoding: &'static Encoding) {
        if let Some(value) = strip_prefix_ignore_case(line, CONTENT_DISPOSITION) {
            self.name = attribute(value, b"name=\"").map(latin1);
            self.file_name = attribute(value, b"filename=\"").map(|raw| strip_path(decode(encoding, raw)));
        } else if let Some(value) = strip_prefix_ignore_case(line, CONTENT_TYPE) {
            self.content_type = Some(latin1(value).trim().to_owned());
        }
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

/// Value of a quoted attribute, located by the first occurrence of `needle` (`name="`).
///
/// The value runs up to the next `"`; without a closing quote there is no value. The
/// first occurrence wins, so `name="` also matches inside `filename="` when the filename
/// comes first.
fn attribute<'a>(value: &'a [u8], needle: &[u8]) -> Option<&'a [u8]> {
    let index = value.windows(needle.len()).position(|window| window == needle)?;
    let begin = index + needle.len();
    let len = value[begin..].iter().position(|&b| b == b'"')?;
    Some(&value[begin..begin + len])
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decodes raw header bytes under the request encoding.
///
/// Clients send UTF-8 file names in headers that are read byte by byte; decoding the
/// raw bytes again recovers the intended name.
fn decode(encoding: &'static Encoding, bytes: &[u8]) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Drops the client-side directory from a Windows path.
///
/// Only drive-letter paths (`C:\...`) and UNC paths (`\\server\...`) are stripped; the
/// result is whatever follows the last backslash. Other names are returned untouched.
pub(crate) fn strip_path(path: String) -> String {
    let has_drive = path.find(":\\") == Some(1);
    if !has_drive && !path.starts_with("\\\\") {
        return path;
    }

    match path.rfind('\\') {
        Some(index) => path[index + 1..].to_owned(),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    fn headers(lines: &[&[u8]]) -> PartHeaders {
        let mut headers = PartHeaders::default();
        for line in lines {
            headers.apply_line(line, UTF_8);
        }
        headers
    }

    #[test]
    fn strips_windows_directories() {
        assert_eq!(strip_path(r"C:\Users\bob\photo.jpg".to_owned()), "photo.jpg");
        assert_eq!(strip_path(r"\\server\share\x.png".to_owned()), "x.png");
        assert_eq!(strip_path("plain.txt".to_owned()), "plain.txt");
        assert_eq!(strip_path(String::new()), "");
    }

    #[test]
    fn keeps_paths_that_are_not_windows_absolute() {
        assert_eq!(strip_path(r"dir\file.txt".to_owned()), r"dir\file.txt");
        assert_eq!(strip_path("/home/bob/file.txt".to_owned()), "/home/bob/file.txt");
        assert_eq!(strip_path(r"C:\".to_owned()), "");
    }

    #[test]
    fn reads_content_disposition_attributes() {
        let headers = headers(&[br#"Content-Disposition: form-data; name="upload"; filename="C:\tmp\a.txt""#]);
        assert_eq!(headers.name.as_deref(), Some("upload"));
        assert_eq!(headers.file_name.as_deref(), Some("a.txt"));
        assert_eq!(headers.content_type, None);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let headers = headers(&[br#"content-DISPOSITION: form-data; name="field""#, b"CONTENT-TYPE:   text/plain; charset=utf-8  "]);
        assert_eq!(headers.name.as_deref(), Some("field"));
        assert_eq!(headers.file_name, None);
        assert_eq!(headers.content_type.as_deref(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn missing_or_unclosed_attributes() {
        let headers = headers(&[br#"Content-Disposition: form-data; name=""; filename="broken"#]);
        assert_eq!(headers.name.as_deref(), Some(""));
        assert_eq!(headers.file_name, None);
    }

    #[test]
    fn first_name_occurrence_wins() {
        let headers = headers(&[br#"Content-Disposition: form-data; filename="f.bin"; name="field""#]);
        assert_eq!(headers.name.as_deref(), Some("f.bin"));
        assert_eq!(headers.file_name.as_deref(), Some("f.bin"));
    }

    #[test]
    fn unrelated_and_malformed_lines_are_ignored() {
        let headers = headers(&[b"X-Custom: 1", b"garbage without colon", b"Content-Disposition"]);
        assert_eq!(headers, PartHeaders::default());
    }

    #[test]
    fn file_name_is_decoded_with_request_encoding() {
        // "résumé.pdf" as UTF-8 bytes
        let line = "Content-Disposition: form-data; name=\"cv\"; filename=\"r\u{e9}sum\u{e9}.pdf\"".as_bytes();

        let mut utf8 = PartHeaders::default();
        utf8.apply_line(line, UTF_8);
        assert_eq!(utf8.file_name.as_deref(), Some("r\u{e9}sum\u{e9}.pdf"));

        let mut latin = PartHeaders::default();
        latin.apply_line(line, WINDOWS_1252);
        assert_eq!(latin.file_name.as_deref(), Some("r\u{c3}\u{a9}sum\u{c3}\u{a9}.pdf"));
    }

    #[test]
    fn name_stays_byte_per_char() {
        let line = "Content-Disposition: form-data; name=\"\u{e9}\"".as_bytes();
        let headers = headers(&[line]);
        assert_eq!(headers.name.as_deref(), Some("\u{c3}\u{a9}"));
    }
}
