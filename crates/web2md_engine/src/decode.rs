use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use web2md_logging::{engine_trace, engine_warn};

/// Bytes inspected when deciding whether a payload is binary.
const BINARY_SNIFF_LEN: usize = 1024;

/// Page text converted to UTF-8, with the encoding it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
    /// Malformed sequences were replaced with U+FFFD.
    pub lossy: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not text (NUL byte at offset {offset})")]
    BinaryPayload { offset: usize },
}

/// Decodes a response body to UTF-8.
///
/// The encoding comes from a byte order mark, then the `charset` parameter of
/// `content_type`, then statistical detection. Bodies with a NUL byte near
/// the start and no BOM are rejected as binary. Malformed sequences are
/// replaced rather than failing the page.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedHtml, DecodeError> {
    let encoding = match Encoding::for_bom(bytes) {
        // UTF-16 text legitimately contains NUL bytes.
        Some((encoding, _)) => encoding,
        None => {
            reject_binary(bytes)?;
            declared_encoding(content_type).unwrap_or_else(|| detect_encoding(bytes))
        }
    };
    engine_trace!("Decoding {} bytes as {}", bytes.len(), encoding.name());

    let (text, _, lossy) = encoding.decode(bytes);
    if lossy {
        engine_warn!(
            "Page is not valid {}; malformed bytes were replaced",
            encoding.name()
        );
    }
    Ok(DecodedHtml {
        html: text.into_owned(),
        encoding_label: encoding.name().to_string(),
        lossy,
    })
}

fn reject_binary(bytes: &[u8]) -> Result<(), DecodeError> {
    match bytes.iter().take(BINARY_SNIFF_LEN).position(|b| *b == 0) {
        Some(offset) => Err(DecodeError::BinaryPayload { offset }),
        None => Ok(()),
    }
}

fn declared_encoding(content_type: Option<&str>) -> Option<&'static Encoding> {
    let label = charset_param(content_type?)?;
    Encoding::for_label(label.as_bytes())
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Value of the `charset` parameter, case-insensitive and unquoted.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn charset_parameter_is_case_insensitive_and_unquoted() {
        assert_eq!(charset_param("text/html; Charset=\"Shift_JIS\""), Some("Shift_JIS"));
        assert_eq!(charset_param("text/html"), None);
    }

    #[test]
    fn nul_bytes_mark_binary_payloads() {
        let bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert_eq!(
            decode_html(bytes, Some("text/html")),
            Err(DecodeError::BinaryPayload { offset: 8 })
        );
    }

    #[test]
    fn utf16_with_bom_is_not_binary() {
        let bytes = b"\xff\xfeh\x00i\x00";
        let decoded = decode_html(bytes, None).unwrap();
        assert_eq!(decoded.html, "hi");
        assert_eq!(decoded.encoding_label, "UTF-16LE");
    }

    #[test]
    fn stray_latin1_byte_in_utf8_page_is_replaced() {
        let bytes = b"<p>caf\xe9 is fine</p>";
        let decoded = decode_html(bytes, Some("text/html; charset=utf-8")).unwrap();
        assert_eq!(decoded.html, "<p>caf\u{FFFD} is fine</p>");
        assert_eq!(decoded.encoding_label, "UTF-8");
        assert!(decoded.lossy);
    }

    #[test]
    fn undeclared_charset_is_detected() {
        let decoded = decode_html("plain ascii text".as_bytes(), None).unwrap();
        assert_eq!(decoded.html, "plain ascii text");
        assert!(!decoded.lossy);
    }
}
