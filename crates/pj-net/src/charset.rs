//! Response body decoding by declared charset.

use encoding_rs::Encoding;

/// Decodes an HTML or text body.
///
/// A `charset` in the first 8 KiB of an HTML document wins over the
/// `Content-Type` parameter; unknown labels fall back to lossy UTF-8.
pub fn decode_text(body: &[u8], content_type: &str) -> String {
    let encoding = detect_charset(body, content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    match encoding {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(body);
            decoded.into_owned()
        }
        None => String::from_utf8_lossy(body).into_owned(),
    }
}

fn detect_charset(body: &[u8], content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let is_html = lower.contains("text/html") || lower.contains("application/xhtml+xml");

    if is_html {
        if let Some(meta_charset) = charset_from_html_prefix(body) {
            return Some(meta_charset);
        }
    }

    charset_from_content_type(content_type)
}

pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches('"').trim_matches('\'');
        (!label.is_empty()).then(|| label.to_owned())
    })
}

fn charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix = String::from_utf8_lossy(&body[..body.len().min(8192)]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let charset_start = search_start
            .saturating_add(relative)
            .saturating_add("charset=".len());
        if let Some(label) = charset_label(&prefix[charset_start..]) {
            return Some(label);
        }
        search_start = charset_start;
    }

    None
}

fn charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        rest[..rest.find(first)?].trim()
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        trimmed[..end].trim()
    };

    (!label.is_empty()).then(|| label.to_owned())
}

#[cfg(test)]
mod tests {
    use super::charset_from_content_type;
    use super::decode_text;

    #[test]
    fn reads_content_type_parameter() {
        assert_eq!(
            charset_from_content_type("text/html; charset=\"Shift_JIS\""),
            Some("Shift_JIS".to_owned())
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }

    #[test]
    fn meta_charset_overrides_header() {
        let body = b"<meta charset=windows-1252><p>caf\xe9</p>";
        assert_eq!(
            decode_text(body, "text/html; charset=utf-8"),
            "<meta charset=windows-1252><p>caf\u{e9}</p>"
        );
    }

    #[test]
    fn falls_back_to_lossy_utf8() {
        assert_eq!(decode_text(b"ok \xff", "text/html"), "ok \u{fffd}");
    }
}
