//! Last path segment of a URL.

/// Returns the last non-empty path segment of `url`, percent-decoded, ignoring
/// query and fragment. A segment that does not decode to UTF-8 is returned as is.
///
/// `None` if the URL does not parse, has no path, or ends in `.`/`..`.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment).unwrap_or_else(|| segment.to_string());
    match decoded.as_str() {
        "." | ".." => None,
        _ => Some(decoded),
    }
}

/// Decodes `%XX` escapes. Malformed escapes are kept literally; `None` when the
/// decoded bytes are not UTF-8.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_path() {
        assert_eq!(
            last_path_segment("https://example.com/a/b/file.deb").as_deref(),
            Some("file.deb")
        );
    }

    #[test]
    fn trailing_slash_uses_previous_segment() {
        assert_eq!(
            last_path_segment("https://example.com/dir/").as_deref(),
            Some("dir")
        );
    }

    #[test]
    fn root_has_no_segment() {
        assert_eq!(last_path_segment("https://example.com/"), None);
        assert_eq!(last_path_segment("https://example.com"), None);
    }

    #[test]
    fn query_is_ignored() {
        assert_eq!(
            last_path_segment("https://example.com/file.zip?token=abc#frag").as_deref(),
            Some("file.zip")
        );
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(
            last_path_segment("https://example.com/files/my%20report%C3%A9.pdf").as_deref(),
            Some("my reporté.pdf")
        );
        assert_eq!(
            last_path_segment("https://example.com/100%25.txt").as_deref(),
            Some("100%.txt")
        );
    }

    #[test]
    fn undecodable_segment_is_kept_raw() {
        assert_eq!(
            last_path_segment("https://example.com/bad%FF.bin").as_deref(),
            Some("bad%FF.bin")
        );
        assert_eq!(percent_decode("50%zz"), Some("50%zz".to_string()));
    }
}
