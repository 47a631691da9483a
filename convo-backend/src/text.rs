//! Character-safe truncation used for previews and log lines

/// First `max` characters of `s`, never splitting a multi-byte character
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Like [`truncate_chars`] but appends `...` when anything was cut
pub fn ellipsize(s: &str, max: usize) -> String {
    let head = truncate_chars(s, max);
    if head.len() < s.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("abcdef", 3), "abc...");
        assert_eq!(ellipsize("abc", 3), "abc");
        assert_eq!(ellipsize("日本語テキスト", 3), "日本語...");
    }
}
