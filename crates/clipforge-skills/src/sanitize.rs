//! Escaping of dynamic strings before filter-graph interpolation.
//!
//! ffmpeg's filter grammar treats `:` as an option separator, `,` as a
//! chain separator, `'` as a quote, `\` as the escape character, and
//! `%` as a drawtext expansion marker. Any model-supplied string that
//! reaches a filter expression goes through [`escape_filter_value`]
//! first, regardless of its semantic role; expression-looking values
//! are exactly where injection happens.
//!
//! Escaping is applied at emission time, not at normalization, so code
//! that needs the raw coerced value still has access to it.

/// Escape a string for safe embedding in a filter-graph expression.
///
/// The backslash is escaped in the same pass as the other characters,
/// which is what makes the order safe: an inserted escape is never
/// itself re-escaped.
pub fn escape_filter_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' | ':' | '\'' | ',' | '%' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_filter_value`] under the filter grammar: resolve
/// `\x` escape pairs back to their literal character.
///
/// This is how the target grammar reads the escaped text; it exists so
/// the round-trip property is checkable, not for production use.
pub fn unescape_filter_value(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_each_special_character() {
        assert_eq!(escape_filter_value("a:b"), "a\\:b");
        assert_eq!(escape_filter_value("a,b"), "a\\,b");
        assert_eq!(escape_filter_value("it's"), "it\\'s");
        assert_eq!(escape_filter_value("a\\b"), "a\\\\b");
        assert_eq!(escape_filter_value("100%"), "100\\%");
        assert_eq!(escape_filter_value("plain text"), "plain text");
    }

    #[test]
    fn backslash_is_not_double_escaped() {
        // A raw `\:` must become `\\\:` (escaped backslash, escaped colon),
        // not `\\\\:` or `\:`.
        assert_eq!(escape_filter_value("\\:"), "\\\\\\:");
    }

    #[test]
    fn round_trips_to_literal_content() {
        let cases = [
            "a:b,c'd",
            "50%:1080",
            "C:\\media\\clip.mp4",
            "x='t*2',y=0:enable",
            "",
            "no specials here",
        ];
        for raw in cases {
            let escaped = escape_filter_value(raw);
            assert_eq!(unescape_filter_value(&escaped), raw, "raw: {raw}");
            // The escaped form contains no unescaped delimiter.
            let mut prev_backslash = false;
            for c in escaped.chars() {
                if !prev_backslash {
                    assert!(
                        !matches!(c, ':' | ',' | '\'' | '%'),
                        "unescaped delimiter {c:?} in {escaped:?}"
                    );
                }
                prev_backslash = c == '\\' && !prev_backslash;
            }
        }
    }
}
