//! Reversible escaping between raw text and ICU message text.
//!
//! ICU uses apostrophes to quote syntax characters. `{` and `}` are always
//! special; `#` is special only inside a plural branch, where it stands for
//! the formatted plural argument. A run of special characters is wrapped in a
//! single quoted section, and apostrophes are doubled whenever they could
//! otherwise be read as the start or end of a quoted section.
//!
//! [`escape`] is total and [`unescape`] never fails: unmatched quotes are kept
//! literally, so `unescape(escape(s, p), p) == s` holds for every string.

fn is_special(c: char, is_plural: bool) -> bool {
    c == '{' || c == '}' || (is_plural && c == '#')
}

/// Escapes raw text so it can be embedded into an ICU message.
pub fn escape(raw: &str, is_plural: bool) -> String {
    escape_impl(raw, is_plural, false)
}

/// Like [`escape`], for text that is immediately followed by ICU syntax
/// (an argument or `#`), so a trailing apostrophe must not open a quote.
pub(crate) fn escape_before_syntax(raw: &str, is_plural: bool) -> String {
    escape_impl(raw, is_plural, true)
}

fn escape_impl(raw: &str, is_plural: bool, followed_by_syntax: bool) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 4);
    let mut in_quote = false;

    for (i, &c) in chars.iter().enumerate() {
        if is_special(c, is_plural) {
            if !in_quote {
                out.push('\'');
                in_quote = true;
            }
            out.push(c);
        } else if c == '\'' {
            let next = match chars.get(i + 1) {
                Some(&n) => Some(n),
                None if followed_by_syntax => Some('{'),
                None => None,
            };
            let ambiguous = matches!(next, Some(n) if n == '\'' || is_special(n, is_plural));
            if in_quote || ambiguous {
                out.push_str("''");
            } else {
                out.push('\'');
            }
        } else {
            if in_quote {
                out.push('\'');
                in_quote = false;
            }
            out.push(c);
        }
    }

    if in_quote {
        out.push('\'');
    }
    out
}

/// Removes ICU escaping from a piece of message text.
///
/// Only apostrophe quoting is interpreted; braces that are not quoted are
/// copied through unchanged.
pub fn unescape(text: &str, is_plural: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\'' {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();
        if next == Some('\'') {
            out.push('\'');
            i += 2;
        } else if in_quote {
            in_quote = false;
            i += 1;
        } else if matches!(next, Some(n) if is_special(n, is_plural)) {
            in_quote = true;
            i += 1;
        } else {
            out.push('\'');
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_two_way(raw: &str, is_plural: bool) {
        let escaped = escape(raw, is_plural);
        let unescaped = unescape(&escaped, is_plural);
        assert_eq!(
            unescaped, raw,
            "input: {raw:?}, escaped: {escaped:?}, plural: {is_plural}"
        );
    }

    #[test]
    fn test_two_way_pathological_inputs() {
        for raw in [
            "'What ' complex '' { string # ",
            "''",
            "'#'",
            "{}",
            "{aa}",
            "'{",
            "'{ }",
            "'{ }}",
            "{",
            "Another ''' more complex ' '{ string }' with many weird } cases '",
            "Another ''' more complex ' '{ string }' with many weird } cases '}",
            "{'}",
            "}''",
            "a''{",
        ] {
            assert_two_way(raw, false);
            assert_two_way(raw, true);
        }
    }

    #[test]
    fn test_plain_apostrophes_stay_readable() {
        assert_eq!(escape("It's fine", false), "It's fine");
        assert_eq!(escape("Hash # sign", false), "Hash # sign");
    }

    #[test]
    fn test_braces_are_quoted() {
        assert_eq!(escape("Hi {name}", false), "Hi '{'name'}'");
        assert_eq!(escape("{}", false), "'{}'");
    }

    #[test]
    fn test_hash_only_special_in_plural() {
        assert_eq!(escape("# items", true), "'#' items");
        assert_eq!(unescape("'#' items", true), "# items");
        assert_eq!(unescape("'#' items", false), "'#' items");
    }

    #[test]
    fn test_unescape_unterminated_quote_is_literal() {
        assert_eq!(unescape("'{ open", false), "{ open");
        assert_eq!(unescape("trailing '", false), "trailing '");
    }
}
