//! Quoted-span scanning for the line-oriented asset text formats.
//!
//! Config files, material definitions and shader `#package` directives all
//! carry their payloads between double quotes. These helpers pull quoted
//! spans out without allocating more than the caller asks for.

/// Returns the first `"..."` span in `s` (quotes excluded) together with the
/// byte offset just past its closing quote. `None` if no complete span exists.
pub fn quoted_span(s: &str) -> Option<(&str, usize)> {
    let open = s.find('"')?;
    let rest = &s[open + 1..];
    let close = rest.find('"')?;
    Some((&rest[..close], open + 1 + close + 1))
}

/// Pulls consecutive quoted spans off a line: `"KEY" "VALUE"` yields
/// `Some(("KEY", "VALUE"))`.
pub fn quoted_pair(line: &str) -> Option<(&str, &str)> {
    let (first, end) = quoted_span(line)?;
    let (second, _) = quoted_span(&line[end..])?;
    Some((first, second))
}

/// Case-insensitive lookup of `key` in an ordered name list, returning the
/// slot index. Names in the list are expected uppercase.
pub fn find_slot(key: &str, names: &[String]) -> Option<usize> {
    let upper = key.to_uppercase();
    names.iter().position(|n| *n == upper)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_span_extracts_first_span() {
        let (span, end) = quoted_span(r#"  "DRAW_DISTANCE" "100.0""#).unwrap();
        assert_eq!(span, "DRAW_DISTANCE");
        assert_eq!(&r#"  "DRAW_DISTANCE" "100.0""#[end..], r#" "100.0""#);
    }

    #[test]
    fn quoted_span_requires_closing_quote() {
        assert!(quoted_span(r#"no quotes here"#).is_none());
        assert!(quoted_span(r#"half "open"#).is_none());
    }

    #[test]
    fn quoted_pair_reads_key_and_value() {
        let (k, v) = quoted_pair(r#""GAMMA" "0.9""#).unwrap();
        assert_eq!(k, "GAMMA");
        assert_eq!(v, "0.9");
        assert!(quoted_pair(r#""ONLY_KEY""#).is_none());
    }

    #[test]
    fn find_slot_is_case_insensitive() {
        let names = vec!["GAMMA".to_string(), "DRAW_DISTANCE".to_string()];
        assert_eq!(find_slot("gamma", &names), Some(0));
        assert_eq!(find_slot("Draw_Distance", &names), Some(1));
        assert_eq!(find_slot("missing", &names), None);
    }
}
