//! Escaping for values that reach rendered template output.

/// Escape a string for inclusion inside a double-quoted HCL literal.
///
/// Backslashes, quotes, and newlines are escaped, and `${` is broken up so
/// user input can never become an interpolation.
pub fn escape_hcl(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push_str("$${");
            }
            other => out.push(other),
        }
    }
    out
}

/// Reduce a user-supplied name to a URL- and scheduler-safe slug:
/// lowercase alphanumerics and dashes, no leading/trailing dash.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' => out.push(c),
            'A'..='Z' => out.push(c.to_ascii_lowercase()),
            '-' | '_' | ' ' | '.' => out.push('-'),
            _ => {}
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(escape_hcl(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_hcl(r"a\b"), r"a\\b");
        assert_eq!(escape_hcl("line1\nline2"), "line1\\nline2");
    }

    #[test]
    fn interpolation_cannot_be_injected() {
        assert_eq!(escape_hcl("${env.SECRET}"), "$${env.SECRET}");
        assert_eq!(escape_hcl("price is $5"), "price is $5");
    }

    #[test]
    fn names_become_url_safe_slugs() {
        assert_eq!(sanitize_name("My App"), "my-app");
        assert_eq!(sanitize_name("search_v2.1"), "search-v2-1");
        assert_eq!(sanitize_name("--weird--"), "weird");
        assert_eq!(sanitize_name("héllo!"), "hllo");
    }
}
