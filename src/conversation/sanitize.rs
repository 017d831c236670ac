//! Text normalization for anything that ends up inside a prompt.

/// Escape quotes and newlines so the text stays on one transcript line.
///
/// Any run of backslashes in front of `"` or `n` collapses to a single escape,
/// and stray backslashes are dropped, so applying this to its own output is a
/// no-op. Carriage returns are removed.
pub fn sanitize(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                while chars.peek() == Some(&'\\') {
                    chars.next();
                }
                match chars.peek() {
                    Some('"') => {
                        chars.next();
                        sanitized.push_str("\\\"");
                    }
                    Some('n') => {
                        chars.next();
                        sanitized.push_str("\\n");
                    }
                    _ => {}
                }
            }
            '"' => sanitized.push_str("\\\""),
            '\n' => sanitized.push_str("\\n"),
            '\r' => {}
            other => sanitized.push(other),
        }
    }

    sanitized
}
