//! Escaping for text dropped into the Markdown report.

const LINK_SPECIAL: &[char] = &['[', ']', '(', ')'];

/// Backslash-escape `special` chars and flatten line breaks to spaces.
fn escape_inline(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' | '\r' => out.push(' '),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Article titles used as link text.
pub(crate) fn escape_md_link(s: &str) -> String {
    escape_inline(s, LINK_SPECIAL)
}

pub(crate) fn table_cell(s: &str) -> String {
    escape_inline(s, &['|'])
}

pub(crate) fn sanitize_heading(s: &str) -> String {
    escape_inline(s, &[])
}
