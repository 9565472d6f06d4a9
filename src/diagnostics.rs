//! Source diagnostics: byte-to-line/col mapping and human-readable error rendering.

use crate::error::Error;

/// Converts a byte offset within `source` to a 1-based `(line, col)` pair.
///
/// # Examples
/// ```text
/// "abc\ndef\n", byte 4  -> (2, 1)   // 'd' is first char of line 2
/// "hello",     byte 2  -> (1, 3)   // 'l' at column 3 on line 1
/// ```
pub fn byte_to_line_col(source: &str, byte: u32) -> (u32, u32) {
    let byte = byte as usize;
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, ch) in source.char_indices() {
        if i == byte {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Renders a rustc-style diagnostic for `err`, with a source excerpt and caret.
///
/// ```text
/// error[E0101]: [resolve error] 'f' expects 1 argument(s) but was called with 2
///  --> 3:5
///   |
/// 3 | y = f(1, 2);
///   |     ^^^^^^^
/// ```
pub fn render_error(source: &str, err: &Error) -> String {
    let mut out = format!("error[{}]: {}\n", err.diagnostic_code(), err);

    if let Some(span) = err.span() {
        let (line, col) = byte_to_line_col(source, span.start.0);
        let source_line = source.lines().nth((line - 1) as usize).unwrap_or("");

        // Underline the span, clipped to the first line it touches.
        let indent = (col as usize).saturating_sub(1);
        let room = source_line.chars().count().saturating_sub(indent).max(1);
        let width = (span.end.0.saturating_sub(span.start.0) as usize).clamp(1, room);
        let pointer = format!("{}{}", " ".repeat(indent), "^".repeat(width));
        let line_num = line.to_string();
        let gutter = " ".repeat(line_num.len());

        out.push_str(&format!(" --> {}:{}\n", line, col));
        out.push_str(&format!("{}  |\n", gutter));
        out.push_str(&format!("{} | {}\n", line_num, source_line));
        out.push_str(&format!("{}  | {}\n", gutter, pointer));
    }

    out
}
