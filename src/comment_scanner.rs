//! Single-pass comment extraction for the supported language families
//!
//! Every family shares the same lexical skeleton: a cursor walks the source
//! once, left to right, alternating between code mode and string mode. Only
//! the comment delimiters differ, so each family is described by a
//! [`CommentSyntax`] table and one engine scans them all.
//!
//! # Quoting rules
//!
//! - A string opens on `"` or `'` in code mode and closes only on the same
//!   character.
//! - Inside a string a backslash always skips itself and the next character.
//!   An escaped backslash right before the closing quote is therefore handled
//!   correctly, but no other escape semantics are modelled.
//! - Comment delimiters inside a string are inert.
//!
//! # Recovery
//!
//! Unterminated comments capture everything up to end-of-input. Unterminated
//! strings swallow the rest of the file. Neither is an error.
//!
//! The scan works on bytes. Every delimiter is ASCII, and ASCII bytes never
//! occur inside a multi-byte UTF-8 sequence, so a match always starts on a
//! character boundary and comment bodies can be sliced straight out of the
//! source text.

use crate::models::CommentFamily;

/// Comment delimiters for one language family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    /// Tokens opening a comment that runs to the end of the line
    pub line_openers: &'static [&'static str],
    /// `(open, close)` pairs for comments that may span lines
    pub block_delimiters: &'static [(&'static str, &'static str)],
    /// Block comments may only open before any code on the current line
    pub block_needs_fresh_line: bool,
}

impl CommentSyntax {
    fn block_opener_at(&self, rest: &[u8]) -> Option<(&'static str, &'static str)> {
        self.block_delimiters
            .iter()
            .copied()
            .find(|(open, _)| rest.starts_with(open.as_bytes()))
    }

    fn line_opener_at(&self, rest: &[u8]) -> Option<&'static str> {
        self.line_openers
            .iter()
            .copied()
            .find(|open| rest.starts_with(open.as_bytes()))
    }
}

/// C, Java, C++, JavaScript, Go and TypeScript
pub const C_LIKE_SYNTAX: CommentSyntax = CommentSyntax {
    line_openers: &["//"],
    block_delimiters: &[("/*", "*/")],
    block_needs_fresh_line: false,
};

pub const PHP_SYNTAX: CommentSyntax = CommentSyntax {
    line_openers: &["//", "#"],
    block_delimiters: &[("/*", "*/")],
    block_needs_fresh_line: false,
};

/// Python has no block comments; a triple-quoted string standing alone at
/// the start of a line is treated as one.
///
/// KNOWN GAP: a `"""` that follows code on the same line is not a comment and
/// falls through to plain quote handling, which lexes it as an empty `""`
/// string followed by a `"` string. The literal is not skipped as a unit, so
/// anything after its first embedded `"` is scanned as code again and may be
/// picked up as a comment. Extracted datasets depend on this behaviour; keep
/// it.
pub const PYTHON_SYNTAX: CommentSyntax = CommentSyntax {
    line_openers: &["#"],
    block_delimiters: &[("\"\"\"", "\"\"\"")],
    block_needs_fresh_line: true,
};

/// `=end` closes a block wherever it appears, even as the prefix of a
/// longer word such as `=ending`.
pub const RUBY_SYNTAX: CommentSyntax = CommentSyntax {
    line_openers: &["#"],
    block_delimiters: &[("=begin", "=end")],
    block_needs_fresh_line: false,
};

impl CommentFamily {
    /// Delimiter table for this family
    pub fn syntax(&self) -> &'static CommentSyntax {
        match self {
            CommentFamily::CLike => &C_LIKE_SYNTAX,
            CommentFamily::Php => &PHP_SYNTAX,
            CommentFamily::Python => &PYTHON_SYNTAX,
            CommentFamily::Ruby => &RUBY_SYNTAX,
        }
    }
}

/// Whitespace stripped from both ends of a comment body: Unicode whitespace
/// plus the ASCII separators U+001C..=U+001F, which `str::trim` keeps
fn is_strippable(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Cursor state for one scan call
#[derive(Debug, Default)]
struct ScanState {
    pos: usize,
    /// Quote byte that closes the string being skipped, if inside one
    terminator: Option<u8>,
    /// Non-blank code seen since the last line break (only consulted when
    /// `block_needs_fresh_line` is set)
    seen_code_on_line: bool,
}

/// Extract the trimmed comment bodies of `code`, in source order
pub fn scan(code: &str, family: CommentFamily) -> Vec<String> {
    scan_with(code, family.syntax())
}

/// Extract comments using an explicit delimiter table
pub fn scan_with(code: &str, syntax: &CommentSyntax) -> Vec<String> {
    let bytes = code.as_bytes();
    let mut comments = Vec::new();
    let mut state = ScanState::default();

    while state.pos < bytes.len() {
        let byte = bytes[state.pos];

        if let Some(terminator) = state.terminator {
            if byte == b'\\' {
                state.pos += 2;
            } else {
                if byte == terminator {
                    state.terminator = None;
                }
                state.pos += 1;
            }
            continue;
        }

        let rest = &bytes[state.pos..];
        let block_allowed = !(syntax.block_needs_fresh_line && state.seen_code_on_line);

        if let Some((open, close)) = syntax.block_opener_at(rest).filter(|_| block_allowed) {
            let start = state.pos + open.len();
            match code[start..].find(close) {
                Some(offset) => {
                    comments.push(code[start..start + offset].trim_matches(is_strippable).to_string());
                    state.pos = start + offset + close.len();
                }
                None => {
                    comments.push(code[start..].trim_matches(is_strippable).to_string());
                    state.pos = bytes.len();
                }
            }
        } else if let Some(open) = syntax.line_opener_at(rest) {
            let start = state.pos + open.len();
            let end = code[start..]
                .find('\n')
                .map_or(bytes.len(), |offset| start + offset);
            comments.push(code[start..end].trim_matches(is_strippable).to_string());
            // The newline itself is consumed in code mode and resets the line flag
            state.pos = end;
        } else {
            match byte {
                b'"' | b'\'' => {
                    state.terminator = Some(byte);
                    state.seen_code_on_line = true;
                }
                b'\n' => state.seen_code_on_line = false,
                b' ' | b'\t' => {}
                _ => state.seen_code_on_line = true,
            }
            state.pos += 1;
        }
    }

    comments
}
