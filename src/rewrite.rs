//! Multi-row INSERT/REPLACE batching.
//!
//! `executemany` on a statement shaped like
//!
//! ```text
//! INSERT|REPLACE ... INTO target (cols) VALUES (row-template) trailing
//! ```
//!
//! sends one statement carrying every row instead of one statement per
//! parameter set. The trailing clause (for example
//! `ON DUPLICATE KEY UPDATE ...`) is appended once, after the last row.

use crate::error::Result;
use crate::format::{Piece, format_into, scan};
use crate::params::Params;

/// Default upper bound for one rewritten statement, in bytes.
pub const DEFAULT_MAX_STATEMENT_LENGTH: usize = 1_024_000;

/// A statement split around its single-row `VALUES` template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertValues<'a> {
    /// Everything from `INSERT`/`REPLACE` up to the row template, including
    /// the `VALUES` keyword and any whitespace after it.
    pub prefix: &'a str,
    /// The row template, `(` through `)`.
    pub values: &'a str,
    /// Text after the row template. Empty when there is none, never absent.
    pub postfix: &'a str,
}

impl<'a> InsertValues<'a> {
    /// Match `sql` against the batchable statement shape.
    ///
    /// Returns `None` when batching does not apply.
    pub fn parse(sql: &'a str) -> Option<Self> {
        let bytes = sql.as_bytes();
        let start = bytes.iter().position(|b| !b.is_ascii_whitespace())?;
        let keyword_end = match_keyword(bytes, start, b"INSERT")
            .or_else(|| match_keyword(bytes, start, b"REPLACE"))?;

        let into = find_keyword(bytes, keyword_end, b"INTO")?;

        // `...VALUES(` may occur several times (ON DUPLICATE KEY UPDATE
        // a=VALUES(a)); the row template belongs to the last occurrence
        // whose remainder still matches.
        let mut candidates = values_keywords(bytes, keyword_end);
        while let Some((values_start, values_end)) = candidates.pop() {
            if into >= values_start || !ends_with_columns(&bytes[keyword_end..values_start]) {
                continue;
            }
            let template_start = skip_whitespace(bytes, values_end);
            let Some(template_end) = match_row_template(bytes, template_start) else {
                continue;
            };
            let postfix = trim_postfix(&sql[template_end..]);
            // A trailing clause is copied once per statement, so it must
            // not consume parameters.
            if has_placeholder(postfix) {
                return None;
            }
            return Some(Self {
                prefix: &sql[start..template_start],
                values: &sql[template_start..template_end],
                postfix,
            });
        }
        None
    }

    /// Render one statement per chunk of `param_sets`.
    ///
    /// Rows are joined with `,`. A new statement starts whenever appending
    /// the next row would exceed `max_len`. The prefix is `%`-unescaped, the
    /// postfix is appended verbatim.
    pub fn render(
        &self,
        param_sets: &[Params],
        max_len: usize,
        no_backslash_escapes: bool,
    ) -> Result<Vec<Vec<u8>>> {
        // `()` renders the template with no arguments rather than verbatim,
        // so a row template with placeholders fails before anything is sent.
        let empty = Params::Positional(Vec::new());

        let mut prefix = Vec::with_capacity(self.prefix.len());
        format_into(&mut prefix, self.prefix, &empty, no_backslash_escapes)?;
        let postfix = self.postfix.as_bytes();

        let mut statements = Vec::new();
        let mut iter = param_sets.iter();
        let Some(first) = iter.next() else {
            return Ok(statements);
        };

        let mut sql = prefix.clone();
        format_into(&mut sql, self.values, row_params(first, &empty), no_backslash_escapes)?;

        let mut row = Vec::new();
        for params in iter {
            row.clear();
            format_into(&mut row, self.values, row_params(params, &empty), no_backslash_escapes)?;
            if sql.len() + row.len() + postfix.len() + 1 > max_len {
                sql.extend_from_slice(postfix);
                statements.push(std::mem::replace(&mut sql, prefix.clone()));
            } else {
                sql.push(b',');
            }
            sql.extend_from_slice(&row);
        }
        sql.extend_from_slice(postfix);
        statements.push(sql);
        Ok(statements)
    }
}

fn row_params<'p>(params: &'p Params, empty: &'p Params) -> &'p Params {
    match params {
        Params::None => empty,
        params => params,
    }
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

/// Case-insensitive keyword at `pos`, followed by a word boundary.
fn match_keyword(bytes: &[u8], pos: usize, keyword: &[u8]) -> Option<usize> {
    let end = pos + keyword.len();
    let candidate = bytes.get(pos..end)?;
    if !candidate.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if bytes.get(end).copied().is_some_and(is_word) {
        return None;
    }
    Some(end)
}

/// Every `VALUE`/`VALUES` keyword after `from`, as `(start, end)` pairs in
/// order of appearance.
fn values_keywords(bytes: &[u8], from: usize) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    // At least one character between the statement keyword and VALUES.
    let mut pos = from + 1;
    while pos < bytes.len() {
        let boundary_before = !is_word(bytes[pos - 1]);
        if boundary_before {
            let end = match_keyword(bytes, pos, b"VALUES")
                .or_else(|| match_keyword(bytes, pos, b"VALUE"));
            if let Some(end) = end {
                found.push((pos, end));
            }
        }
        pos += 1;
    }
    found
}

/// Start of the first word-bounded `keyword` at or after `from`.
fn find_keyword(bytes: &[u8], from: usize, keyword: &[u8]) -> Option<usize> {
    (from..bytes.len()).find(|&pos| {
        (pos == 0 || !is_word(bytes[pos - 1])) && match_keyword(bytes, pos, keyword).is_some()
    })
}

/// The text before VALUES must end with the column list's `)`.
fn ends_with_columns(between: &[u8]) -> bool {
    between.trim_ascii_end().last() == Some(&b')')
}

/// Whether `text` would consume parameters. Malformed `%` sequences count,
/// so the statement goes through the per-row path that reports them.
fn has_placeholder(text: &str) -> bool {
    let mut found = false;
    let scanned = scan(text, |piece| {
        if matches!(piece, Piece::Positional | Piece::Named(_)) {
            found = true;
        }
        Ok(())
    });
    found || scanned.is_err()
}

/// `(` placeholder (`,` placeholder)* `)` with optional whitespace around
/// each placeholder. Returns the position after `)`.
fn match_row_template(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }
    let mut pos = pos + 1;
    loop {
        pos = skip_whitespace(bytes, pos);
        pos = match_placeholder(bytes, pos)?;
        pos = skip_whitespace(bytes, pos);
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b')') => return Some(pos + 1),
            _ => return None,
        }
    }
}

/// `%s` or `%(name)s`.
fn match_placeholder(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'%') {
        return None;
    }
    match bytes.get(pos + 1)? {
        b's' => Some(pos + 2),
        b'(' => {
            let name_start = pos + 2;
            let close = name_start + memchr::memchr(b')', bytes.get(name_start..)?)?;
            if close == name_start || bytes.get(close + 1) != Some(&b's') {
                return None;
            }
            Some(close + 2)
        }
        _ => None,
    }
}

/// Drop trailing whitespace and one statement terminator.
fn trim_postfix(rest: &str) -> &str {
    let rest = rest.trim_end();
    match rest.strip_suffix(';') {
        Some(stripped) => stripped.trim_end(),
        None => rest,
    }
}
