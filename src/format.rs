//! Placeholder substitution.
//!
//! Statement templates use `%s` for positional parameters, `%(name)s` for
//! named parameters, and `%%` for a literal percent sign. Values are rendered
//! through [`Value::write_literal`](crate::value::Value::write_literal).

use crate::error::{Error, Result};
use crate::params::Params;

/// One lexical piece of a statement template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'a> {
    Text(&'a str),
    Percent,
    Positional,
    Named(&'a str),
}

/// Split a template into pieces, calling `emit` for each in order.
pub(crate) fn scan<'a>(
    template: &'a str,
    mut emit: impl FnMut(Piece<'a>) -> Result<()>,
) -> Result<()> {
    let bytes = template.as_bytes();
    let mut start = 0;
    while let Some(offset) = memchr::memchr(b'%', &bytes[start..]) {
        let pos = start + offset;
        if pos > start {
            emit(Piece::Text(&template[start..pos]))?;
        }
        match bytes.get(pos + 1) {
            Some(b'%') => {
                emit(Piece::Percent)?;
                start = pos + 2;
            }
            Some(b's') => {
                emit(Piece::Positional)?;
                start = pos + 2;
            }
            Some(b'(') => {
                let name_start = pos + 2;
                let close = memchr::memchr(b')', &bytes[name_start..])
                    .ok_or_else(|| Error::Programming("incomplete format key".into()))?;
                let name_end = name_start + close;
                let name = &template[name_start..name_end];
                if bytes.get(name_end + 1) != Some(&b's') {
                    return Err(Error::Programming(format!(
                        "unsupported format for key '{name}': only %(name)s is allowed"
                    )));
                }
                emit(Piece::Named(name))?;
                start = name_end + 2;
            }
            Some(&other) => {
                return Err(Error::Programming(format!(
                    "unsupported format character '{}' (0x{other:02x}) at index {}",
                    other as char,
                    pos + 1
                )));
            }
            None => return Err(Error::Programming("incomplete format".into())),
        }
    }
    if start < bytes.len() {
        emit(Piece::Text(&template[start..]))?;
    }
    Ok(())
}

/// Substitute `params` into `template`, producing the statement bytes.
///
/// With `Params::None` the template is returned verbatim.
pub fn format_query(template: &str, params: &Params, no_backslash_escapes: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(template.len() + 16 * params.len());
    format_into(&mut out, template, params, no_backslash_escapes)?;
    Ok(out)
}

/// Like [`format_query`], appending to an existing buffer.
pub fn format_into(
    out: &mut Vec<u8>,
    template: &str,
    params: &Params,
    no_backslash_escapes: bool,
) -> Result<()> {
    let values = match params {
        Params::None => {
            out.extend_from_slice(template.as_bytes());
            return Ok(());
        }
        Params::Positional(values) => Some(values.as_slice()),
        Params::Named(_) => None,
    };

    let mut next = 0usize;
    scan(template, |piece| {
        match piece {
            Piece::Text(text) => out.extend_from_slice(text.as_bytes()),
            Piece::Percent => out.push(b'%'),
            Piece::Positional => {
                let values = values.ok_or_else(|| {
                    Error::Programming("%s placeholder requires positional parameters".into())
                })?;
                let value = values.get(next).ok_or_else(|| {
                    Error::Programming("not enough arguments for format string".into())
                })?;
                value.write_literal(out, no_backslash_escapes)?;
                next += 1;
            }
            Piece::Named(name) => {
                if values.is_some() {
                    return Err(Error::Programming(
                        "format requires a mapping".into(),
                    ));
                }
                let value = params.get_named(name).ok_or_else(|| {
                    Error::Programming(format!("missing named parameter '{name}'"))
                })?;
                value.write_literal(out, no_backslash_escapes)?;
            }
        }
        Ok(())
    })?;

    if let Some(values) = values
        && next < values.len()
    {
        return Err(Error::Programming(
            "not all arguments converted during string formatting".into(),
        ));
    }
    Ok(())
}

/// Translate `%s` placeholders to the server's `?` and unescape `%%`.
///
/// Returns the translated statement and its placeholder count. Named
/// placeholders are rejected; server-side statements are positional.
pub fn to_server_placeholders(template: &str) -> Result<(String, usize)> {
    let mut out = String::with_capacity(template.len());
    let mut count = 0usize;
    scan(template, |piece| {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Percent => out.push('%'),
            Piece::Positional => {
                out.push('?');
                count += 1;
            }
            Piece::Named(name) => {
                return Err(Error::Programming(format!(
                    "named placeholder '%({name})s' is not supported by prepared statements"
                )));
            }
        }
        Ok(())
    })?;
    Ok((out, count))
}
