//! Resolution of changefeed file names into table addresses.
//!
//! The changefeed names every file it writes
//! `<prefix>-<database>.<schema>.<table>-<sequence>.<ext>`, where the prefix
//! itself contains dashes (timestamps, uniquers). The prefix is matched
//! lazily: the first dash after which the rest of the token parses wins.
//! Anything after `.<ext>` is ignored.

use crate::error::IngestError;
use crate::models::TableAddress;

/// Parses `token` into a [`TableAddress`], expecting files ending in `.<extension>`.
pub fn resolve(token: &str, extension: &str) -> Result<TableAddress, IngestError> {
    let extension = extension.trim_start_matches('.');
    token
        .char_indices()
        .filter(|&(i, c)| c == '-' && i > 0)
        .find_map(|(i, _)| parse_tail(&token[i + 1..], extension))
        .ok_or_else(|| IngestError::MalformedAddress {
            token: token.to_string(),
        })
}

/// Matches `<db>.<schema>.<table>-<digits>.<ext>` at the start of `tail`.
fn parse_tail(tail: &str, extension: &str) -> Option<TableAddress> {
    let (database, rest) = take_word(tail)?;
    let rest = rest.strip_prefix('.')?;
    let (schema, rest) = take_word(rest)?;
    let rest = rest.strip_prefix('.')?;
    let (table, rest) = take_word(rest)?;
    let rest = rest.strip_prefix('-')?;

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = rest[digits..].strip_prefix('.')?;
    if !rest.starts_with(extension) {
        return None;
    }

    Some(TableAddress {
        database: database.to_string(),
        schema: schema.to_string(),
        table: table.to_string(),
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits the longest non-empty run of word characters off the front of `s`.
fn take_word(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !is_word_char(c)).unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(s.split_at(end))
    }
}
