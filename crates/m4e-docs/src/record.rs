//! On-disk record format of the document cache.
//!
//! A record is a run of length-prefixed fields with no terminator:
//!
//! ```text
//! |<len>:<name>=<value>|<len>:<name>=<value>...
//! ```
//!
//! `len` is the decimal byte length of `<name>=<value>`. The first three
//! fields form the header (format version, creation time, last fetch time)
//! and must appear in that order. Timestamps are zero-padded to a fixed
//! width so the last fetch time can be rewritten in place. The metadata
//! fields follow, and the `content` field carrying the raw document bytes
//! comes last.

use std::str;

use tracing::trace;

use crate::document::Document;
use crate::error::{RecordError, RecordResult};

const FIELD_SEP: u8 = b'|';

pub const FORMAT_FIELD: &str = "M4E_CACHE_FORMAT_VER";
pub const FORMAT_VERSION: u32 = 1;
pub const CREATED_FIELD: &str = "M4E_CACHE_CREATED";
pub const LAST_FETCH_FIELD: &str = "M4E_CACHE_LASTFETCH";

/// Digits of a timestamp field.
pub const TIMESTAMP_WIDTH: usize = 16;

/// Bytes that always cover the header of a current-version record.
pub const HEADER_READ_LEN: usize = 128;

/// Parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Creation time, ms since the epoch.
    pub created: u64,
    /// Last fetch time, ms since the epoch.
    pub last_fetch: u64,
    /// Byte offset of the last fetch field, separator included.
    pub last_fetch_offset: usize,
    /// Byte offset of the first field after the header.
    pub body_offset: usize,
}

struct Field<'a> {
    name: &'a str,
    value: &'a [u8],
    start: usize,
    end: usize,
}

impl Field<'_> {
    fn text(&self) -> RecordResult<String> {
        str::from_utf8(self.value)
            .map(str::to_string)
            .map_err(|_| RecordError::InvalidUtf8(self.name.to_string()))
    }

    fn timestamp(&self) -> RecordResult<u64> {
        if self.value.len() != TIMESTAMP_WIDTH || !self.value.iter().all(u8::is_ascii_digit) {
            return Err(RecordError::malformed(self.start, "timestamp has wrong width"));
        }
        // All digits, so this is valid UTF-8.
        str::from_utf8(self.value)
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| RecordError::malformed(self.start, "timestamp out of range"))
    }
}

fn push_field(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    let len = name.len() + 1 + value.len();
    out.push(FIELD_SEP);
    out.extend_from_slice(len.to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value);
}

/// Encodes a timestamp field, separator and length included.
///
/// The result has the same length for every timestamp below 10^16 ms.
pub fn timestamp_field(name: &str, millis: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + TIMESTAMP_WIDTH + 6);
    let value = format!("{millis:0width$}", width = TIMESTAMP_WIDTH);
    push_field(&mut out, name, value.as_bytes());
    out
}

/// Encodes a new record for `document`, created and last fetched at `now_ms`.
pub fn encode_record(document: &Document, now_ms: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_READ_LEN + document.content.len() + 128);

    push_field(&mut out, FORMAT_FIELD, FORMAT_VERSION.to_string().as_bytes());
    out.extend_from_slice(&timestamp_field(CREATED_FIELD, now_ms));
    out.extend_from_slice(&timestamp_field(LAST_FETCH_FIELD, now_ms));

    push_field(&mut out, "id", document.id.as_bytes());
    push_field(&mut out, "name", document.name.as_bytes());
    push_field(&mut out, "etag", document.etag.as_bytes());
    push_field(&mut out, "encoding", document.encoding.as_bytes());
    push_field(&mut out, "type", document.mime_type.as_bytes());
    push_field(&mut out, "content", &document.content);

    out
}

fn read_field(bytes: &[u8], offset: usize) -> RecordResult<Option<Field<'_>>> {
    if offset >= bytes.len() {
        return Ok(None);
    }
    if bytes[offset] != FIELD_SEP {
        return Err(RecordError::malformed(offset, "missing field separator"));
    }

    let rest = &bytes[offset + 1..];
    let colon = rest
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| RecordError::malformed(offset, "missing length delimiter"))?;
    let digits = &rest[..colon];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(RecordError::malformed(offset, "field length is not a number"));
    }
    let len: usize = str::from_utf8(digits)
        .ok()
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| RecordError::malformed(offset, "field length out of range"))?;

    let text_start = offset + 1 + colon + 1;
    let end = text_start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| RecordError::malformed(offset, "field runs past end of record"))?;
    let text = &bytes[text_start..end];

    let eq = text
        .iter()
        .position(|&b| b == b'=')
        .ok_or_else(|| RecordError::malformed(offset, "missing '=' in field"))?;
    let name = str::from_utf8(&text[..eq])
        .map_err(|_| RecordError::malformed(offset, "field name is not UTF-8"))?;

    Ok(Some(Field {
        name,
        value: &text[eq + 1..],
        start: offset,
        end,
    }))
}

fn expect_field<'a>(bytes: &'a [u8], offset: usize, expected: &'static str) -> RecordResult<Field<'a>> {
    let field = read_field(bytes, offset)?.ok_or(RecordError::MissingField(expected))?;
    if field.name != expected {
        return Err(RecordError::UnexpectedField {
            expected,
            found: field.name.to_string(),
        });
    }
    Ok(field)
}

/// Parses the header triplet.
///
/// Only the header bytes are needed, so a prefix of the record will do.
pub fn parse_header(bytes: &[u8]) -> RecordResult<RecordHeader> {
    let version = expect_field(bytes, 0, FORMAT_FIELD)?;
    if version.value != FORMAT_VERSION.to_string().as_bytes() {
        return Err(RecordError::VersionMismatch(
            String::from_utf8_lossy(version.value).into_owned(),
        ));
    }

    let created = expect_field(bytes, version.end, CREATED_FIELD)?;
    let last_fetch = expect_field(bytes, created.end, LAST_FETCH_FIELD)?;

    Ok(RecordHeader {
        created: created.timestamp()?,
        last_fetch: last_fetch.timestamp()?,
        last_fetch_offset: last_fetch.start,
        body_offset: last_fetch.end,
    })
}

/// Decodes a complete record.
pub fn decode_record(bytes: &[u8]) -> RecordResult<(RecordHeader, Document)> {
    let header = parse_header(bytes)?;
    let mut document = Document::default();
    let mut offset = header.body_offset;

    loop {
        let field = read_field(bytes, offset)?.ok_or(RecordError::MissingField("content"))?;
        offset = field.end;
        match field.name {
            "id" => document.id = field.text()?,
            "name" => document.name = field.text()?,
            "etag" => document.etag = field.text()?,
            "encoding" => document.encoding = field.text()?,
            "type" => document.mime_type = field.text()?,
            "content" => {
                document.content = field.value.to_vec();
                break;
            }
            other => trace!(field = other, "ignoring unknown record field"),
        }
    }

    Ok((header, document))
}
