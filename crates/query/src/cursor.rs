//! Opaque cursor marks
//!
//! A cursor mark is the position of the last hit of a page, encoded so the
//! next call can resume strictly after it. The token is standard base64 of:
//!
//! ```text
//! [version: u8 = 1]
//! [score: f32 LE][doc: u32 LE][shard: u32 LE]
//! [value count: u32 LE]
//! per value: [tag: u8] then payload
//!   0 Null  (none)
//!   1 Str   [len: u32 LE][utf-8 bytes]
//!   2 I64   [i64 LE]
//!   3 U64   [u64 LE]
//!   4 F64   [f64 bits LE]
//! ```
//!
//! The token `*` means "first page" and decodes to no position.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::cmp::Ordering;
use std::io;
use thiserror::Error;

const CURSOR_VERSION: u8 = 1;

const TAG_NULL: u8 = 0;
const TAG_STR: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_U64: u8 = 3;
const TAG_F64: u8 = 4;

/// Errors decoding a cursor mark
#[derive(Debug, Error)]
pub enum CursorError {
    /// Not valid base64
    #[error("cursor is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Encoded with a format this build does not read
    #[error("unsupported cursor version {0}")]
    UnsupportedVersion(u8),

    /// Unknown sort value tag
    #[error("unknown sort value tag {0}")]
    UnknownTag(u8),

    /// Ended before a complete position was read
    #[error("cursor is truncated")]
    Truncated,

    /// String sort value is not UTF-8
    #[error("cursor string value is not valid UTF-8")]
    InvalidUtf8,

    /// Bytes left over after the position
    #[error("cursor has {0} trailing bytes")]
    TrailingBytes(usize),
}

impl From<io::Error> for CursorError {
    fn from(_: io::Error) -> Self {
        CursorError::Truncated
    }
}

// ============================================================================
// SortValue / SortPosition
// ============================================================================

/// One sort-key value of a hit
///
/// Values order as `Null` < any value; values of different types order by
/// type tag. `F64` uses IEEE total ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Document has no value for the field
    Null,
    /// Text value
    Str(String),
    /// Signed value
    I64(i64),
    /// Unsigned value
    U64(u64),
    /// Float value
    F64(f64),
}

impl SortValue {
    fn tag(&self) -> u8 {
        match self {
            SortValue::Null => TAG_NULL,
            SortValue::Str(_) => TAG_STR,
            SortValue::I64(_) => TAG_I64,
            SortValue::U64(_) => TAG_U64,
            SortValue::F64(_) => TAG_F64,
        }
    }
}

impl Eq for SortValue {}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (SortValue::I64(a), SortValue::I64(b)) => a.cmp(b),
            (SortValue::U64(a), SortValue::U64(b)) => a.cmp(b),
            (SortValue::F64(a), SortValue::F64(b)) => a.total_cmp(b),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where a hit sits in a ranked listing
#[derive(Debug, Clone, PartialEq)]
pub struct SortPosition {
    /// Relevance score
    pub score: f32,
    /// Segment-local doc id
    pub doc: u32,
    /// Segment ordinal
    pub shard: u32,
    /// One value per sort clause
    pub sort_values: Vec<SortValue>,
}

// ============================================================================
// CursorMark
// ============================================================================

/// Cursor mark codec
pub struct CursorMark;

impl CursorMark {
    /// Token requesting the first page
    pub const START: &'static str = "*";

    /// Encode a position as an opaque token
    pub fn encode(position: &SortPosition) -> String {
        let mut buf = Vec::with_capacity(17 + position.sort_values.len() * 9);
        // Writes into a Vec cannot fail
        let _ = write_position(&mut buf, position);
        BASE64.encode(buf)
    }

    /// Decode a token; `*` yields `None`
    pub fn decode(token: &str) -> Result<Option<SortPosition>, CursorError> {
        if token == Self::START {
            return Ok(None);
        }
        let bytes = BASE64.decode(token)?;
        let mut rdr: &[u8] = &bytes;

        let version = rdr.read_u8()?;
        if version != CURSOR_VERSION {
            return Err(CursorError::UnsupportedVersion(version));
        }
        let score = rdr.read_f32::<LittleEndian>()?;
        let doc = rdr.read_u32::<LittleEndian>()?;
        let shard = rdr.read_u32::<LittleEndian>()?;
        let count = rdr.read_u32::<LittleEndian>()? as usize;

        // every value takes at least its tag byte
        if count > rdr.len() {
            return Err(CursorError::Truncated);
        }
        let mut sort_values = Vec::with_capacity(count);
        for _ in 0..count {
            sort_values.push(read_value(&mut rdr)?);
        }
        if !rdr.is_empty() {
            return Err(CursorError::TrailingBytes(rdr.len()));
        }

        Ok(Some(SortPosition {
            score,
            doc,
            shard,
            sort_values,
        }))
    }
}

fn write_position(buf: &mut Vec<u8>, position: &SortPosition) -> io::Result<()> {
    buf.write_u8(CURSOR_VERSION)?;
    buf.write_f32::<LittleEndian>(position.score)?;
    buf.write_u32::<LittleEndian>(position.doc)?;
    buf.write_u32::<LittleEndian>(position.shard)?;
    buf.write_u32::<LittleEndian>(position.sort_values.len() as u32)?;
    for value in &position.sort_values {
        buf.write_u8(value.tag())?;
        match value {
            SortValue::Null => {}
            SortValue::Str(s) => {
                buf.write_u32::<LittleEndian>(s.len() as u32)?;
                buf.extend_from_slice(s.as_bytes());
            }
            SortValue::I64(v) => buf.write_i64::<LittleEndian>(*v)?,
            SortValue::U64(v) => buf.write_u64::<LittleEndian>(*v)?,
            SortValue::F64(v) => buf.write_u64::<LittleEndian>(v.to_bits())?,
        }
    }
    Ok(())
}

fn read_value(rdr: &mut &[u8]) -> Result<SortValue, CursorError> {
    let value = match rdr.read_u8()? {
        TAG_NULL => SortValue::Null,
        TAG_STR => {
            let len = rdr.read_u32::<LittleEndian>()? as usize;
            if len > rdr.len() {
                return Err(CursorError::Truncated);
            }
            let (head, tail) = rdr.split_at(len);
            let s = std::str::from_utf8(head).map_err(|_| CursorError::InvalidUtf8)?;
            *rdr = tail;
            SortValue::Str(s.to_string())
        }
        TAG_I64 => SortValue::I64(rdr.read_i64::<LittleEndian>()?),
        TAG_U64 => SortValue::U64(rdr.read_u64::<LittleEndian>()?),
        TAG_F64 => SortValue::F64(f64::from_bits(rdr.read_u64::<LittleEndian>()?)),
        other => return Err(CursorError::UnknownTag(other)),
    };
    Ok(value)
}
