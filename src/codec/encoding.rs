//! Binary encoding primitives for cells.
//!
//! Provides LEB128 integer encoding, IEEE 754 float encoding, and
//! length-prefixed UTF-8 strings.
//!
//! All functions write directly into a caller-provided `&mut Vec<u8>` buffer,
//! avoiding intermediate allocations.

use byteorder::{ByteOrder, LittleEndian};

// ---------------------------------------------------------------------------
// Cell tags
// ---------------------------------------------------------------------------

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_FLOAT: u8 = 0x03;
pub const TAG_RATIONAL: u8 = 0x04;
pub const TAG_TEXT: u8 = 0x05;
pub const TAG_LIST: u8 = 0x06;
pub const TAG_REFERENCE: u8 = 0x07;
pub const TAG_ERROR: u8 = 0x08;
pub const TAG_NULL: u8 = 0x09;
pub const TAG_STREAM: u8 = 0x0A;

// ---------------------------------------------------------------------------
// Type tags (list element types and Null placeholders)
// ---------------------------------------------------------------------------

pub const TYPE_UNDETERMINED: u8 = 0x00;
pub const TYPE_ANY: u8 = 0x01;
pub const TYPE_NUMBER: u8 = 0x02;
pub const TYPE_BOOLEAN: u8 = 0x03;
pub const TYPE_INTEGER: u8 = 0x04;
pub const TYPE_FLOAT: u8 = 0x05;
pub const TYPE_RATIONAL: u8 = 0x06;
pub const TYPE_TEXT: u8 = 0x07;
pub const TYPE_LIST: u8 = 0x08; // followed by the element type
pub const TYPE_REFERENCE: u8 = 0x09;
pub const TYPE_HANDLE: u8 = 0x0A; // followed by the domain type name
pub const TYPE_ERROR: u8 = 0x0B;
pub const TYPE_NULL: u8 = 0x0C;
pub const TYPE_INPUT: u8 = 0x0D;
pub const TYPE_OUTPUT: u8 = 0x0E;

// Stream kinds
pub const STREAM_INPUT: u8 = 0;
pub const STREAM_OUTPUT: u8 = 1;
pub const STREAM_DISCARD: u8 = 2;

// ---------------------------------------------------------------------------
// Unsigned LEB128
// ---------------------------------------------------------------------------

/// Appends the unsigned LEB128 encoding of a u64 value to `buf`.
pub fn write_vu64(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Appends a boolean as a single byte (0x00 or 0x01).
pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

// ---------------------------------------------------------------------------
// Signed LEB128
// ---------------------------------------------------------------------------

/// Appends the signed LEB128 encoding of an i64 value to `buf`.
pub fn write_vs64(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

// ---------------------------------------------------------------------------
// IEEE 754 floats (little-endian)
// ---------------------------------------------------------------------------

/// Appends the little-endian IEEE 754 encoding of an f64 value to `buf`.
pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_f64(&mut bytes, v);
    buf.extend_from_slice(&bytes);
}

// ---------------------------------------------------------------------------
// Length-prefixed strings
// ---------------------------------------------------------------------------

/// Appends a length-prefixed UTF-8 string (vu64 byte length + raw bytes) to `buf`.
pub fn write_string(buf: &mut Vec<u8>, v: &str) {
    write_vu64(buf, v.len() as u64);
    buf.extend_from_slice(v.as_bytes());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
