//! Binary encoding of cells
//!
//! Each cell is a tag byte followed by its payload. Lists carry their
//! element type, a count and the elements in order. Domain handles are live
//! objects and have no encoding.

pub mod encoding;
pub mod reader;

use crate::runtime::limits::{MAX_DECODE_DEPTH, MAX_DECODE_LIST_LEN, MAX_DECODE_STRING_LEN};
use crate::runtime::{Cell, CellType, List, ListError, Rational, StreamHandle};
use encoding::*;
use reader::Reader;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode a handle to a {0} object")]
    Handle(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed input: {0}")]
    Io(#[from] io::Error),
    #[error("unknown cell tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTypeTag(u8),
    #[error("unknown stream kind {0}")]
    UnknownStream(u8),
    #[error("invalid rational {num}/{den}")]
    InvalidRational { num: i64, den: i64 },
    #[error("list length {0} exceeds limit")]
    ListTooLong(u64),
    #[error("nesting deeper than {0}")]
    TooDeep(usize),
    #[error(transparent)]
    List(#[from] ListError),
    #[error("{0} trailing bytes after cell")]
    TrailingBytes(usize),
}

/// Encode one cell
pub fn encode(cell: &Cell) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_into(&mut buf, cell)?;
    Ok(buf)
}

pub fn encode_into(buf: &mut Vec<u8>, cell: &Cell) -> Result<(), EncodeError> {
    match cell {
        Cell::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            write_bool(buf, *b);
        }
        Cell::Integer(i) => {
            buf.push(TAG_INTEGER);
            write_vs64(buf, *i);
        }
        Cell::Float(x) => {
            buf.push(TAG_FLOAT);
            write_f64(buf, *x);
        }
        Cell::Rational(q) => {
            buf.push(TAG_RATIONAL);
            write_vs64(buf, q.numerator());
            write_vs64(buf, q.denominator());
        }
        Cell::Text(text) => {
            buf.push(TAG_TEXT);
            write_string(buf, text);
        }
        Cell::List(list) => {
            buf.push(TAG_LIST);
            encode_type(buf, list.element_type());
            write_vu64(buf, list.len() as u64);
            for item in list.iter() {
                encode_into(buf, item)?;
            }
        }
        Cell::Reference(name) => {
            buf.push(TAG_REFERENCE);
            write_string(buf, name);
        }
        Cell::Handle(handle) => {
            return Err(EncodeError::Handle(handle.object().type_name().to_string()));
        }
        Cell::Error(message) => {
            buf.push(TAG_ERROR);
            write_string(buf, message);
        }
        Cell::Null(t) => {
            buf.push(TAG_NULL);
            encode_type(buf, t);
        }
        Cell::Stream(stream) => {
            buf.push(TAG_STREAM);
            buf.push(match stream {
                StreamHandle::Input => STREAM_INPUT,
                StreamHandle::Output => STREAM_OUTPUT,
                StreamHandle::Discard => STREAM_DISCARD,
            });
        }
    }
    Ok(())
}

/// Encode a type tag. Handle types are written by name.
pub fn encode_type(buf: &mut Vec<u8>, t: &CellType) {
    match t {
        CellType::Undetermined => buf.push(TYPE_UNDETERMINED),
        CellType::Any => buf.push(TYPE_ANY),
        CellType::Number => buf.push(TYPE_NUMBER),
        CellType::Boolean => buf.push(TYPE_BOOLEAN),
        CellType::Integer => buf.push(TYPE_INTEGER),
        CellType::Float => buf.push(TYPE_FLOAT),
        CellType::Rational => buf.push(TYPE_RATIONAL),
        CellType::Text => buf.push(TYPE_TEXT),
        CellType::List(element) => {
            buf.push(TYPE_LIST);
            encode_type(buf, element);
        }
        CellType::Reference => buf.push(TYPE_REFERENCE),
        CellType::Handle(name) => {
            buf.push(TYPE_HANDLE);
            write_string(buf, name);
        }
        CellType::Error => buf.push(TYPE_ERROR),
        CellType::Null => buf.push(TYPE_NULL),
        CellType::Input => buf.push(TYPE_INPUT),
        CellType::Output => buf.push(TYPE_OUTPUT),
    }
}

/// Decode exactly one cell from `bytes`
pub fn decode(bytes: Vec<u8>) -> Result<Cell, DecodeError> {
    let mut reader = Reader::new(bytes);
    let cell = decode_cell(&mut reader, 0)?;
    match reader.remaining() {
        0 => Ok(cell),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

fn decode_cell(reader: &mut Reader, depth: usize) -> Result<Cell, DecodeError> {
    if depth > MAX_DECODE_DEPTH {
        return Err(DecodeError::TooDeep(MAX_DECODE_DEPTH));
    }
    let cell = match reader.read_byte()? {
        TAG_BOOLEAN => Cell::Boolean(reader.read_bool()?),
        TAG_INTEGER => Cell::Integer(reader.read_vs64()?),
        TAG_FLOAT => Cell::Float(reader.read_f64()?),
        TAG_RATIONAL => {
            let num = reader.read_vs64()?;
            let den = reader.read_vs64()?;
            let q = Rational::new(num, den).ok_or(DecodeError::InvalidRational { num, den })?;
            Cell::Rational(q)
        }
        TAG_TEXT => Cell::text(&reader.read_string(MAX_DECODE_STRING_LEN)?),
        TAG_LIST => {
            let element = decode_type(reader, depth + 1)?;
            let count = reader.read_vu64()?;
            if count > MAX_DECODE_LIST_LEN {
                return Err(DecodeError::ListTooLong(count));
            }
            let mut list = List::with_element_type(element);
            for _ in 0..count {
                list.push(decode_cell(reader, depth + 1)?)?;
            }
            Cell::List(list)
        }
        TAG_REFERENCE => Cell::reference(reader.read_string(MAX_DECODE_STRING_LEN)?),
        TAG_ERROR => Cell::error(reader.read_string(MAX_DECODE_STRING_LEN)?),
        TAG_NULL => Cell::Null(decode_type(reader, depth + 1)?),
        TAG_STREAM => Cell::Stream(match reader.read_byte()? {
            STREAM_INPUT => StreamHandle::Input,
            STREAM_OUTPUT => StreamHandle::Output,
            STREAM_DISCARD => StreamHandle::Discard,
            other => return Err(DecodeError::UnknownStream(other)),
        }),
        other => return Err(DecodeError::UnknownTag(other)),
    };
    Ok(cell)
}

fn decode_type(reader: &mut Reader, depth: usize) -> Result<CellType, DecodeError> {
    if depth > MAX_DECODE_DEPTH {
        return Err(DecodeError::TooDeep(MAX_DECODE_DEPTH));
    }
    let t = match reader.read_byte()? {
        TYPE_UNDETERMINED => CellType::Undetermined,
        TYPE_ANY => CellType::Any,
        TYPE_NUMBER => CellType::Number,
        TYPE_BOOLEAN => CellType::Boolean,
        TYPE_INTEGER => CellType::Integer,
        TYPE_FLOAT => CellType::Float,
        TYPE_RATIONAL => CellType::Rational,
        TYPE_TEXT => CellType::Text,
        TYPE_LIST => CellType::list_of(decode_type(reader, depth + 1)?),
        TYPE_REFERENCE => CellType::Reference,
        TYPE_HANDLE => CellType::Handle(reader.read_string(MAX_DECODE_STRING_LEN)?),
        TYPE_ERROR => CellType::Error,
        TYPE_NULL => CellType::Null,
        TYPE_INPUT => CellType::Input,
        TYPE_OUTPUT => CellType::Output,
        other => return Err(DecodeError::UnknownTypeTag(other)),
    };
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mixed_numbers() -> Cell {
        let items = vec![
            Cell::Integer(1),
            Cell::Float(2.5),
            Cell::Rational(Rational::new(1, 3).unwrap()),
            Cell::Integer(-7),
        ];
        Cell::List(List::from_cells(items).unwrap())
    }

    #[test]
    fn test_mixed_numeric_list_keeps_order_and_count() {
        let original = mixed_numbers();
        let decoded = decode(encode(&original).unwrap()).unwrap();
        let list = decoded.as_list().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.element_type(), &CellType::Number);
        assert_eq!(list.get(1), Some(&Cell::Float(2.5)));
        assert_eq!(list.get(3), Some(&Cell::Integer(-7)));
        assert_eq!(decoded, original);
    }

    #[rstest]
    #[case(Cell::Boolean(true), vec![TAG_BOOLEAN, 1])]
    #[case(Cell::Integer(-1), vec![TAG_INTEGER, 0x7f])]
    #[case(Cell::text("ab"), vec![TAG_TEXT, 2, b'a', b'b'])]
    #[case(Cell::Null(CellType::Text), vec![TAG_NULL, TYPE_TEXT])]
    #[case(Cell::Stream(StreamHandle::Output), vec![TAG_STREAM, STREAM_OUTPUT])]
    #[case(Cell::List(List::with_element_type(CellType::Integer)), vec![TAG_LIST, TYPE_INTEGER, 0])]
    fn test_encodes_layout(#[case] cell: Cell, #[case] expected: Vec<u8>) {
        assert_eq!(encode(&cell).unwrap(), expected);
    }

    #[test]
    fn test_nested_list_type_survives() {
        let inner = Cell::List(List::from_cells(vec![Cell::text("x")]).unwrap());
        let outer = Cell::List(List::from_cells(vec![inner]).unwrap());
        let decoded = decode(encode(&outer).unwrap()).unwrap();
        assert_eq!(decoded.cell_type(), CellType::list_of(CellType::list_of(CellType::Text)));
    }

    #[test]
    fn test_handles_are_not_encodable() {
        #[derive(Debug)]
        struct Widget;
        impl crate::runtime::DomainObject for Widget {
            fn type_name(&self) -> &str {
                "WIDGET"
            }
        }
        let cell = Cell::handle(std::rc::Rc::new(Widget));
        assert!(matches!(encode(&cell), Err(EncodeError::Handle(name)) if name == "WIDGET"));
    }

    #[rstest]
    #[case(vec![0x7e], "unknown cell tag")]
    #[case(vec![TAG_RATIONAL, 1, 0], "invalid rational")]
    #[case(vec![TAG_INTEGER, 1, 0], "trailing")]
    #[case(vec![TAG_TEXT, 4, b'a'], "malformed")]
    #[case(vec![TAG_LIST, TYPE_INTEGER, 1, TAG_TEXT, 0], "cannot insert")]
    fn test_rejects_malformed(#[case] bytes: Vec<u8>, #[case] fragment: &str) {
        let err = decode(bytes).unwrap_err();
        assert!(err.to_string().contains(fragment), "{err}");
    }

    #[test]
    fn test_rejects_oversized_list() {
        let mut bytes = vec![TAG_LIST, TYPE_INTEGER];
        write_vu64(&mut bytes, MAX_DECODE_LIST_LEN + 1);
        assert!(matches!(decode(bytes), Err(DecodeError::ListTooLong(_))));
    }

    #[test]
    fn test_rejects_deep_type_nesting() {
        let mut bytes = vec![TAG_NULL];
        bytes.extend(std::iter::repeat(TYPE_LIST).take(MAX_DECODE_DEPTH + 2));
        bytes.push(TYPE_TEXT);
        assert!(matches!(decode(bytes), Err(DecodeError::TooDeep(_))));
    }
}
