use byteorder::{ByteOrder, LittleEndian};
use std::io;

/// Cursor over an encoded byte buffer
pub struct Reader {
    bytes: Vec<u8>,
    pos: usize,
}

impl Reader {
    pub fn new(bytes: Vec<u8>) -> Reader {
        Reader { bytes, pos: 0 }
    }
}

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

impl Reader {
    // Basic operations --------------------------------------------------------
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8, io::Error> {
        let byte = *self.bytes.get(self.pos).ok_or_else(|| eof("no more bytes to read"))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], io::Error> {
        if len > self.remaining() {
            return Err(eof("not enough bytes to read"));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes[start..self.pos])
    }

    // Read and interpret types ------------------------------------------------

    pub fn read_bool(&mut self) -> Result<bool, io::Error> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid boolean byte 0x{other:02x}"),
            )),
        }
    }

    pub fn read_f64(&mut self) -> Result<f64, io::Error> {
        let bytes = self.read_bytes(8)?;
        Ok(LittleEndian::read_f64(bytes))
    }

    // LEB128 ------------------------------------------------------------------

    pub fn read_vu64(&mut self) -> Result<u64, io::Error> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            let low = u64::from(byte & 0x7f);
            if (shift == 63 && low > 1) || shift > 63 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "vu64 overflow"));
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_vs64(&mut self) -> Result<i64, io::Error> {
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            if shift > 63 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "vs64 overflow"));
            }
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// Length-prefixed UTF-8 string, refusing lengths above `max_len`
    pub fn read_string(&mut self, max_len: u64) -> Result<String, io::Error> {
        let len = self.read_vu64()?;
        if len > max_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("string length {len} exceeds limit {max_len}"),
            ));
        }
        let bytes = self.read_bytes(len as usize)?.to_vec();
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_vu64() {
        let mut reader = Reader::new(vec![0b11100101, 0b10001110, 0b00100110, 0x7f]);
        assert_eq!(reader.read_vu64().unwrap(), 624485);
        assert_eq!(reader.pos(), 3);
        assert_eq!(reader.read_vu64().unwrap(), 127);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_vu64_truncated() {
        let mut reader = Reader::new(vec![0x80, 0x80]);
        let err = reader.read_vu64().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_vu64_overflow() {
        let mut reader = Reader::new(vec![0xff; 11]);
        let err = reader.read_vu64().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_vs64() {
        let mut reader = Reader::new(vec![0x7f, 0xc0, 0xbb, 0x78, 0xc0, 0x00]);
        assert_eq!(reader.read_vs64().unwrap(), -1);
        assert_eq!(reader.read_vs64().unwrap(), -123456);
        assert_eq!(reader.read_vs64().unwrap(), 64);
    }

    #[test]
    fn test_read_string_limit() {
        let mut reader = Reader::new(vec![5, b'h', b'e', b'l', b'l', b'o']);
        assert!(reader.read_string(4).is_err());

        let mut reader = Reader::new(vec![5, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(reader.read_string(5).unwrap(), "hello");
    }

    #[test]
    fn test_read_bool() {
        let mut reader = Reader::new(vec![1, 0, 2]);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().is_err());
    }
}
