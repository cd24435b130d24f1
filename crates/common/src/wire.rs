//! Big-endian framing helpers
//!
//! Both the key store file and the content envelope are simple sequences of
//! fixed-width fields. These helpers keep the byte order and the "clean EOF vs
//! truncated record" distinction in one place.

use std::io::{self, Read, Write};

/// Write a `u32` in network byte order.
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Read a `u32` in network byte order.
pub fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buff = [0u8; 4];
    reader.read_exact(&mut buff)?;
    Ok(u32::from_be_bytes(buff))
}

/// Fill `buf` completely, or report that the reader was already at EOF.
///
/// Returns `Ok(false)` when no byte at all could be read, `Ok(true)` when
/// the buffer was filled, and `UnexpectedEof` when the input ended part way
/// through the buffer.
pub fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("record truncated after {} of {} bytes", n, buf.len()),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_u32_is_big_endian() {
        let mut out = Vec::new();
        write_u32(&mut out, 0x0102_0304).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(read_u32(&mut Cursor::new(out)).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_read_record_distinguishes_eof_from_truncation() {
        let mut buf = [0u8; 4];

        let mut empty = Cursor::new(Vec::<u8>::new());
        assert!(!read_record(&mut empty, &mut buf).unwrap());

        let mut full = Cursor::new(vec![9u8; 4]);
        assert!(read_record(&mut full, &mut buf).unwrap());
        assert_eq!(buf, [9u8; 4]);

        let mut short = Cursor::new(vec![1u8, 2]);
        let err = read_record(&mut short, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
