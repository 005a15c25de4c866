//! Little-endian byte reader shared by the action and ABC decoders.

use thiserror::Error;

/// Failure while reading primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Not enough bytes left
    #[error("unexpected end of data at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof {
        /// Offset of the read
        offset: usize,
        /// Bytes requested
        wanted: usize,
    },
    /// Variable-length integer longer than five bytes
    #[error("variable-length integer too long at offset {offset}")]
    VarIntTooLong {
        /// Offset of the first byte
        offset: usize,
    },
    /// Missing NUL terminator
    #[error("unterminated string at offset {offset}")]
    UnterminatedString {
        /// Offset of the first byte
        offset: usize,
    },
}

/// Result type for reads.
pub type ReadResult<T> = Result<T, ReadError>;

/// Cursor over a byte slice.
///
/// # Examples
///
/// ```
/// use bytecode_system::ByteReader;
///
/// let mut r = ByteReader::new(&[0x34, 0x12, 0x85, 0x01]);
/// assert_eq!(r.u16().unwrap(), 0x1234);
/// assert_eq!(r.u30().unwrap(), 133);
/// assert!(r.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Creates a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        ByteReader { data, pos }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// True when everything has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrows the next `n` bytes.
    pub fn bytes(&mut self, n: usize) -> ReadResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ReadError::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> ReadResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Reads an unsigned byte.
    pub fn u8(&mut self) -> ReadResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads a signed byte.
    pub fn i8(&mut self) -> ReadResult<i8> {
        Ok(self.u8()? as i8)
    }

    /// Reads a little-endian u16.
    pub fn u16(&mut self) -> ReadResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian i16.
    pub fn i16(&mut self) -> ReadResult<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian u32.
    pub fn u32(&mut self) -> ReadResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian i32.
    pub fn i32(&mut self) -> ReadResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian signed 24-bit integer (branch offsets).
    pub fn s24(&mut self) -> ReadResult<i32> {
        let [a, b, c] = self.array::<3>()?;
        let raw = (a as i32) | ((b as i32) << 8) | ((c as i32) << 16);
        Ok((raw << 8) >> 8)
    }

    /// Reads a little-endian f32.
    pub fn f32(&mut self) -> ReadResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian f64.
    pub fn f64(&mut self) -> ReadResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Reads a variable-length unsigned 32-bit integer (1 to 5 bytes).
    pub fn var_u32(&mut self) -> ReadResult<u32> {
        let start = self.pos;
        let mut result: u64 = 0;
        for i in 0..5 {
            let byte = self.u8()?;
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result as u32);
            }
        }
        Err(ReadError::VarIntTooLong { offset: start })
    }

    /// Reads a u30; the encoding is the same as [`var_u32`](Self::var_u32).
    pub fn u30(&mut self) -> ReadResult<u32> {
        self.var_u32()
    }

    /// Reads a variable-length signed 32-bit integer.
    ///
    /// Encoders write negative numbers in all five bytes, so the value is the
    /// unsigned decoding reinterpreted as two's complement.
    pub fn var_s32(&mut self) -> ReadResult<i32> {
        Ok(self.var_u32()? as i32)
    }

    /// Reads a NUL-terminated string (action records).
    pub fn cstring(&mut self) -> ReadResult<String> {
        let start = self.pos;
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::UnterminatedString { offset: start })?;
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(text)
    }

    /// Reads a u30 length followed by that many UTF-8 bytes (ABC strings).
    pub fn counted_string(&mut self) -> ReadResult<String> {
        let len = self.u30()? as usize;
        let bytes = self.bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
