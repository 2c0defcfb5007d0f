//! Manual little-endian byte encode/decode helpers shared by every codec
//! body, in the same style as the block-cache inverted lists'
//! `to_le_bytes`/`from_le_bytes` packing (`crate::index::ivf_pq::invlist`).

use crate::error::{Error, Result};

/// Growable little-endian byte sink.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Starts an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the writer, returning the accumulated bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a fixed 4-byte tag verbatim (e.g. a magic marker).
    ///
    /// # Panics
    ///
    /// Panics if `tag.len() != 4`.
    pub fn write_tag(&mut self, tag: &[u8; 4]) {
        self.buf.extend_from_slice(tag);
    }

    /// Writes a `u8`.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Writes a `bool` as one byte.
    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Writes a `u32`, little-endian.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a `u64`, little-endian.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes an `i64`, little-endian.
    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes an `f32`, little-endian.
    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a length-prefixed (`u32`) slice of `f32`s.
    pub fn write_f32_vec(&mut self, v: &[f32]) {
        self.write_u32(v.len() as u32);
        for &x in v {
            self.write_f32(x);
        }
    }

    /// Writes raw bytes with no length prefix (the caller tracks length
    /// elsewhere, e.g. via `entry_count * code_size`).
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed (`u32`) UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// Cursor-based little-endian byte reader over a borrowed buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wraps `buf` for sequential reads starting at offset 0.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| {
            Error::Codec("codec: length overflow while reading".to_string())
        })?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| Error::Codec("codec: unexpected end of stream".to_string()))?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads and checks a fixed 4-byte magic tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexCorrupted`] if the bytes don't match `expected`.
    pub fn expect_tag(&mut self, expected: &[u8; 4]) -> Result<()> {
        let got = self.take(4)?;
        if got != expected {
            return Err(Error::IndexCorrupted(format!(
                "codec: expected magic tag {:?}, got {:?}",
                std::str::from_utf8(expected).unwrap_or("?"),
                String::from_utf8_lossy(got)
            )));
        }
        Ok(())
    }

    /// Peeks the next 4 bytes as a tag without advancing the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if fewer than 4 bytes remain.
    pub fn peek_tag(&self) -> Result<[u8; 4]> {
        let slice = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| Error::Codec("codec: unexpected end of stream".to_string()))?;
        Ok([slice[0], slice[1], slice[2], slice[3]])
    }

    /// Reads a `u8`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a `bool` from one byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a `u32`, little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    /// Reads a `u64`, little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    /// Reads an `i64`, little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    /// Reads an `f32`, little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    /// Reads a length-prefixed (`u32`) vector of `f32`s.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_f32_vec(&mut self) -> Result<Vec<f32>> {
        let len = self.read_u32()? as usize;
        (0..len).map(|_| self.read_f32()).collect()
    }

    /// Reads exactly `n` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated input.
    pub fn read_raw(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Reads a length-prefixed (`u32`) UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on truncated or non-UTF-8 input.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Codec(format!("codec: invalid utf-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_and_vectors() {
        let mut w = Writer::new();
        w.write_tag(b"TEST");
        w.write_u32(42);
        w.write_u64(1_000_000_000_000);
        w.write_i64(-7);
        w.write_f32(1.5);
        w.write_bool(true);
        w.write_f32_vec(&[1.0, 2.0, 3.0]);
        w.write_string("hello");
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        r.expect_tag(b"TEST").expect("tag");
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_u64().unwrap(), 1_000_000_000_000);
        assert_eq!(r.read_i64().unwrap(), -7);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(r.read_string().unwrap(), "hello");
    }

    #[test]
    fn truncated_input_errors_instead_of_panicking() {
        let mut r = Reader::new(&[1, 2]);
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn tag_mismatch_is_index_corrupted() {
        let mut r = Reader::new(b"nope");
        let err = r.expect_tag(b"TEST").unwrap_err();
        assert!(matches!(err, Error::IndexCorrupted(_)));
    }
}
