//! Bounds-checked little-endian access to model file buffers
//!
//! Every multi-byte field in the supported formats is little-endian. Reading
//! through [`ByteReader`] decodes each field explicitly with `from_le_bytes`,
//! so the host byte order never matters and no read can run past the buffer.
//!
//! [`FieldWriter`] is the mirror image used by header `to_bytes` methods and
//! by the fixture writers in [`crate::test_utils`].

use thiserror::Error;

/// A read that would run past the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("read of {len} bytes at offset {offset} runs past the end of a {available}-byte buffer")]
pub struct ReadError {
    pub offset: usize,
    pub len: usize,
    pub available: usize,
}

/// Borrowed view over a complete file buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Total buffer length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ReadError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ReadError {
                offset,
                len,
                available: self.data.len(),
            })
    }

    /// Check that `len` bytes starting at `offset` are available
    #[inline]
    pub fn require(&self, offset: usize, len: usize) -> Result<(), ReadError> {
        self.bytes(offset, len).map(|_| ())
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], ReadError> {
        let slice = self.bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    #[inline]
    pub fn u16(&self, offset: usize) -> Result<u16, ReadError> {
        self.array(offset).map(u16::from_le_bytes)
    }

    #[inline]
    pub fn i16(&self, offset: usize) -> Result<i16, ReadError> {
        self.array(offset).map(i16::from_le_bytes)
    }

    #[inline]
    pub fn u32(&self, offset: usize) -> Result<u32, ReadError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    #[inline]
    pub fn i32(&self, offset: usize) -> Result<i32, ReadError> {
        self.array(offset).map(i32::from_le_bytes)
    }

    #[inline]
    pub fn f32(&self, offset: usize) -> Result<f32, ReadError> {
        self.array(offset).map(f32::from_le_bytes)
    }

    /// Fixed-width, NUL-padded name field
    pub fn name(&self, offset: usize, width: usize) -> Result<String, ReadError> {
        let raw = self.bytes(offset, width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Sequential reader starting at `offset`
    #[inline]
    pub fn cursor(&self, offset: usize) -> Cursor<'a> {
        Cursor {
            reader: *self,
            pos: offset,
        }
    }
}

/// Sequential field reader over a [`ByteReader`].
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    reader: ByteReader<'a>,
    pos: usize,
}

impl Cursor<'_> {
    /// Current absolute offset
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn skip(&mut self, len: usize) {
        self.pos += len;
    }

    pub fn u16(&mut self) -> Result<u16, ReadError> {
        let value = self.reader.u16(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub fn i16(&mut self) -> Result<i16, ReadError> {
        let value = self.reader.i16(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        let value = self.reader.u32(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn i32(&mut self) -> Result<i32, ReadError> {
        let value = self.reader.i32(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn f32(&mut self) -> Result<f32, ReadError> {
        let value = self.reader.f32(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn vec2(&mut self) -> Result<[f32; 2], ReadError> {
        Ok([self.f32()?, self.f32()?])
    }

    pub fn vec3(&mut self) -> Result<[f32; 3], ReadError> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    pub fn name(&mut self, width: usize) -> Result<String, ReadError> {
        let value = self.reader.name(self.pos, width)?;
        self.pos += width;
        Ok(value)
    }

    pub fn bytes<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let value = self.reader.array::<N>(self.pos)?;
        self.pos += N;
        Ok(value)
    }
}

/// Sequential little-endian writer into a growable buffer.
#[derive(Debug, Default, Clone)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn vec2(&mut self, value: [f32; 2]) -> &mut Self {
        value.iter().for_each(|&v| {
            self.f32(v);
        });
        self
    }

    pub fn vec3(&mut self, value: [f32; 3]) -> &mut Self {
        value.iter().for_each(|&v| {
            self.f32(v);
        });
        self
    }

    /// Write `name` NUL-padded (and truncated) to `width` bytes
    pub fn name(&mut self, name: &str, width: usize) -> &mut Self {
        let raw = name.as_bytes();
        let n = raw.len().min(width.saturating_sub(1));
        self.buf.extend_from_slice(&raw[..n]);
        self.buf.resize(self.buf.len() + (width - n), 0);
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Overwrite an already-written i32 at `offset`
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
