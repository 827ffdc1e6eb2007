//! Positional binary wire format for state, events and sync frames
//!
//! Every record encodes its fields in a fixed order with no field names or
//! type metadata on the wire; both sides must agree on the layout. All
//! integers are little-endian. Variable-size values (strings, byte blobs,
//! lists, nested blocks) carry a u32 length prefix.

use bytes::{Buf, BufMut, BytesMut};

use crate::math::{Fp, FpQuat, FpTransform, FpVec2, FpVec3};

/// Decode failures. Encoding is infallible.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of buffer: needed {needed} more bytes, had {had}")]
    UnexpectedEof { needed: usize, had: usize },

    #[error("invalid tag {tag} for {kind}")]
    InvalidTag { kind: &'static str, tag: u32 },

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    #[error("length prefix {len} exceeds remaining buffer {remaining}")]
    BadLength { len: usize, remaining: usize },

    #[error("{0} trailing bytes after decode")]
    TrailingBytes(usize),
}

/// Types that serialize themselves onto a [`Writer`].
pub trait Encode {
    fn encode(&self, w: &mut Writer);
}

/// Types that parse themselves from a [`Reader`].
pub trait Decode: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError>;
}

/// Serialize a value into a fresh byte vector.
pub fn encode_to_vec<T: Encode>(value: &T) -> Vec<u8> {
    let mut w = Writer::new();
    value.encode(&mut w);
    w.into_vec()
}

/// Parse a value from a slice, requiring the slice be fully consumed.
pub fn decode_from_slice<T: Decode>(bytes: &[u8]) -> Result<T, WireError> {
    let mut r = Reader::new(bytes);
    let value = T::decode(&mut r)?;
    r.expect_end()?;
    Ok(value)
}

/// Append-only encode buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Writer {
        Writer {
            buf: BytesMut::new(),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.freeze().to_vec()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn put_str(&mut self, s: &str) {
        self.buf.put_u32_le(s.len() as u32);
        self.buf.put_slice(s.as_bytes());
    }

    pub fn put_byte_blob(&mut self, b: &[u8]) {
        self.buf.put_u32_le(b.len() as u32);
        self.buf.put_slice(b);
    }

    /// Write a length-prefixed nested block. The length is backpatched
    /// after the closure runs so callers never size anything up front.
    pub fn put_block(&mut self, f: impl FnOnce(&mut Writer)) {
        let at = self.buf.len();
        self.buf.put_u32_le(0);
        f(self);
        let len = (self.buf.len() - at - 4) as u32;
        self.buf[at..at + 4].copy_from_slice(&len.to_le_bytes());
    }
}

/// Cursor over an encoded slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn expect_end(&self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.buf.len()))
        }
    }

    fn need(&self, n: usize) -> Result<(), WireError> {
        if self.buf.remaining() < n {
            Err(WireError::UnexpectedEof {
                needed: n,
                had: self.buf.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_i64(&mut self) -> Result<i64, WireError> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_str(&mut self) -> Result<String, WireError> {
        let bytes = self.get_span()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }

    pub fn get_byte_blob(&mut self) -> Result<Vec<u8>, WireError> {
        Ok(self.get_span()?.to_vec())
    }

    /// Enter a length-prefixed nested block, returning a sub-reader limited
    /// to it. The outer reader advances past the whole block.
    pub fn get_block(&mut self) -> Result<Reader<'a>, WireError> {
        Ok(Reader::new(self.get_span()?))
    }

    fn get_span(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.get_u32()? as usize;
        if len > self.buf.len() {
            return Err(WireError::BadLength {
                len,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}

impl Encode for u8 {
    fn encode(&self, w: &mut Writer) {
        w.put_u8(*self);
    }
}

impl Decode for u8 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_u8()
    }
}

impl Encode for u16 {
    fn encode(&self, w: &mut Writer) {
        w.put_u16(*self);
    }
}

impl Decode for u16 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_u16()
    }
}

impl Encode for u32 {
    fn encode(&self, w: &mut Writer) {
        w.put_u32(*self);
    }
}

impl Decode for u32 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_u32()
    }
}

impl Encode for u64 {
    fn encode(&self, w: &mut Writer) {
        w.put_u64(*self);
    }
}

impl Decode for u64 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_u64()
    }
}

impl Encode for bool {
    fn encode(&self, w: &mut Writer) {
        w.put_bool(*self);
    }
}

impl Decode for bool {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_bool()
    }
}

impl Encode for String {
    fn encode(&self, w: &mut Writer) {
        w.put_str(self);
    }
}

impl Decode for String {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.get_str()
    }
}

impl Encode for uuid::Uuid {
    fn encode(&self, w: &mut Writer) {
        w.buf.put_slice(self.as_bytes());
    }
}

impl Decode for uuid::Uuid {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.need(16)?;
        let mut raw = [0u8; 16];
        r.buf.copy_to_slice(&mut raw);
        Ok(uuid::Uuid::from_bytes(raw))
    }
}

impl Encode for Fp {
    fn encode(&self, w: &mut Writer) {
        w.put_i64(self.raw());
    }
}

impl Decode for Fp {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Fp::from_raw(r.get_i64()?))
    }
}

impl Encode for FpVec2 {
    fn encode(&self, w: &mut Writer) {
        self.x.encode(w);
        self.y.encode(w);
    }
}

impl Decode for FpVec2 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(FpVec2::new(Fp::decode(r)?, Fp::decode(r)?))
    }
}

impl Encode for FpVec3 {
    fn encode(&self, w: &mut Writer) {
        self.x.encode(w);
        self.y.encode(w);
        self.z.encode(w);
    }
}

impl Decode for FpVec3 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(FpVec3::new(Fp::decode(r)?, Fp::decode(r)?, Fp::decode(r)?))
    }
}

impl Encode for FpQuat {
    fn encode(&self, w: &mut Writer) {
        self.x.encode(w);
        self.y.encode(w);
        self.z.encode(w);
        self.w.encode(w);
    }
}

impl Decode for FpQuat {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(FpQuat::new(
            Fp::decode(r)?,
            Fp::decode(r)?,
            Fp::decode(r)?,
            Fp::decode(r)?,
        ))
    }
}

impl Encode for FpTransform {
    fn encode(&self, w: &mut Writer) {
        self.position.encode(w);
        self.rotation.encode(w);
        self.scale.encode(w);
    }
}

impl Decode for FpTransform {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(FpTransform::new(
            FpVec3::decode(r)?,
            FpQuat::decode(r)?,
            FpVec3::decode(r)?,
        ))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut Writer) {
        w.put_u32(self.len() as u32);
        for item in self {
            item.encode(w);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let count = r.get_u32()? as usize;
        // an element takes at least one byte, so a bogus count fails fast
        if count > r.remaining() {
            return Err(WireError::BadLength {
                len: count,
                remaining: r.remaining(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut Writer) {
        match self {
            None => w.put_u8(0),
            Some(v) => {
                w.put_u8(1);
                v.encode(w);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        match r.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            tag => Err(WireError::InvalidTag {
                kind: "Option",
                tag: tag as u32,
            }),
        }
    }
}
