//! Binary object streaming.
//!
//! Composite objects bracket their payload as
//! `[StartObject][version:u16][fields...][EndObject]` so corruption is
//! caught at the bracket, not three fields later. Integers are written
//! little-endian; strings are length-prefixed UTF-8, never terminated.
//! Any marker mismatch, version mismatch, or short read is a hard
//! failure, never a partial read.

use alloc::string::String;
use alloc::vec::Vec;

/// Bracketing bytes written around composite payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamMarker {
    /// Opens a composite object's payload.
    StartObject = 0xB4,
    /// Closes a composite object's payload.
    EndObject = 0xB7,
    /// Opens a polymorphically-framed object (type name follows).
    Frame = 0xBA,
}

/// Errors raised while reading a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream ended before the requested bytes.
    ShortRead {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes remaining in the stream.
        available: usize,
    },
    /// An expected marker byte was not found.
    BadMarker {
        /// Marker the reader expected.
        expected: StreamMarker,
        /// Byte actually read.
        found: u8,
    },
    /// A format-version tag the reader does not know how to read.
    UnknownVersion {
        /// Type being read.
        type_name: &'static str,
        /// Version found in the stream.
        found: u16,
        /// Newest version the reader supports.
        supported: u16,
    },
    /// A length-prefixed string held invalid UTF-8.
    BadString,
    /// Bytes remained in the stream after a read that should have
    /// consumed it entirely.
    TrailingData {
        /// Unconsumed bytes left over.
        remaining: usize,
    },
}

impl core::fmt::Display for StreamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StreamError::ShortRead { needed, available } => {
                write!(f, "short read: needed {} bytes, {} available", needed, available)
            }
            StreamError::BadMarker { expected, found } => {
                write!(f, "expected {:?} marker, found {:#04x}", expected, found)
            }
            StreamError::UnknownVersion {
                type_name,
                found,
                supported,
            } => write!(
                f,
                "unknown format version {} for '{}' (supported up to {})",
                found, type_name, supported
            ),
            StreamError::BadString => write!(f, "string field is not valid UTF-8"),
            StreamError::TrailingData { remaining } => {
                write!(f, "{} unconsumed bytes after object payload", remaining)
            }
        }
    }
}

/// Growable binary output stream.
#[derive(Default)]
pub struct BinOutStream {
    buf: Vec<u8>,
}

impl BinOutStream {
    pub fn new() -> Self {
        BinOutStream { buf: Vec::new() }
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the stream, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_marker(&mut self, marker: StreamMarker) {
        self.buf.push(marker as u8);
    }

    /// Write a composite's format-version tag.
    pub fn write_version(&mut self, version: u16) {
        self.write_u16(version);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length-prefixed UTF-8 string. The length prefix is u32;
    /// longer strings cannot be represented on the wire.
    pub fn write_string(&mut self, value: &str) {
        assert!(
            value.len() <= u32::MAX as usize,
            "string length {} exceeds the u32 prefix range",
            value.len()
        );
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write raw bytes with no length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }
}

/// Binary input stream over a borrowed byte slice.
pub struct BinInStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinInStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinInStream { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StreamError> {
        if self.remaining() < count {
            return Err(StreamError::ShortRead {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Consume one byte and require it to be the given marker.
    pub fn check_marker(&mut self, expected: StreamMarker) -> Result<(), StreamError> {
        let found = self.read_u8()?;
        if found != expected as u8 {
            return Err(StreamError::BadMarker { expected, found });
        }
        Ok(())
    }

    /// Consume the format-version tag and require it to be one the
    /// caller supports. Checked before any field is read so a mismatch
    /// never leaves the target half-overwritten.
    pub fn check_version(
        &mut self,
        type_name: &'static str,
        supported: u16,
    ) -> Result<u16, StreamError> {
        let found = self.read_u16()?;
        if found == 0 || found > supported {
            return Err(StreamError::UnknownVersion {
                type_name,
                found,
                supported,
            });
        }
        Ok(found)
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, StreamError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, StreamError> {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, StreamError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, StreamError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, StreamError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        core::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| StreamError::BadString)
    }

    /// Read exactly `buf.len()` raw bytes.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let bytes = self.take(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    /// Require the stream to be fully consumed. Leftover bytes after a
    /// complete read mean the writer and reader disagree on the layout.
    pub fn finish(&self) -> Result<(), StreamError> {
        if self.remaining() > 0 {
            return Err(StreamError::TrailingData {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

/// The binary streaming contract. `stream_to` writes the object's
/// persisted state; `stream_from` overwrites it by reading the same
/// layout back.
pub trait Streamable {
    fn stream_to(&self, out: &mut BinOutStream);
    fn stream_from(&mut self, input: &mut BinInStream<'_>) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut out = BinOutStream::new();
        out.write_u8(0xAB);
        out.write_u16(0x1234);
        out.write_u32(0xDEADBEEF);
        out.write_u64(0x0102030405060708);
        out.write_i32(-42);
        out.write_bool(true);
        out.write_string("Ferrox");

        let bytes = out.into_bytes();
        let mut input = BinInStream::new(&bytes);
        assert_eq!(input.read_u8().unwrap(), 0xAB);
        assert_eq!(input.read_u16().unwrap(), 0x1234);
        assert_eq!(input.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(input.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(input.read_i32().unwrap(), -42);
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_string().unwrap(), "Ferrox");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_signed_and_float_round_trip() {
        let mut out = BinOutStream::new();
        out.write_i8(-100);
        out.write_i16(-30_000);
        out.write_i64(i64::MIN);
        out.write_f32(core::f32::consts::PI);
        out.write_f64(-2.5e300);
        out.write_f64(f64::NAN);

        let bytes = out.into_bytes();
        let mut input = BinInStream::new(&bytes);
        assert_eq!(input.read_i8().unwrap(), -100);
        assert_eq!(input.read_i16().unwrap(), -30_000);
        assert_eq!(input.read_i64().unwrap(), i64::MIN);
        assert_eq!(input.read_f32().unwrap(), core::f32::consts::PI);
        assert_eq!(input.read_f64().unwrap(), -2.5e300);
        // NaN keeps its bit pattern through the stream
        assert!(input.read_f64().unwrap().is_nan());
        input.finish().unwrap();
    }

    #[test]
    fn test_trailing_data_reported() {
        let mut out = BinOutStream::new();
        out.write_u16(7);
        out.write_u8(0xEE);
        let bytes = out.into_bytes();

        let mut input = BinInStream::new(&bytes);
        assert_eq!(input.read_u16().unwrap(), 7);
        let err = input.finish().unwrap_err();
        assert_eq!(err, StreamError::TrailingData { remaining: 1 });
        assert_eq!(input.read_u8().unwrap(), 0xEE);
        input.finish().unwrap();
    }

    #[test]
    fn test_little_endian_layout() {
        let mut out = BinOutStream::new();
        out.write_u16(0x0102);
        assert_eq!(out.as_bytes(), &[0x02, 0x01]);
    }

    #[test]
    fn test_short_read_reported() {
        let mut input = BinInStream::new(&[0x01, 0x02]);
        let err = input.read_u32().unwrap_err();
        assert_eq!(
            err,
            StreamError::ShortRead {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_marker_mismatch_reported() {
        let mut out = BinOutStream::new();
        out.write_marker(StreamMarker::EndObject);
        let bytes = out.into_bytes();
        let mut input = BinInStream::new(&bytes);
        let err = input.check_marker(StreamMarker::StartObject).unwrap_err();
        assert_eq!(
            err,
            StreamError::BadMarker {
                expected: StreamMarker::StartObject,
                found: 0xB7
            }
        );
    }

    #[test]
    fn test_version_gate() {
        let mut out = BinOutStream::new();
        out.write_version(3);
        let bytes = out.into_bytes();

        let mut input = BinInStream::new(&bytes);
        assert_eq!(input.check_version("Widget", 3).unwrap(), 3);

        let mut input = BinInStream::new(&bytes);
        let err = input.check_version("Widget", 2).unwrap_err();
        assert_eq!(
            err,
            StreamError::UnknownVersion {
                type_name: "Widget",
                found: 3,
                supported: 2
            }
        );
    }

    #[test]
    fn test_bad_utf8_string_rejected() {
        let mut out = BinOutStream::new();
        out.write_u32(2);
        out.write_bytes(&[0xFF, 0xFE]);
        let bytes = out.into_bytes();
        let mut input = BinInStream::new(&bytes);
        assert_eq!(input.read_string().unwrap_err(), StreamError::BadString);
    }
}
