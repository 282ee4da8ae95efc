//! # Packet Codec
//!
//! Fixed-offset pack/unpack of scalar fields and raw byte spans.
//!
//! ## Design
//!
//! - Native byte order, no conversion (the simulator speaks host order)
//! - Fields are laid out back to back, no padding beyond their natural size
//! - Every access is bounds-checked; overruns are `BufferBounds` errors
//! - Strings are written as raw bytes, callers add a NUL where the wire needs one

use bytemuck::{bytes_of, Pod};

use crate::error::{XPlaneError, XPlaneResult};

/// A value that can be laid into a packet.
///
/// Every `Pod` scalar or array is a field; so are raw byte spans and strings.
pub trait WireField {
    /// Bytes of the field exactly as they go on the wire.
    fn wire_bytes(&self) -> &[u8];
}

impl<T: Pod> WireField for T {
    #[inline]
    fn wire_bytes(&self) -> &[u8] {
        bytes_of(self)
    }
}

impl WireField for [u8] {
    #[inline]
    fn wire_bytes(&self) -> &[u8] {
        self
    }
}

impl WireField for str {
    #[inline]
    fn wire_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[inline]
fn check_bounds(offset: usize, len: usize, capacity: usize) -> XPlaneResult<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(end),
        _ => Err(XPlaneError::BufferBounds { offset, len, capacity }),
    }
}

/// Writes one field at `offset` and returns the offset just past it.
pub fn pack<F: WireField + ?Sized>(buffer: &mut [u8], offset: usize, field: &F) -> XPlaneResult<usize> {
    let bytes = field.wire_bytes();
    let end = check_bounds(offset, bytes.len(), buffer.len())?;
    buffer[offset..end].copy_from_slice(bytes);
    Ok(end)
}

/// Reads one field at `offset`, returning it with the offset just past it.
pub fn unpack<T: Pod>(buffer: &[u8], offset: usize) -> XPlaneResult<(T, usize)> {
    let end = check_bounds(offset, std::mem::size_of::<T>(), buffer.len())?;
    // The wire gives no alignment guarantee
    let value = bytemuck::pod_read_unaligned(&buffer[offset..end]);
    Ok((value, end))
}

/// Reads `len` raw bytes at `offset`.
pub fn unpack_bytes(buffer: &[u8], offset: usize, len: usize) -> XPlaneResult<(&[u8], usize)> {
    let end = check_bounds(offset, len, buffer.len())?;
    Ok((&buffer[offset..end], end))
}

/// Sequential writer over a caller-sized buffer.
///
/// ```rust,ignore
/// let mut buf = [0u8; 13];
/// let end = PacketWriter::new(&mut buf).put(b"RREF\0")?.put(&1i32)?.put(&7i32)?.position();
/// ```
pub struct PacketWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> PacketWriter<'a> {
    /// Creates a writer positioned at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self::at(buffer, 0)
    }

    /// Creates a writer positioned at `offset`.
    #[must_use]
    pub fn at(buffer: &'a mut [u8], offset: usize) -> Self {
        Self { buffer, position: offset }
    }

    /// Offset of the next write.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Writes a field and advances.
    #[inline]
    pub fn put<F: WireField + ?Sized>(&mut self, field: &F) -> XPlaneResult<&mut Self> {
        self.position = pack(self.buffer, self.position, field)?;
        Ok(self)
    }

    /// Writes `bytes` into a fixed-width field.
    ///
    /// Input longer than `width - 1` is truncated so at least one NUL remains;
    /// the rest of the field is zero-filled.
    pub fn put_fixed(&mut self, bytes: &[u8], width: usize) -> XPlaneResult<&mut Self> {
        let end = check_bounds(self.position, width, self.buffer.len())?;
        let keep = bytes.len().min(width.saturating_sub(1));
        let field = &mut self.buffer[self.position..end];
        field[..keep].copy_from_slice(&bytes[..keep]);
        field[keep..].fill(0);
        self.position = end;
        Ok(self)
    }
}

/// Sequential reader over a received datagram.
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self::at(buffer, 0)
    }

    /// Creates a reader positioned at `offset`.
    #[must_use]
    pub const fn at(buffer: &'a [u8], offset: usize) -> Self {
        Self { buffer, position: offset }
    }

    /// Offset of the next read.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads a field and advances.
    #[inline]
    pub fn get<T: Pod>(&mut self) -> XPlaneResult<T> {
        let (value, end) = unpack(self.buffer, self.position)?;
        self.position = end;
        Ok(value)
    }

    /// Reads `len` raw bytes and advances.
    #[inline]
    pub fn get_bytes(&mut self, len: usize) -> XPlaneResult<&'a [u8]> {
        let (bytes, end) = unpack_bytes(self.buffer, self.position, len)?;
        self.position = end;
        Ok(bytes)
    }

    /// Consumes everything left.
    #[inline]
    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.position.min(self.buffer.len());
        self.position = self.buffer.len();
        &self.buffer[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_fields_round_trip() {
        let mut buf = [0u8; 32];
        let mut writer = PacketWriter::at(&mut buf, 3);
        writer.put(&7u8).unwrap().put(&-42i32).unwrap().put(&3.5f32).unwrap().put(&65_000u16).unwrap();
        writer.put(&-1.25f64).unwrap();
        assert_eq!(writer.position(), 3 + 1 + 4 + 4 + 2 + 8);

        let mut reader = PacketReader::at(&buf, 3);
        assert_eq!(reader.get::<u8>().unwrap(), 7);
        assert_eq!(reader.get::<i32>().unwrap(), -42);
        assert_eq!(reader.get::<f32>().unwrap(), 3.5);
        assert_eq!(reader.get::<u16>().unwrap(), 65_000);
        assert_eq!(reader.get::<f64>().unwrap(), -1.25);
    }

    fn round_trip_everywhere<T: Pod + PartialEq + std::fmt::Debug>(value: T) {
        const LEN: usize = 16;
        let width = std::mem::size_of::<T>();
        for offset in 0..=LEN - width {
            let mut buf = [0u8; LEN];
            let end = pack(&mut buf, offset, &value).unwrap();
            assert_eq!(end, offset + width);
            assert_eq!(unpack::<T>(&buf, offset).unwrap(), (value, end), "offset {offset}");
        }

        // Last byte of the field on the last byte of the buffer, then one past it
        let mut buf = [0u8; LEN];
        assert_eq!(pack(&mut buf, LEN - width, &value).unwrap(), LEN);
        assert_eq!(unpack::<T>(&buf, LEN - width).unwrap(), (value, LEN));
        let past = LEN - width + 1;
        assert!(matches!(
            pack(&mut buf, past, &value),
            Err(XPlaneError::BufferBounds { offset, len, capacity: LEN }) if offset == past && len == width
        ));
        assert!(matches!(unpack::<T>(&buf, past), Err(XPlaneError::BufferBounds { .. })));
    }

    #[test]
    fn test_round_trip_at_every_offset() {
        round_trip_everywhere(0xA5u8);
        round_trip_everywhere(54_321u16);
        round_trip_everywhere(-7_654_321i32);
        round_trip_everywhere(3.25f32);
        round_trip_everywhere(-47.123_456_789f64);
    }

    #[test]
    fn test_native_byte_order() {
        let mut buf = [0u8; 4];
        pack(&mut buf, 0, &0x0102_0304i32).unwrap();
        assert_eq!(buf, 0x0102_0304i32.to_ne_bytes());
    }

    #[test]
    fn test_string_packed_without_terminator() {
        let mut buf = [0xFFu8; 6];
        let end = pack(&mut buf, 1, "abc").unwrap();
        assert_eq!(end, 4);
        assert_eq!(&buf, &[0xFF, b'a', b'b', b'c', 0xFF, 0xFF]);
    }

    #[test]
    fn test_pack_out_of_bounds() {
        let mut buf = [0u8; 6];
        let err = pack(&mut buf, 3, &1i32).unwrap_err();
        assert!(matches!(err, XPlaneError::BufferBounds { offset: 3, len: 4, capacity: 6 }));
        // Nothing was written
        assert_eq!(buf, [0u8; 6]);
    }

    #[test]
    fn test_unpack_out_of_bounds() {
        let buf = [0u8; 7];
        assert!(unpack::<f32>(&buf, 3).is_ok());
        assert!(matches!(unpack::<f32>(&buf, 4), Err(XPlaneError::BufferBounds { .. })));
        assert!(matches!(unpack::<u8>(&buf, usize::MAX), Err(XPlaneError::BufferBounds { .. })));
    }

    #[test]
    fn test_fixed_width_truncates_and_pads() {
        let mut buf = [0xAAu8; 8];
        PacketWriter::new(&mut buf).put_fixed(b"abcdefgh", 5).unwrap();
        assert_eq!(&buf[..5], b"abcd\0");
        assert_eq!(buf[5], 0xAA);

        let mut buf = [0xAAu8; 6];
        PacketWriter::new(&mut buf).put_fixed(b"ab", 6).unwrap();
        assert_eq!(&buf, b"ab\0\0\0\0");
    }

    #[test]
    fn test_reader_rest_and_remaining() {
        let buf = *b"RREF\0tail";
        let mut reader = PacketReader::new(&buf);
        assert_eq!(reader.get_bytes(5).unwrap(), b"RREF\0");
        assert_eq!(reader.remaining(), 4);
        assert_eq!(reader.rest(), b"tail");
        assert_eq!(reader.remaining(), 0);
        assert!(reader.get::<u8>().is_err());
    }
}
