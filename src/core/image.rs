//! Loaded images and the sequential reader decoders consume.
//!
//! `LoadedImage` pairs a base address with the raw bytes mapped there.
//! `ImageReader` is a forward-only cursor over one image: every successful
//! read advances it, failed reads leave it where it was.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::Address;

/// Byte order of multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "Little"),
            Endianness::Big => write!(f, "Big"),
        }
    }
}

/// Errors that can occur during image reads.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("address {0} is outside the image")]
    AddressOutOfImage(Address),
    #[error("read of {len} bytes at {address} runs past end of image")]
    OutOfRange { address: Address, len: usize },
}

/// Bytes mapped at a base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    base: Address,
    bytes: Vec<u8>,
}

impl LoadedImage {
    pub fn new(base: Address, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `addr` falls inside the mapped bytes.
    pub fn contains(&self, addr: &Address) -> bool {
        addr.value >= self.base.value && addr.value - self.base.value < self.bytes.len() as u64
    }

    /// Create a reader positioned at `addr`.
    pub fn create_reader(&self, addr: Address, endianness: Endianness) -> Result<ImageReader<'_>, ImageError> {
        // One past the end is a valid (empty) position.
        if addr.value < self.base.value || addr.value - self.base.value > self.bytes.len() as u64 {
            return Err(ImageError::AddressOutOfImage(addr));
        }
        let offset = (addr.value - self.base.value) as usize;
        Ok(ImageReader {
            image: self,
            offset,
            endianness,
        })
    }
}

/// Forward-only, endianness-aware cursor over a `LoadedImage`.
///
/// Not `Clone`: a reader belongs to exactly one decoding session. Start a
/// fresh one from the image to re-probe an address.
#[derive(Debug)]
pub struct ImageReader<'a> {
    image: &'a LoadedImage,
    offset: usize,
    endianness: Endianness,
}

impl<'a> ImageReader<'a> {
    /// Address of the next byte to be read.
    pub fn address(&self) -> Address {
        self.image.base.add_offset(self.offset as i64)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn image(&self) -> &'a LoadedImage {
        self.image
    }

    /// Bytes left between the cursor and the end of the image.
    pub fn remaining(&self) -> usize {
        self.image.bytes.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn slice(&self, delta: usize, len: usize) -> Result<&'a [u8], ImageError> {
        let start = self.offset.saturating_add(delta);
        let end = start.saturating_add(len);
        self.image
            .bytes
            .get(start..end)
            .ok_or(ImageError::OutOfRange {
                address: self.image.base.add_offset(start as i64),
                len,
            })
    }

    pub fn peek_u8(&self, delta: usize) -> Result<u8, ImageError> {
        Ok(self.slice(delta, 1)?[0])
    }

    pub fn peek_u16(&self, delta: usize) -> Result<u16, ImageError> {
        let b = self.slice(delta, 2)?;
        Ok(match self.endianness {
            Endianness::Little => u16::from_le_bytes([b[0], b[1]]),
            Endianness::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    pub fn peek_u32(&self, delta: usize) -> Result<u32, ImageError> {
        let b = self.slice(delta, 4)?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Endianness::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ImageError> {
        let b = self.slice(0, len)?;
        self.offset += len;
        Ok(b)
    }

    pub fn read_u8(&mut self) -> Result<u8, ImageError> {
        let v = self.peek_u8(0)?;
        self.offset += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, ImageError> {
        let v = self.peek_u16(0)?;
        self.offset += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, ImageError> {
        let v = self.peek_u32(0)?;
        self.offset += 4;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> LoadedImage {
        LoadedImage::new(Address::ptr32(0x1000), vec![0x01, 0x02, 0x03, 0x04, 0x05])
    }

    #[test]
    fn reads_advance_cursor() {
        let img = image();
        let mut rdr = img.create_reader(Address::ptr32(0x1000), Endianness::Little).unwrap();
        assert_eq!(rdr.read_u16().unwrap(), 0x0201);
        assert_eq!(rdr.address(), Address::ptr32(0x1002));
        assert_eq!(rdr.remaining(), 3);
    }

    #[test]
    fn big_endian_reads() {
        let img = image();
        let mut rdr = img.create_reader(Address::ptr32(0x1000), Endianness::Big).unwrap();
        assert_eq!(rdr.read_u32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn failed_read_leaves_cursor() {
        let img = image();
        let mut rdr = img.create_reader(Address::ptr32(0x1002), Endianness::Little).unwrap();
        assert!(matches!(rdr.read_u32(), Err(ImageError::OutOfRange { len: 4, .. })));
        assert_eq!(rdr.address(), Address::ptr32(0x1002));
    }

    #[test]
    fn reader_outside_image_is_rejected() {
        let img = image();
        assert_eq!(
            img.create_reader(Address::ptr32(0x0FFF), Endianness::Little).unwrap_err(),
            ImageError::AddressOutOfImage(Address::ptr32(0x0FFF))
        );
        let at_end = img.create_reader(Address::ptr32(0x1005), Endianness::Little).unwrap();
        assert!(at_end.is_at_end());
    }

    #[test]
    fn contains_checks_bounds() {
        let img = image();
        assert!(img.contains(&Address::ptr32(0x1004)));
        assert!(!img.contains(&Address::ptr32(0x1005)));
    }
}
