//! Bitcoin wire encoding helpers
//!
//! Little-endian integers, CompactSize varints and a cursor over a byte
//! slice for parsing transactions, scripts and block headers.

use thiserror::Error;

/// Errors produced while decoding wire data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },
    #[error("{0} trailing bytes after the end of the structure")]
    TrailingBytes(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Length {0} does not fit in memory")]
    LengthOverflow(u64),
}

/// Decode a hex string into bytes
pub fn decode_hex(input: &str) -> Result<Vec<u8>, EncodingError> {
    hex::decode(input.trim()).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

/// Encode an integer as a CompactSize varint (1, 3, 5 or 9 bytes)
pub fn encode_varint(value: u64) -> Vec<u8> {
    match value {
        0..=0xfc => vec![value as u8],
        0xfd..=0xffff => {
            let mut out = vec![0xfd];
            out.extend_from_slice(&(value as u16).to_le_bytes());
            out
        }
        0x1_0000..=0xffff_ffff => {
            let mut out = vec![0xfe];
            out.extend_from_slice(&(value as u32).to_le_bytes());
            out
        }
        _ => {
            let mut out = vec![0xff];
            out.extend_from_slice(&value.to_le_bytes());
            out
        }
    }
}

/// A forward-only cursor over wire bytes
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], EncodingError> {
        if self.remaining() < len {
            return Err(EncodingError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, EncodingError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, EncodingError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, EncodingError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, EncodingError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read 32 raw bytes without changing their order
    pub fn read_array32(&mut self) -> Result<[u8; 32], EncodingError> {
        self.read_array()
    }

    /// Read a 32-byte hash stored little-endian and return it in display order
    pub fn read_hash(&mut self) -> Result<[u8; 32], EncodingError> {
        let mut hash = self.read_array::<32>()?;
        hash.reverse();
        Ok(hash)
    }

    pub fn read_varint(&mut self) -> Result<u64, EncodingError> {
        match self.read_u8()? {
            0xfd => Ok(self.read_u16_le()? as u64),
            0xfe => Ok(self.read_u32_le()? as u64),
            0xff => self.read_u64_le(),
            n => Ok(n as u64),
        }
    }

    /// Read a varint and convert it to a length
    pub fn read_length(&mut self) -> Result<usize, EncodingError> {
        let len = self.read_varint()?;
        usize::try_from(len).map_err(|_| EncodingError::LengthOverflow(len))
    }

    /// Fail if any bytes remain unread
    pub fn finish(&self) -> Result<(), EncodingError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(EncodingError::TrailingBytes(n)),
        }
    }
}
