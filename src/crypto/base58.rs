//! Base58Check encoding
//!
//! Payload followed by the first four bytes of its hash256, rendered in the
//! Bitcoin base58 alphabet.

use thiserror::Error;

use super::hash::hash256;

/// Errors that can occur while decoding base58check strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("Invalid base58 string: {0}")]
    InvalidEncoding(String),
    #[error("Base58 payload too short: {0} bytes")]
    TooShort(usize),
    #[error("Bad checksum: expected {expected}, got {actual}")]
    BadChecksum { expected: String, actual: String },
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = hash256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Encode a payload with an appended hash256 checksum
pub fn encode_base58_check(payload: &[u8]) -> String {
    let mut bytes = payload.to_vec();
    bytes.extend_from_slice(&checksum(payload));
    bs58::encode(bytes).into_string()
}

/// Decode a base58check string, verify its checksum and return the payload
/// (version byte included)
pub fn decode_base58_check(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let mut bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Base58Error::InvalidEncoding(e.to_string()))?;
    if bytes.len() < 5 {
        return Err(Base58Error::TooShort(bytes.len()));
    }

    let split = bytes.len() - 4;
    let actual = checksum(&bytes[..split]);
    if bytes[split..] != actual {
        return Err(Base58Error::BadChecksum {
            expected: hex::encode(actual),
            actual: hex::encode(&bytes[split..]),
        });
    }

    bytes.truncate(split);
    Ok(bytes)
}
