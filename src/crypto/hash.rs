//! Cryptographic hashing utilities
//!
//! SHA-256, RIPEMD-160 and the two Bitcoin compositions built from them:
//! hash256 (double SHA-256, used for transaction ids, block hashes, merkle
//! nodes and checksums) and hash160 (SHA-256 then RIPEMD-160, used for
//! public key and script hashes).

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes RIPEMD-160 hash of the input data
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// SHA-256 followed by RIPEMD-160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn hash256_hex(data: &[u8]) -> String {
    hex::encode(hash256(data))
}

/// Returns a copy of a 32-byte hash with its byte order reversed.
///
/// Hashes travel little-endian on the wire and are displayed big-endian.
pub fn reversed(hash: &[u8; 32]) -> [u8; 32] {
    let mut out = *hash;
    out.reverse();
    out
}
