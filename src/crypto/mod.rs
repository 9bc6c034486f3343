//! Cryptographic primitives
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing and the hash160 / hash256 compositions
//! - Base58Check encoding
//! - Prime field and elliptic curve arithmetic
//! - secp256k1 ECDSA (signing, verification, SEC and DER codecs, WIF)
//! - Merkle root calculation and partial merkle tree reconstruction

pub mod base58;
pub mod field;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod point;
pub mod secp256k1;
pub mod signature;

pub use base58::{decode_base58_check, encode_base58_check, Base58Error};
pub use field::{FieldElement, FieldError, FieldInteger};
pub use hash::{hash160, hash256, hash256_hex, reversed, ripemd160, sha256};
pub use keys::{decode_address, AddressKind, KeyError, PrivateKey};
pub use merkle::{
    bit_field_to_bytes, bytes_to_bit_field, merkle_parent, merkle_parent_level, merkle_root,
    MerkleError, MerkleTree, TraversalFault,
};
pub use point::{Point, PointError};
pub use secp256k1::{curve, S256Point, Secp256k1};
pub use signature::{Signature, SignatureError};
