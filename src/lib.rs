//! Mini-Bitcoin: the cryptographic and validation core of a Bitcoin node
//!
//! This crate provides:
//! - Prime field and elliptic curve arithmetic, generic over the field type
//! - secp256k1 ECDSA with RFC6979 nonces, DER and SEC codecs, WIF and addresses
//! - A Bitcoin script interpreter with P2PKH, P2SH and multisig support
//! - Transaction parsing, signature hashing, signing and verification
//! - Merkle roots, partial merkle tree reconstruction and merkle block checks
//!
//! # Example
//!
//! ```rust
//! use mini_bitcoin::crypto::PrivateKey;
//! use mini_bitcoin::params::Network;
//! use num_bigint::BigUint;
//!
//! let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
//! let z = BigUint::from(0x1234u32);
//! let sig = key.sign(&z).unwrap();
//! assert!(key.point().verify(&z, &sig));
//!
//! println!("Address: {}", key.point().address(true, Network::Testnet));
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod params;

// Re-export commonly used types
pub use core::{
    BlockHeader, MerkleBlock, Script, ScriptError, Transaction, TransactionError, TxCache,
    TxFetcher, TxInput, TxOutput,
};
pub use crypto::{FieldElement, MerkleTree, Point, PrivateKey, S256Point, Signature};
pub use params::Network;
