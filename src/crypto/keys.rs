//! Private keys and ECDSA signing
//!
//! Provides key generation, RFC 6979 deterministic signing with low-S
//! normalisation, WIF import/export and address decoding.

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

use super::base58::{decode_base58_check, encode_base58_check, Base58Error};
use super::field::FieldError;
use super::point::PointError;
use super::secp256k1::{curve, to_bytes32, S256Point};
use super::signature::Signature;
use crate::params::Network;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Secret must be in range [1, N-1]")]
    SecretOutOfRange,
    #[error("Malformed public key: {0}")]
    MalformedPublicKey(String),
    #[error("Invalid WIF: {0}")]
    InvalidWif(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Signing produced the point at infinity")]
    DegenerateNonce,
    #[error("HMAC error: {0}")]
    Hmac(String),
    #[error("Base58 error: {0}")]
    Base58(#[from] Base58Error),
    #[error("Point error: {0}")]
    Point(#[from] PointError),
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
}

/// A secp256k1 private key and its public point
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateKey {
    secret: BigUint,
    point: S256Point,
}

impl PrivateKey {
    /// Create a key from a secret in [1, N-1]
    pub fn new(secret: BigUint) -> Result<Self, KeyError> {
        if secret.is_zero() || secret >= curve().n {
            return Err(KeyError::SecretOutOfRange);
        }
        let point = S256Point::generator().mul(&secret)?;
        Ok(Self { secret, point })
    }

    /// Generate a new random key from the OS RNG
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; 32];
        loop {
            OsRng.fill_bytes(&mut bytes);
            let secret = BigUint::from_bytes_be(&bytes);
            if !secret.is_zero() && secret < curve().n {
                return Self::new(secret);
            }
        }
    }

    pub fn secret(&self) -> &BigUint {
        &self.secret
    }

    pub fn point(&self) -> &S256Point {
        &self.point
    }

    /// The secret as 64 hex characters
    pub fn secret_hex(&self) -> String {
        hex::encode(to_bytes32(&self.secret))
    }

    /// Sign the message hash `z`, producing a low-S signature
    pub fn sign(&self, z: &BigUint) -> Result<Signature, KeyError> {
        let n = &curve().n;
        let k = self.deterministic_k(z)?;
        let r = S256Point::generator()
            .mul(&k)?
            .x()
            .cloned()
            .ok_or(KeyError::DegenerateNonce)?;

        let k_inv = k.modpow(&(n - BigUint::from(2u32)), n);
        let mut s = ((z + &r * &self.secret) * k_inv) % n;
        if s > (n >> 1) {
            s = n - &s;
        }

        Ok(Signature::new(r, s))
    }

    /// RFC 6979 nonce derivation with HMAC-SHA256
    fn deterministic_k(&self, z: &BigUint) -> Result<BigUint, KeyError> {
        let n = &curve().n;
        let z = if z > n { z - n } else { z.clone() };
        let z_bytes = to_bytes32(&z);
        let secret_bytes = to_bytes32(&self.secret);

        let mut k = [0u8; 32];
        let mut v = [1u8; 32];
        k = hmac_sha256(&k, &[&v[..], &[0x00], &secret_bytes[..], &z_bytes[..]])?;
        v = hmac_sha256(&k, &[&v[..]])?;
        k = hmac_sha256(&k, &[&v[..], &[0x01], &secret_bytes[..], &z_bytes[..]])?;
        v = hmac_sha256(&k, &[&v[..]])?;

        loop {
            v = hmac_sha256(&k, &[&v[..]])?;
            let candidate = BigUint::from_bytes_be(&v);
            if candidate >= BigUint::one() && &candidate < n {
                return Ok(candidate);
            }
            log::debug!("Nonce candidate out of range, retrying");
            k = hmac_sha256(&k, &[&v[..], &[0x00]])?;
            v = hmac_sha256(&k, &[&v[..]])?;
        }
    }

    /// Wallet Import Format
    pub fn wif(&self, compressed: bool, network: Network) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(network.wif_prefix());
        payload.extend_from_slice(&to_bytes32(&self.secret));
        if compressed {
            payload.push(0x01);
        }
        encode_base58_check(&payload)
    }

    /// Decode a WIF string into the key, its compressed flag and its network
    pub fn from_wif(wif: &str) -> Result<(Self, bool, Network), KeyError> {
        let payload = decode_base58_check(wif)?;
        let network = Network::from_wif_prefix(payload[0])
            .ok_or_else(|| KeyError::InvalidWif(format!("unknown prefix 0x{:02x}", payload[0])))?;

        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            len => return Err(KeyError::InvalidWif(format!("unexpected length {}", len))),
        };

        let key = Self::new(BigUint::from_bytes_be(&payload[1..33]))?;
        Ok((key, compressed, network))
    }
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 32], KeyError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| KeyError::Hmac(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// The kind of output a base58 address pays to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

/// Decode a base58check address into its network, kind and 20-byte hash
pub fn decode_address(address: &str) -> Result<(Network, AddressKind, [u8; 20]), KeyError> {
    let payload = decode_base58_check(address)?;
    if payload.len() != 21 {
        return Err(KeyError::InvalidAddress(format!(
            "payload is {} bytes, expected 21",
            payload.len()
        )));
    }

    let (network, kind) = [Network::Mainnet, Network::Testnet]
        .into_iter()
        .find_map(|net| {
            if payload[0] == net.p2pkh_prefix() {
                Some((net, AddressKind::P2pkh))
            } else if payload[0] == net.p2sh_prefix() {
                Some((net, AddressKind::P2sh))
            } else {
                None
            }
        })
        .ok_or_else(|| KeyError::InvalidAddress(format!("unknown prefix 0x{:02x}", payload[0])))?;

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok((network, kind, hash))
}
