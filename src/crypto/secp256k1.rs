//! The secp256k1 curve
//!
//! Curve constants live in a process-wide `LazyLock` built once on first use.
//! `S256Point` wraps a generic `Point<FieldElement>` and adds what only makes
//! sense on this curve: scalars reduced mod N, ECDSA verification, SEC
//! encoding and address derivation.

use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;
use std::sync::LazyLock;

use super::base58::encode_base58_check;
use super::field::{FieldElement, FieldInteger};
use super::hash::hash160;
use super::keys::KeyError;
use super::point::{Point, PointError};
use super::signature::Signature;
use crate::params::Network;

// =============================================================================
// Curve constants
// =============================================================================

#[rustfmt::skip]
const P_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

#[rustfmt::skip]
const N_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

#[rustfmt::skip]
const GX_BYTES: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac,
    0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9,
    0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

#[rustfmt::skip]
const GY_BYTES: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65,
    0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19,
    0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

const B: u32 = 7;

/// secp256k1 domain parameters
#[derive(Debug)]
pub struct Secp256k1 {
    /// Field prime
    pub p: BigUint,
    /// Group order
    pub n: BigUint,
    /// Generator
    pub g: S256Point,
    a: FieldElement,
    b: FieldElement,
}

static CURVE: LazyLock<Secp256k1> = LazyLock::new(Secp256k1::init);

impl Secp256k1 {
    fn init() -> Self {
        let p = BigUint::from_bytes_be(&P_BYTES);
        let n = BigUint::from_bytes_be(&N_BYTES);
        let a = FieldElement::reduced(BigUint::zero(), p.clone());
        let b = FieldElement::reduced(BigUint::from(B), p.clone());
        let gx = FieldElement::reduced(BigUint::from_bytes_be(&GX_BYTES), p.clone());
        let gy = FieldElement::reduced(BigUint::from_bytes_be(&GY_BYTES), p.clone());
        let g = S256Point(Point::from_affine_unchecked(gx, gy, a.clone(), b.clone()));
        log::debug!("secp256k1 parameters initialised");
        Self { p, n, g, a, b }
    }
}

/// The shared secp256k1 parameters
pub fn curve() -> &'static Secp256k1 {
    &CURVE
}

/// Left-pad a big-endian integer to 32 bytes
pub(crate) fn to_bytes32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(32);
    out[start..].copy_from_slice(&bytes[skip..]);
    out
}

// =============================================================================
// S256Point
// =============================================================================

/// A point on secp256k1
#[derive(Debug, Clone, PartialEq)]
pub struct S256Point(Point<FieldElement>);

impl S256Point {
    /// Create a point from affine coordinates, checking curve membership
    pub fn new(x: BigUint, y: BigUint) -> Result<Self, PointError> {
        let c = curve();
        let x = FieldElement::new(x, c.p.clone())?;
        let y = FieldElement::new(y, c.p.clone())?;
        Ok(Self(Point::new(x, y, c.a.clone(), c.b.clone())?))
    }

    pub fn infinity() -> Self {
        let c = curve();
        Self(Point::infinity(c.a.clone(), c.b.clone()))
    }

    /// The generator G
    pub fn generator() -> Self {
        curve().g.clone()
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_infinity()
    }

    pub fn x(&self) -> Option<&BigUint> {
        self.0.x().map(FieldElement::value)
    }

    pub fn y(&self) -> Option<&BigUint> {
        self.0.y().map(FieldElement::value)
    }

    pub fn add(&self, other: &Self) -> Result<Self, PointError> {
        Ok(Self(self.0.add(&other.0)?))
    }

    /// Scalar multiplication with the scalar reduced mod N
    pub fn mul(&self, scalar: &BigUint) -> Result<Self, PointError> {
        let coefficient = scalar % &curve().n;
        Ok(Self(self.0.scale(&coefficient)?))
    }

    /// Check an ECDSA signature of the message hash `z` against this key.
    ///
    /// Arithmetic failures count as an invalid signature.
    pub fn verify(&self, z: &BigUint, sig: &Signature) -> bool {
        match self.try_verify(z, sig) {
            Ok(valid) => valid,
            Err(e) => {
                log::warn!("Signature verification aborted: {}", e);
                false
            }
        }
    }

    fn try_verify(&self, z: &BigUint, sig: &Signature) -> Result<bool, PointError> {
        let n = &curve().n;
        if sig.r().is_zero() || sig.s().is_zero() || sig.r() >= n || sig.s() >= n {
            return Ok(false);
        }

        let s_inv = sig.s().modpow(&(n - BigUint::from(2u32)), n);
        let u = (z * &s_inv) % n;
        let v = (sig.r() * &s_inv) % n;
        let total = curve().g.mul(&u)?.add(&self.mul(&v)?)?;

        Ok(total.x() == Some(sig.r()))
    }

    /// SEC encoding; the point at infinity encodes as a single 0x00
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let (x, y) = match (self.x(), self.y()) {
            (Some(x), Some(y)) => (x, y),
            _ => return vec![0x00],
        };

        if compressed {
            let prefix = if y.bit(0) { 0x03 } else { 0x02 };
            let mut out = Vec::with_capacity(33);
            out.push(prefix);
            out.extend_from_slice(&to_bytes32(x));
            out
        } else {
            let mut out = Vec::with_capacity(65);
            out.push(0x04);
            out.extend_from_slice(&to_bytes32(x));
            out.extend_from_slice(&to_bytes32(y));
            out
        }
    }

    /// Decode SEC bytes (compressed or uncompressed)
    pub fn parse(sec: &[u8]) -> Result<Self, KeyError> {
        let malformed = |why: &str| KeyError::MalformedPublicKey(why.to_string());

        match sec.first() {
            Some(0x04) => {
                if sec.len() != 65 {
                    return Err(malformed("uncompressed key must be 65 bytes"));
                }
                let x = BigUint::from_bytes_be(&sec[1..33]);
                let y = BigUint::from_bytes_be(&sec[33..65]);
                Self::new(x, y).map_err(|e| malformed(&e.to_string()))
            }
            Some(&prefix @ (0x02 | 0x03)) => {
                if sec.len() != 33 {
                    return Err(malformed("compressed key must be 33 bytes"));
                }
                let c = curve();
                let x = FieldElement::new(BigUint::from_bytes_be(&sec[1..]), c.p.clone())
                    .map_err(|e| malformed(&e.to_string()))?;

                // y² = x³ + 7
                let alpha = x.pow(3).add(&c.b)?;
                let beta = alpha.sqrt();
                if beta.pow(2) != alpha {
                    return Err(malformed("x is not on the curve"));
                }

                let want_odd = prefix == 0x03;
                let y = if beta.value().bit(0) == want_odd {
                    beta
                } else {
                    beta.neg()
                };
                Ok(Self(Point::from_affine_unchecked(x, y, c.a.clone(), c.b.clone())))
            }
            _ => Err(malformed("unknown SEC prefix")),
        }
    }

    /// hash160 of the SEC encoding
    pub fn hash160(&self, compressed: bool) -> [u8; 20] {
        hash160(&self.sec(compressed))
    }

    /// Base58Check P2PKH address for this key
    pub fn address(&self, compressed: bool, network: Network) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(network.p2pkh_prefix());
        payload.extend_from_slice(&self.hash160(compressed));
        encode_base58_check(&payload)
    }
}

impl fmt::Display for S256Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "S256Point({:064x},{:064x})", x, y),
            _ => write!(f, "S256Point(infinity)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(hex: &str) -> BigUint {
        BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_generator_on_curve() {
        let g = S256Point::generator();
        let checked = S256Point::new(g.x().unwrap().clone(), g.y().unwrap().clone()).unwrap();
        assert_eq!(checked, g);
    }

    #[test]
    fn test_order() {
        let product = S256Point::generator().0.scale(&curve().n).unwrap();
        assert!(product.is_infinity());
        assert!(S256Point::generator().mul(&curve().n).unwrap().is_infinity());
    }

    #[test]
    fn test_public_points() {
        let cases = [
            (
                "7",
                "5cbdf0646e5db4eaa398f365f2ea7a0e3d419b7e0330e39ce92bddedcac4f9bc",
                "6aebca40ba255960a3178d6d861a54dba813d0b813fde7b5a5082628087264da",
            ),
            (
                "5cd",
                "c982196a7466fbbbb0e27a940b6af926c1a74d5ad07128c82824a11b5398afda",
                "7a91f9eae64438afb9ce6448a1c133db2d8fb9254e4546b6f001637d50901f55",
            ),
            (
                "100000000000000000000000000000000",
                "8f68b9d2f63b5f339239c1ad981f162ee88c5678723ea3351b7b444c9ec4c0da",
                "662a9f2dba063986de1d90c2b6be215dbbea2cfe95510bfdf23cbf79501fff82",
            ),
            (
                "1000000000000000000000000000000000000000000000000000080000000",
                "9577ff57c8234558f293df502ca4f09cbc65a6572c842b39b366f21717945116",
                "10b49c67fa9365ad7b90dab070be339a1daf9052373ec30ffae4f72d5e66d053",
            ),
        ];
        for (secret, x, y) in cases {
            let point = S256Point::generator().mul(&big(secret)).unwrap();
            assert_eq!(point, S256Point::new(big(x), big(y)).unwrap());
        }
    }

    #[test]
    fn test_verify() {
        let point = S256Point::new(
            big("887387e452b8eacc4acfde10d9aaf7f6d9a0f975aabb10d006e4da568744d06c"),
            big("61de6d95231cd89026e286df3b6ae4a894a3378e393e93a0f45b666329a0ae34"),
        )
        .unwrap();

        let z = big("ec208baa0fc1c19f708a9ca96fdeff3ac3f230bb4a7ba4aede4942ad003c0f60");
        let sig = Signature::new(
            big("ac8d1c87e51d0d441be8b3dd5b05c8795b48875dffe00b7ffcfac23010d3a395"),
            big("68342ceff8935ededd102dd876ffd6ba72d6a427a3edb13d26eb0781cb423c4"),
        );
        assert!(point.verify(&z, &sig));

        let z = big("7c076ff316692a3d7eb3c3bb0f8b1488cf72e1afcd929e29307032997a838a3d");
        let sig = Signature::new(
            big("eff69ef2b1bd93a66ed5219add4fb51e11a840f404876325a1e8ffe0529a2c"),
            big("c7207fee197d27c618aea621406f6bf5ef6fca38681d82b2f06fddbdce6feab6"),
        );
        assert!(point.verify(&z, &sig));
        assert!(!point.verify(&(z + 1u32), &sig));
    }

    #[test]
    fn test_sec() {
        let cases = [
            (
                "3b6d0ef7", // 997002999
                "049d5ca49670cbe4c3bfa84c96a8c87df086c6ea6a24ba6b809c9de234496808d56fa15cc7f3d38cda98dee2419f415b7513dde1301f8643cd9245aea7f3f911f9",
                "039d5ca49670cbe4c3bfa84c96a8c87df086c6ea6a24ba6b809c9de234496808d5",
            ),
            (
                "7b", // 123
                "04a598a8030da6d86c6bc7f2f5144ea549d28211ea58faa70ebf4c1e665c1fe9b5204b5d6f84822c307e4b4a7140737aec23fc63b65b35f86a10026dbd2d864e6b",
                "03a598a8030da6d86c6bc7f2f5144ea549d28211ea58faa70ebf4c1e665c1fe9b5",
            ),
            (
                "28757b2", // 42424242
                "04aee2e7d843f7430097859e2bc603abcc3274ff8169c1a469fee0f20614066f8e21ec53f40efac47ac1c5211b2123527e0e9b57ede790c4da1e72c91fb7da54a3",
                "03aee2e7d843f7430097859e2bc603abcc3274ff8169c1a469fee0f20614066f8e",
            ),
        ];
        for (secret, uncompressed, compressed) in cases {
            let point = S256Point::generator().mul(&big(secret)).unwrap();
            assert_eq!(hex::encode(point.sec(false)), uncompressed);
            assert_eq!(hex::encode(point.sec(true)), compressed);
            assert_eq!(S256Point::parse(&point.sec(false)).unwrap(), point);
            assert_eq!(S256Point::parse(&point.sec(true)).unwrap(), point);
        }
    }

    #[test]
    fn test_sec_even_y() {
        let point = S256Point::generator().mul(&BigUint::from(7u32)).unwrap();
        let sec = point.sec(true);
        assert_eq!(sec[0], 0x02);
        assert_eq!(S256Point::parse(&sec).unwrap(), point);
    }

    #[test]
    fn test_sec_malformed() {
        assert_eq!(S256Point::infinity().sec(true), vec![0x00]);
        assert!(S256Point::parse(&[0x00]).is_err());
        assert!(S256Point::parse(&[]).is_err());
        assert!(S256Point::parse(&[0x02; 32]).is_err());
        assert!(S256Point::parse(&[0x04; 33]).is_err());
        // x = 5 has no matching y on secp256k1
        let mut sec = vec![0x02];
        sec.extend_from_slice(&to_bytes32(&BigUint::from(5u32)));
        assert!(S256Point::parse(&sec).is_err());
    }

    #[test]
    fn test_address() {
        let cases = [
            (
                "29bc9e00", // 700227072
                true,
                "148dY81A9BmdpMhvYEVznrM45kWN32vSCN",
                "mieaqB68xDCtbUBYFoUNcmZNwk74xcBfTP",
            ),
            (
                "141", // 321
                false,
                "1S6g2xBJSED7Qr9CYZib5f4PYVhHZiVfj",
                "mfx3y63A7TfTtXKkv7Y6QzsPFY6QCBCXiP",
            ),
            (
                "fcde41b2", // 4242424242
                false,
                "1226JSptcStqn4Yq9aAmNXdwdc2ixuH9nb",
                "mgY3bVusRUL6ZB2Ss999CSrGVbdRwVpM8s",
            ),
        ];
        for (secret, compressed, mainnet, testnet) in cases {
            let point = S256Point::generator().mul(&big(secret)).unwrap();
            assert_eq!(point.address(compressed, Network::Mainnet), mainnet);
            assert_eq!(point.address(compressed, Network::Testnet), testnet);
        }
    }

    #[test]
    fn test_to_bytes32() {
        assert_eq!(to_bytes32(&BigUint::from(1u32))[31], 1);
        assert_eq!(to_bytes32(&BigUint::zero()), [0u8; 32]);
    }
}
