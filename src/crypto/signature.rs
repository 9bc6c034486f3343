//! ECDSA signatures and their DER encoding

use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding a signature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),
}

/// An ECDSA signature (r, s)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Self { r, s }
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// DER encoding: 0x30 len 0x02 rlen r 0x02 slen s
    pub fn der(&self) -> Vec<u8> {
        let mut body = der_integer(&self.r);
        body.extend(der_integer(&self.s));

        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(0x30);
        out.push(body.len() as u8);
        out.extend(body);
        out
    }

    /// Decode a DER signature, requiring every declared length to match
    pub fn parse(der: &[u8]) -> Result<Self, SignatureError> {
        let malformed = |why: &str| SignatureError::Malformed(why.to_string());

        if der.len() < 2 || der[0] != 0x30 {
            return Err(malformed("bad signature header"));
        }
        if der[1] as usize + 2 != der.len() {
            return Err(malformed("bad signature length"));
        }

        let (r, rest) = read_der_integer(&der[2..]).ok_or_else(|| malformed("bad r value"))?;
        let (s, rest) = read_der_integer(rest).ok_or_else(|| malformed("bad s value"))?;
        if !rest.is_empty() {
            return Err(malformed("signature too long"));
        }

        Ok(Self { r, s })
    }
}

fn der_integer(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    // A set high bit would read as negative
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(0x02);
    out.push(bytes.len() as u8);
    out.extend(bytes);
    out
}

/// Reads `0x02 len value` and returns the integer and the remaining bytes
fn read_der_integer(bytes: &[u8]) -> Option<(BigUint, &[u8])> {
    if *bytes.first()? != 0x02 {
        return None;
    }
    let len = *bytes.get(1)? as usize;
    let value = bytes.get(2..2 + len)?;
    Some((BigUint::from_bytes_be(value), &bytes[2 + len..]))
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:x},{:x})", self.r, self.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_scalar() -> BigUint {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        BigUint::from_bytes_be(&bytes)
    }

    #[test]
    fn test_der_roundtrip() {
        let cases = [
            (BigUint::from(1u32), BigUint::from(2u32)),
            (BigUint::from(0x80u32), BigUint::from(0x7fu32)),
            (random_scalar(), random_scalar()),
            (random_scalar(), random_scalar()),
        ];
        for (r, s) in cases {
            let sig = Signature::new(r, s);
            assert_eq!(Signature::parse(&sig.der()).unwrap(), sig);
        }
    }

    #[test]
    fn test_high_bit_padding() {
        let sig = Signature::new(BigUint::from(0x80u32), BigUint::from(1u32));
        assert_eq!(hex::encode(sig.der()), "300702020080020101");
    }

    #[test]
    fn test_parse_known() {
        let der = hex::decode(
            "3045022000eff69ef2b1bd93a66ed5219add4fb51e11a840f404876325a1e8ffe0529a2c022100c7207fee197d27c618aea621406f6bf5ef6fca38681d82b2f06fddbdce6feab6",
        )
        .unwrap();
        let sig = Signature::parse(&der).unwrap();
        assert_eq!(
            format!("{:x}", sig.r()),
            "eff69ef2b1bd93a66ed5219add4fb51e11a840f404876325a1e8ffe0529a2c"
        );
        assert_eq!(
            format!("{:x}", sig.s()),
            "c7207fee197d27c618aea621406f6bf5ef6fca38681d82b2f06fddbdce6feab6"
        );
    }

    #[test]
    fn test_malformed() {
        let good = Signature::new(BigUint::from(5u32), BigUint::from(9u32)).der();

        let mut bad_header = good.clone();
        bad_header[0] = 0x31;
        assert!(Signature::parse(&bad_header).is_err());

        let mut bad_length = good.clone();
        bad_length[1] += 1;
        assert!(Signature::parse(&bad_length).is_err());

        let mut bad_marker = good.clone();
        bad_marker[2] = 0x03;
        assert!(Signature::parse(&bad_marker).is_err());

        let mut trailing = good.clone();
        trailing[1] += 1;
        trailing.push(0x00);
        assert!(Signature::parse(&trailing).is_err());

        assert!(Signature::parse(&good[..good.len() - 1]).is_err());
        assert!(Signature::parse(&[]).is_err());
    }
}
