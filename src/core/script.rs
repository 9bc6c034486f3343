//! Bitcoin scripts
//!
//! A script is a list of commands, each an opcode or a data push. This module
//! parses and serializes the wire form, runs scripts through the interpreter,
//! and builds the standard P2PKH and P2SH locking scripts.

use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use super::encoding::{encode_varint, ByteReader, EncodingError};
use super::interpreter::{is_truthy, run_opcode, OpStack, MAX_ELEMENT_SIZE};
use super::opcodes::{opcode_name, OpCode};
use crate::crypto::base58::encode_base58_check;
use crate::crypto::hash::hash160;
use crate::crypto::keys::{decode_address, AddressKind};
use crate::params::Network;

const OP_DUP: u8 = OpCode::Dup.to_byte();
const OP_HASH160: u8 = OpCode::Hash160.to_byte();
const OP_EQUAL: u8 = OpCode::Equal.to_byte();
const OP_EQUALVERIFY: u8 = OpCode::EqualVerify.to_byte();
const OP_CHECKSIG: u8 = OpCode::CheckSig.to_byte();

// =============================================================================
// Script Errors
// =============================================================================

/// Script parsing and evaluation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("{op} needs {needed} stack items, found {available}")]
    StackUnderflow {
        op: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("Unsupported opcode: {0}")]
    UnsupportedOpcode(&'static str),
    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("{0} failed")]
    VerifyFailed(&'static str),
    #[error("OP_RETURN encountered")]
    OpReturn,
    #[error("Script number is {0} bytes, limit is 4")]
    NumberTooLong(usize),
    #[error("Invalid stack index: {0}")]
    InvalidStackIndex(i64),
    #[error("Invalid public key count: {0}")]
    InvalidKeyCount(i64),
    #[error("Invalid signature count: {0}")]
    InvalidSignatureCount(i64),
    #[error("Data push of {0} bytes exceeds 520")]
    PushTooLarge(usize),
    #[error("Script finished with an empty or false stack")]
    EvalFalse,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Script encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

// =============================================================================
// Commands
// =============================================================================

/// One script command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// An opcode byte
    Op(u8),
    /// Bytes pushed onto the stack
    Data(Vec<u8>),
}

impl From<OpCode> for Command {
    fn from(op: OpCode) -> Self {
        Command::Op(op.to_byte())
    }
}

/// A parsed script
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script {
    cmds: Vec<Command>,
}

impl Script {
    pub fn new(cmds: Vec<Command>) -> Self {
        Self { cmds }
    }

    pub fn cmds(&self) -> &[Command] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Parse a varint-length-prefixed script
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ScriptError> {
        let length = reader.read_length()?;
        let body = reader.read_bytes(length)?;
        Self::parse_raw(body)
    }

    /// Parse script bytes without a length prefix
    pub fn parse_raw(bytes: &[u8]) -> Result<Self, ScriptError> {
        let mut reader = ByteReader::new(bytes);
        let mut cmds = Vec::new();

        while reader.remaining() > 0 {
            let current = reader.read_u8()?;
            let push_len = match current {
                0x01..=0x4b => Some(current as usize),
                0x4c => Some(reader.read_u8()? as usize),
                0x4d => Some(reader.read_u16_le()? as usize),
                0x4e => Some(reader.read_u32_le()? as usize),
                _ => None,
            };
            match push_len {
                Some(len) => cmds.push(Command::Data(reader.read_bytes(len)?.to_vec())),
                None => cmds.push(Command::Op(current)),
            }
        }

        Ok(Self { cmds })
    }

    /// Script bytes without the length prefix, using the shortest push forms
    pub fn raw_serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Command::Op(byte) => out.push(*byte),
                Command::Data(data) => {
                    let len = data.len();
                    if len <= 0x4b {
                        out.push(len as u8);
                    } else if len <= 0xff {
                        out.push(OpCode::PushData1.to_byte());
                        out.push(len as u8);
                    } else if len <= 0xffff {
                        out.push(OpCode::PushData2.to_byte());
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    } else {
                        out.push(OpCode::PushData4.to_byte());
                        out.extend_from_slice(&(len as u32).to_le_bytes());
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// Length-prefixed wire form
    pub fn serialize(&self) -> Vec<u8> {
        let raw = self.raw_serialize();
        let mut out = encode_varint(raw.len() as u64);
        out.extend(raw);
        out
    }

    /// This script's commands followed by `other`'s
    pub fn combine(&self, other: &Script) -> Script {
        let mut cmds = self.cmds.clone();
        cmds.extend(other.cmds.iter().cloned());
        Script { cmds }
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Run the script against the signature hash `z`.
    ///
    /// Succeeds only if every command runs and the final stack top is true.
    pub fn execute(&self, z: &[u8; 32]) -> Result<(), ScriptError> {
        let mut cmds: VecDeque<Command> = self.cmds.iter().cloned().collect();
        let mut stack = OpStack::new();

        while let Some(cmd) = cmds.pop_front() {
            match cmd {
                Command::Op(byte) => {
                    let op = OpCode::from_byte(byte).ok_or(ScriptError::UnknownOpcode(byte))?;
                    log::debug!("{} (stack depth {})", op.name(), stack.len());
                    run_opcode(op, &mut stack, z)?;
                }
                Command::Data(data) => {
                    if data.len() > MAX_ELEMENT_SIZE {
                        return Err(ScriptError::PushTooLarge(data.len()));
                    }
                    match p2sh_tail(&cmds) {
                        Some(expected) => {
                            log::debug!("Evaluating P2SH redeem script");
                            let redeem = Script::parse_raw(&data)?;
                            stack.push(data);
                            run_opcode(OpCode::Hash160, &mut stack, z)?;
                            stack.push(expected);
                            run_opcode(OpCode::Equal, &mut stack, z)?;
                            run_opcode(OpCode::Verify, &mut stack, z)?;
                            cmds.clear();
                            cmds.extend(redeem.cmds);
                        }
                        None => stack.push(data),
                    }
                }
            }
        }

        match stack.top() {
            Some(top) if is_truthy(top) => Ok(()),
            _ => Err(ScriptError::EvalFalse),
        }
    }

    /// Boolean form of `execute`; failures are logged
    pub fn evaluate(&self, z: &[u8; 32]) -> bool {
        match self.execute(z) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Script evaluation failed: {}", e);
                false
            }
        }
    }

    // =========================================================================
    // Standard templates
    // =========================================================================

    pub fn is_p2pkh(&self) -> bool {
        matches!(
            self.cmds.as_slice(),
            [
                Command::Op(OP_DUP),
                Command::Op(OP_HASH160),
                Command::Data(h),
                Command::Op(OP_EQUALVERIFY),
                Command::Op(OP_CHECKSIG),
            ] if h.len() == 20
        )
    }

    pub fn is_p2sh(&self) -> bool {
        matches!(
            self.cmds.as_slice(),
            [Command::Op(OP_HASH160), Command::Data(h), Command::Op(OP_EQUAL)] if h.len() == 20
        )
    }

    /// The 20-byte hash a P2PKH or P2SH script pays to
    fn payee_hash(&self) -> Option<&[u8]> {
        match self.cmds.as_slice() {
            [_, _, Command::Data(h), _, _] if self.is_p2pkh() => Some(h.as_slice()),
            [_, Command::Data(h), _] if self.is_p2sh() => Some(h.as_slice()),
            _ => None,
        }
    }

    /// Base58 address for a standard output script
    pub fn address(&self, network: Network) -> Option<String> {
        let prefix = if self.is_p2pkh() {
            network.p2pkh_prefix()
        } else if self.is_p2sh() {
            network.p2sh_prefix()
        } else {
            return None;
        };
        let mut payload = vec![prefix];
        payload.extend_from_slice(self.payee_hash()?);
        Some(encode_base58_check(&payload))
    }

    /// Locking script paying to a base58 address
    pub fn from_address(address: &str) -> Result<Script, ScriptError> {
        let (_, kind, hash) =
            decode_address(address).map_err(|e| ScriptError::InvalidAddress(e.to_string()))?;
        Ok(match kind {
            AddressKind::P2pkh => p2pkh_script(&hash),
            AddressKind::P2sh => p2sh_script(&hash),
        })
    }

    /// Hash of the serialized script, as used by P2SH
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.raw_serialize())
    }
}

/// OP_DUP OP_HASH160 <h160> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script(h160: &[u8; 20]) -> Script {
    Script::new(vec![
        OpCode::Dup.into(),
        OpCode::Hash160.into(),
        Command::Data(h160.to_vec()),
        OpCode::EqualVerify.into(),
        OpCode::CheckSig.into(),
    ])
}

/// OP_HASH160 <h160> OP_EQUAL
pub fn p2sh_script(h160: &[u8; 20]) -> Script {
    Script::new(vec![
        OpCode::Hash160.into(),
        Command::Data(h160.to_vec()),
        OpCode::Equal.into(),
    ])
}

/// The expected hash when the remaining commands are exactly
/// `OP_HASH160 <20 bytes> OP_EQUAL`
fn p2sh_tail(cmds: &VecDeque<Command>) -> Option<Vec<u8>> {
    if cmds.len() != 3 {
        return None;
    }
    match (&cmds[0], &cmds[1], &cmds[2]) {
        (Command::Op(OP_HASH160), Command::Data(h), Command::Op(OP_EQUAL)) if h.len() == 20 => {
            Some(h.clone())
        }
        _ => None,
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .cmds
            .iter()
            .map(|cmd| match cmd {
                Command::Op(byte) => opcode_name(*byte),
                Command::Data(data) => hex::encode(data),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash256;
    use crate::crypto::keys::PrivateKey;
    use num_bigint::BigUint;

    fn sign_for_script(key: &PrivateKey, z: &[u8; 32]) -> Vec<u8> {
        let mut der = key.sign(&BigUint::from_bytes_be(z)).unwrap().der();
        der.push(0x01);
        der
    }

    #[test]
    fn test_parse_script_sig() {
        let bytes = hex::decode("6a47304402207899531a52d59a6de200179928ca900254a36b8dff8bb75f5f5d71b1cdc26125022008b422690b8461cb52c3cc30330b23d574351872b7c361e9aae3649071c1a7160121035d5c93d9ac96881f19ba1f686f15f009ded7c62efe85a872e6a19b43c15a2937").unwrap();
        let mut reader = ByteReader::new(&bytes);
        let script = Script::parse(&mut reader).unwrap();
        reader.finish().unwrap();

        assert_eq!(
            script.cmds()[0],
            Command::Data(hex::decode("304402207899531a52d59a6de200179928ca900254a36b8dff8bb75f5f5d71b1cdc26125022008b422690b8461cb52c3cc30330b23d574351872b7c361e9aae3649071c1a71601").unwrap())
        );
        assert_eq!(
            script.cmds()[1],
            Command::Data(hex::decode("035d5c93d9ac96881f19ba1f686f15f009ded7c62efe85a872e6a19b43c15a2937").unwrap())
        );
        assert_eq!(script.serialize(), bytes);
    }

    #[test]
    fn test_pushdata_forms() {
        for (len, marker) in [(75usize, None), (76, Some(0x4c)), (256, Some(0x4d)), (70_000, Some(0x4e))] {
            let script = Script::new(vec![Command::Data(vec![0xab; len])]);
            let raw = script.raw_serialize();
            match marker {
                None => assert_eq!(raw[0] as usize, len),
                Some(m) => assert_eq!(raw[0], m),
            }
            assert_eq!(Script::parse_raw(&raw).unwrap(), script);
        }
    }

    #[test]
    fn test_one_byte_push_is_data() {
        let script = Script::parse_raw(&[0x01, 0x76, 0x76]).unwrap();
        assert_eq!(
            script.cmds(),
            &[Command::Data(vec![0x76]), Command::Op(0x76)]
        );
    }

    #[test]
    fn test_parse_length_mismatch() {
        // Declares 3 bytes but the push needs 5
        let bytes = [0x03, 0x05, 0x01, 0x02];
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            Script::parse(&mut reader),
            Err(ScriptError::Encoding(EncodingError::UnexpectedEof { .. }))
        ));
    }

    #[test]
    fn test_display() {
        let script = p2pkh_script(&[0x11; 20]);
        assert_eq!(
            script.to_string(),
            format!("OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG", "11".repeat(20))
        );
    }

    #[test]
    fn test_p2pkh_evaluation() {
        let mut z = [0u8; 32];
        z.copy_from_slice(
            &hex::decode("7c076ff316692a3d7eb3c3bb0f8b1488cf72e1afcd929e29307032997a838a3d")
                .unwrap(),
        );
        let sec = hex::decode("04887387e452b8eacc4acfde10d9aaf7f6d9a0f975aabb10d006e4da568744d06c61de6d95231cd89026e286df3b6ae4a894a3378e393e93a0f45b666329a0ae34").unwrap();
        let sig = hex::decode("3045022000eff69ef2b1bd93a66ed5219add4fb51e11a840f404876325a1e8ffe0529a2c022100c7207fee197d27c618aea621406f6bf5ef6fca38681d82b2f06fddbdce6feab601").unwrap();

        let lock = p2pkh_script(&hash160(&sec));
        let unlock = |sig: &[u8], sec: &[u8]| {
            Script::new(vec![Command::Data(sig.to_vec()), Command::Data(sec.to_vec())])
        };

        assert!(unlock(&sig, &sec).combine(&lock).evaluate(&z));

        let mut bad_sig = sig.clone();
        bad_sig[10] ^= 0x01;
        assert!(!unlock(&bad_sig, &sec).combine(&lock).evaluate(&z));

        let mut bad_sec = sec.clone();
        bad_sec[10] ^= 0x01;
        assert!(matches!(
            unlock(&sig, &bad_sec).combine(&lock).execute(&z),
            Err(ScriptError::VerifyFailed("OP_EQUALVERIFY"))
        ));
    }

    #[test]
    fn test_p2sh_multisig() {
        let z = hash256(b"p2sh spend");
        let k1 = PrivateKey::generate().unwrap();
        let k2 = PrivateKey::generate().unwrap();

        let redeem = Script::new(vec![
            OpCode::Num2.into(),
            Command::Data(k1.point().sec(true)),
            Command::Data(k2.point().sec(true)),
            OpCode::Num2.into(),
            OpCode::CheckMultiSig.into(),
        ]);
        let lock = p2sh_script(&redeem.hash160());
        let unlock = Script::new(vec![
            OpCode::Zero.into(),
            Command::Data(sign_for_script(&k1, &z)),
            Command::Data(sign_for_script(&k2, &z)),
            Command::Data(redeem.raw_serialize()),
        ]);
        assert!(unlock.combine(&lock).evaluate(&z));

        let wrong_lock = p2sh_script(&[0u8; 20]);
        assert!(matches!(
            unlock.combine(&wrong_lock).execute(&z),
            Err(ScriptError::VerifyFailed("OP_VERIFY"))
        ));
    }

    #[test]
    fn test_failures() {
        let script = Script::new(vec![OpCode::Num1.into(), OpCode::If.into()]);
        assert_eq!(
            script.execute(&[0u8; 32]),
            Err(ScriptError::UnsupportedOpcode("OP_IF"))
        );

        let script = Script::new(vec![Command::Op(0xba)]);
        assert_eq!(script.execute(&[0u8; 32]), Err(ScriptError::UnknownOpcode(0xba)));

        assert_eq!(Script::default().execute(&[0u8; 32]), Err(ScriptError::EvalFalse));

        let script = Script::new(vec![OpCode::Zero.into()]);
        assert_eq!(script.execute(&[0u8; 32]), Err(ScriptError::EvalFalse));

        let script = Script::new(vec![Command::Data(vec![1; 521])]);
        assert_eq!(script.execute(&[0u8; 32]), Err(ScriptError::PushTooLarge(521)));
    }

    #[test]
    fn test_arithmetic_script() {
        // 2 3 ADD 5 EQUAL
        let script = Script::new(vec![
            OpCode::Num2.into(),
            OpCode::Num3.into(),
            OpCode::Add.into(),
            OpCode::Num5.into(),
            OpCode::Equal.into(),
        ]);
        assert!(script.evaluate(&[0u8; 32]));
    }

    #[test]
    fn test_address_templates() {
        let key = PrivateKey::new(BigUint::from(700227072u32)).unwrap();
        let script = p2pkh_script(&key.point().hash160(true));
        assert!(script.is_p2pkh());
        assert!(!script.is_p2sh());
        assert_eq!(
            script.address(Network::Testnet).unwrap(),
            "mieaqB68xDCtbUBYFoUNcmZNwk74xcBfTP"
        );
        assert_eq!(
            Script::from_address("148dY81A9BmdpMhvYEVznrM45kWN32vSCN").unwrap(),
            script
        );

        let p2sh = p2sh_script(&[0x22; 20]);
        assert!(p2sh.is_p2sh());
        let address = p2sh.address(Network::Mainnet).unwrap();
        assert!(address.starts_with('3'));
        assert_eq!(Script::from_address(&address).unwrap(), p2sh);

        assert_eq!(Script::new(vec![OpCode::Return.into()]).address(Network::Mainnet), None);
    }
}
