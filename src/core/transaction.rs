//! Bitcoin transactions
//!
//! Parsing and serialization of the legacy wire format, fee calculation,
//! SIGHASH_ALL signature hashes and per-input script verification.
//! Previous outputs are resolved through an injected [`TxFetcher`].

use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

use super::encoding::{encode_varint, ByteReader, EncodingError};
use super::fetcher::{FetchError, TxFetcher};
use super::script::{Command, Script, ScriptError};
use crate::crypto::hash::{hash256, reversed};
use crate::crypto::keys::{KeyError, PrivateKey};
use crate::params::Network;

// =============================================================================
// Constants
// =============================================================================

/// Signature hash type committing to every input and output
pub const SIGHASH_ALL: u32 = 1;

/// Default input sequence number
pub const SEQUENCE_FINAL: u32 = 0xFFFFFFFF;

/// Previous output index used by coinbase inputs
pub const COINBASE_INDEX: u32 = 0xFFFFFFFF;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Input index {index} out of range ({count} inputs)")]
    InputIndexOutOfRange { index: usize, count: usize },
    #[error("Previous transaction {tx_id} has no output {index}")]
    MissingPrevOutput { tx_id: String, index: u32 },
    #[error("Unsupported segwit flag: 0x{0:02x}")]
    UnsupportedSegwitFlag(u8),
    #[error("Amount overflow while summing values")]
    ValueOverflow,
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input spending a previous output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Previous transaction hash, display order
    pub prev_tx: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxInput {
    /// Input with an empty unlocking script and a final sequence
    pub fn new(prev_tx: [u8; 32], prev_index: u32) -> Self {
        Self {
            prev_tx,
            prev_index,
            script_sig: Script::default(),
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, TransactionError> {
        let prev_tx = reader.read_hash()?;
        let prev_index = reader.read_u32_le()?;
        let script_sig = Script::parse(reader)?;
        let sequence = reader.read_u32_le()?;
        Ok(Self {
            prev_tx,
            prev_index,
            script_sig,
            sequence,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with_script(&self.script_sig)
    }

    fn serialize_with_script(&self, script: &Script) -> Vec<u8> {
        let mut out = reversed(&self.prev_tx).to_vec();
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend(script.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out
    }

    pub fn prev_tx_hex(&self) -> String {
        hex::encode(self.prev_tx)
    }

    /// The output this input spends
    pub fn prev_output(
        &self,
        fetcher: &dyn TxFetcher,
        network: Network,
    ) -> Result<TxOutput, TransactionError> {
        let prev = fetcher.fetch(&self.prev_tx, network)?;
        prev.outputs
            .get(self.prev_index as usize)
            .cloned()
            .ok_or_else(|| TransactionError::MissingPrevOutput {
                tx_id: self.prev_tx_hex(),
                index: self.prev_index,
            })
    }

    /// Amount of the spent output in satoshis
    pub fn value(&self, fetcher: &dyn TxFetcher, network: Network) -> Result<u64, TransactionError> {
        Ok(self.prev_output(fetcher, network)?.amount)
    }

    /// Locking script of the spent output
    pub fn script_pubkey(
        &self,
        fetcher: &dyn TxFetcher,
        network: Network,
    ) -> Result<Script, TransactionError> {
        Ok(self.prev_output(fetcher, network)?.script_pubkey)
    }
}

impl fmt::Display for TxInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prev_tx_hex(), self.prev_index)
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Amount in satoshis
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOutput {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, TransactionError> {
        let amount = reader.read_u64_le()?;
        let script_pubkey = Script::parse(reader)?;
        Ok(Self {
            amount,
            script_pubkey,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.amount.to_le_bytes().to_vec();
        out.extend(self.script_pubkey.serialize());
        out
    }
}

impl fmt::Display for TxOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.amount, self.script_pubkey)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A Bitcoin transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
    /// Network used to resolve previous outputs
    pub network: Network,
}

impl Transaction {
    pub fn new(
        version: u32,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        locktime: u32,
        network: Network,
    ) -> Self {
        Self {
            version,
            inputs,
            outputs,
            locktime,
            network,
        }
    }

    /// Parse a transaction.
    ///
    /// The segwit form (marker 0x00, flag 0x01) is accepted; its witness data
    /// is skipped, so the result serializes and hashes as a legacy transaction.
    pub fn parse(reader: &mut ByteReader<'_>, network: Network) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le()?;

        let segwit = reader.peek_u8() == Some(0x00);
        if segwit {
            reader.read_u8()?;
            let flag = reader.read_u8()?;
            if flag != 0x01 {
                return Err(TransactionError::UnsupportedSegwitFlag(flag));
            }
        }

        let input_count = reader.read_length()?;
        let inputs = (0..input_count)
            .map(|_| TxInput::parse(reader))
            .collect::<Result<Vec<_>, _>>()?;

        let output_count = reader.read_length()?;
        let outputs = (0..output_count)
            .map(|_| TxOutput::parse(reader))
            .collect::<Result<Vec<_>, _>>()?;

        if segwit {
            for _ in 0..inputs.len() {
                let items = reader.read_length()?;
                for _ in 0..items {
                    let len = reader.read_length()?;
                    reader.read_bytes(len)?;
                }
            }
        }

        let locktime = reader.read_u32_le()?;

        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
            network,
        })
    }

    /// Parse a complete transaction from raw bytes, rejecting trailing data
    pub fn from_bytes(bytes: &[u8], network: Network) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::parse(&mut reader, network)?;
        reader.finish()?;
        Ok(tx)
    }

    pub fn from_hex(raw: &str, network: Network) -> Result<Self, TransactionError> {
        let bytes = super::encoding::decode_hex(raw)?;
        Self::from_bytes(&bytes, network)
    }

    /// Legacy serialization
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.version.to_le_bytes().to_vec();
        out.extend(encode_varint(self.inputs.len() as u64));
        for input in &self.inputs {
            out.extend(input.serialize());
        }
        self.serialize_tail(&mut out);
        out
    }

    fn serialize_tail(&self, out: &mut Vec<u8>) {
        out.extend(encode_varint(self.outputs.len() as u64));
        for output in &self.outputs {
            out.extend(output.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
    }

    /// Transaction hash in display order
    pub fn hash(&self) -> [u8; 32] {
        reversed(&hash256(&self.serialize()))
    }

    /// Transaction id (hex of `hash`)
    pub fn id(&self) -> String {
        hex::encode(self.hash())
    }

    fn input(&self, index: usize) -> Result<&TxInput, TransactionError> {
        self.inputs
            .get(index)
            .ok_or(TransactionError::InputIndexOutOfRange {
                index,
                count: self.inputs.len(),
            })
    }

    /// Input total minus output total, in satoshis
    pub fn fee(&self, fetcher: &dyn TxFetcher) -> Result<i64, TransactionError> {
        let mut input_sum: u64 = 0;
        for input in &self.inputs {
            input_sum = input_sum
                .checked_add(input.value(fetcher, self.network)?)
                .ok_or(TransactionError::ValueOverflow)?;
        }
        let output_sum = self
            .outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
            .ok_or(TransactionError::ValueOverflow)?;

        i64::try_from(input_sum as i128 - output_sum as i128)
            .map_err(|_| TransactionError::ValueOverflow)
    }

    /// SIGHASH_ALL signature hash for input `index`.
    ///
    /// The signed input carries `redeem_script` when given, otherwise the
    /// locking script of the output it spends. All other inputs are blanked.
    pub fn sig_hash(
        &self,
        index: usize,
        fetcher: &dyn TxFetcher,
        redeem_script: Option<&Script>,
    ) -> Result<[u8; 32], TransactionError> {
        let signed = self.input(index)?;
        let script = match redeem_script {
            Some(redeem) => redeem.clone(),
            None => signed.script_pubkey(fetcher, self.network)?,
        };
        let empty = Script::default();

        let mut out = self.version.to_le_bytes().to_vec();
        out.extend(encode_varint(self.inputs.len() as u64));
        for (i, input) in self.inputs.iter().enumerate() {
            let script_sig = if i == index { &script } else { &empty };
            out.extend(input.serialize_with_script(script_sig));
        }
        self.serialize_tail(&mut out);
        out.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

        Ok(hash256(&out))
    }

    /// Run input `index`'s unlocking script against the output it spends
    pub fn verify_input(
        &self,
        index: usize,
        fetcher: &dyn TxFetcher,
    ) -> Result<bool, TransactionError> {
        let input = self.input(index)?;
        let script_pubkey = input.script_pubkey(fetcher, self.network)?;

        let redeem = if script_pubkey.is_p2sh() {
            match input.script_sig.cmds().last() {
                Some(Command::Data(raw)) => match Script::parse_raw(raw) {
                    Ok(redeem) => Some(redeem),
                    Err(e) => {
                        log::warn!("Input {} has a malformed redeem script: {}", index, e);
                        return Ok(false);
                    }
                },
                _ => {
                    log::warn!("Input {} spends P2SH without a redeem script", index);
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let z = self.sig_hash(index, fetcher, redeem.as_ref())?;
        let combined = input.script_sig.combine(&script_pubkey);
        match combined.execute(&z) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::warn!("Input {} of {} failed: {}", index, self.id(), e);
                Ok(false)
            }
        }
    }

    /// Check the fee is not negative and every input verifies
    pub fn verify(&self, fetcher: &dyn TxFetcher) -> Result<bool, TransactionError> {
        let fee = self.fee(fetcher)?;
        if fee < 0 {
            log::warn!("Transaction {} spends more than its inputs (fee {})", self.id(), fee);
            return Ok(false);
        }
        for index in 0..self.inputs.len() {
            if !self.verify_input(index, fetcher)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign input `index` as a P2PKH spend with a compressed public key.
    ///
    /// Returns whether the input verifies afterwards.
    pub fn sign_input(
        &mut self,
        index: usize,
        key: &PrivateKey,
        fetcher: &dyn TxFetcher,
    ) -> Result<bool, TransactionError> {
        let z = self.sig_hash(index, fetcher, None)?;
        let mut der = key.sign(&BigUint::from_bytes_be(&z))?.der();
        der.push(SIGHASH_ALL as u8);
        let sec = key.point().sec(true);

        self.inputs[index].script_sig = Script::new(vec![Command::Data(der), Command::Data(sec)]);
        log::debug!("Signed input {} of {}", index, self.id());
        self.verify_input(index, fetcher)
    }

    pub fn is_coinbase(&self) -> bool {
        match self.inputs.as_slice() {
            [input] => input.prev_tx == [0u8; 32] && input.prev_index == COINBASE_INDEX,
            _ => false,
        }
    }

    /// Block height committed in a coinbase scriptSig (BIP34)
    pub fn coinbase_height(&self) -> Option<u64> {
        if !self.is_coinbase() {
            return None;
        }
        match self.inputs[0].script_sig.cmds().first() {
            Some(Command::Data(bytes)) if bytes.len() <= 8 => Some(
                bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, &b| (acc << 8) | b as u64),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tx: {}", self.id())?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "inputs:")?;
        for input in &self.inputs {
            writeln!(f, "  {}", input)?;
        }
        writeln!(f, "outputs:")?;
        for output in &self.outputs {
            writeln!(f, "  {}", output)?;
        }
        write!(f, "locktime: {}", self.locktime)
    }
}
