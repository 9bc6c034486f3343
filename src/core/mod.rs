//! Transaction and script validation
//!
//! This module contains the consensus-facing building blocks:
//! - Wire encoding (little-endian integers, varints, byte cursor)
//! - Script opcodes, stack machine and script evaluation (P2PKH, P2SH, multisig)
//! - Transactions (parsing, signature hashes, signing and verification)
//! - Previous-transaction lookup with a file-backed cache
//! - SPV support (block headers, merkle blocks)

pub mod encoding;
pub mod fetcher;
pub mod interpreter;
pub mod opcodes;
pub mod script;
pub mod spv;
pub mod transaction;

pub use encoding::{decode_hex, encode_varint, ByteReader, EncodingError};
pub use fetcher::{CacheConfig, FetchError, TxCache, TxFetcher};
pub use interpreter::{decode_num, encode_num, is_truthy, run_opcode, OpStack};
pub use opcodes::{opcode_name, OpCode};
pub use script::{p2pkh_script, p2sh_script, Command, Script, ScriptError};
pub use spv::{BlockHeader, MerkleBlock};
pub use transaction::{
    Transaction, TransactionError, TxInput, TxOutput, COINBASE_INDEX, SEQUENCE_FINAL, SIGHASH_ALL,
};
