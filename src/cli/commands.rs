//! CLI commands for the bitcoin tool
//!
//! Implements all command handlers for the CLI interface.

use crate::core::{
    decode_hex, CacheConfig, MerkleBlock, Script, Transaction, TxCache, TxFetcher,
};
use crate::crypto::PrivateKey;
use crate::params::Network;
use num_bigint::BigUint;
use num_traits::Num;
use std::path::PathBuf;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub cache: TxCache,
    pub network: Network,
}

impl AppState {
    /// Open the transaction cache
    pub fn new(cache_file: PathBuf, network: Network) -> CliResult<Self> {
        let cache = TxCache::open(CacheConfig { cache_file })?;
        Ok(Self { cache, network })
    }

    /// Save the cache
    pub fn save(&self) -> CliResult<()> {
        self.cache.save()?;
        Ok(())
    }
}

/// Parse a secret given in decimal or as 0x-prefixed hex
pub fn parse_secret(input: &str) -> CliResult<BigUint> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x") {
        Some(hex_digits) => BigUint::from_str_radix(hex_digits, 16),
        None => BigUint::from_str_radix(input, 10),
    };
    parsed.map_err(|e| format!("Invalid secret '{}': {}", input, e).into())
}

/// Show the public encodings of a private key
pub fn cmd_key(secret: &str, compressed: bool, network: Network) -> CliResult<()> {
    let key = PrivateKey::new(parse_secret(secret)?)?;
    let point = key.point();

    println!("🔑 Key ({})", network);
    println!("   ├─ SEC: {}", hex::encode(point.sec(compressed)));
    println!("   ├─ Address: {}", point.address(compressed, network));
    println!("   └─ WIF: {}", key.wif(compressed, network));
    Ok(())
}

/// Disassemble a raw script
pub fn cmd_script(raw: &str, network: Network) -> CliResult<()> {
    let script = Script::parse_raw(&decode_hex(raw)?)?;

    println!("📜 {}", script);
    if let Some(address) = script.address(network) {
        let kind = if script.is_p2pkh() { "P2PKH" } else { "P2SH" };
        println!("   {} address: {}", kind, address);
    }
    Ok(())
}

/// Add a raw transaction to the cache
pub fn cmd_cache_add(state: &mut AppState, raw_tx: &str) -> CliResult<String> {
    let tx = Transaction::from_hex(raw_tx, state.network)?;
    let id = state.cache.insert(tx);
    state.save()?;

    println!("✅ Cached transaction {}", id);
    println!("   {} transactions in cache", state.cache.len());
    Ok(id)
}

/// List cached transactions
pub fn cmd_cache_list(state: &AppState) -> CliResult<()> {
    if state.cache.is_empty() {
        println!("📭 Cache is empty. Add one with: bitcoin cache add --tx <hex>");
        return Ok(());
    }

    println!("📋 Cached transactions:");
    for id in state.cache.ids() {
        if let Some(tx) = state.cache.get(&id) {
            println!(
                "   {} ({} in, {} out)",
                id,
                tx.inputs.len(),
                tx.outputs.len()
            );
        }
    }
    Ok(())
}

/// Verify every input of a transaction against the cache
pub fn cmd_tx_verify(state: &AppState, raw_tx: &str) -> CliResult<bool> {
    let tx = Transaction::from_hex(raw_tx, state.network)?;
    let fetcher: &dyn TxFetcher = &state.cache;

    println!("🔍 Verifying {}", tx.id());
    println!("   Fee: {} sats", tx.fee(fetcher)?);
    for index in 0..tx.inputs.len() {
        let ok = tx.verify_input(index, fetcher)?;
        println!(
            "   Input {} ({}): {}",
            index,
            tx.inputs[index],
            if ok { "valid" } else { "INVALID" }
        );
    }

    let valid = tx.verify(fetcher)?;
    if valid {
        println!("✅ Transaction is valid!");
    } else {
        println!("❌ Transaction verification FAILED!");
    }
    Ok(valid)
}

/// Sign one input of a transaction and print the result
pub fn cmd_tx_sign(state: &AppState, raw_tx: &str, input: usize, wif: &str) -> CliResult<String> {
    let (key, _, key_network) = PrivateKey::from_wif(wif)?;
    if key_network != state.network {
        log::warn!(
            "Key is for {} but transactions are resolved on {}",
            key_network,
            state.network
        );
    }

    let mut tx = Transaction::from_hex(raw_tx, state.network)?;
    if !tx.sign_input(input, &key, &state.cache)? {
        return Err(format!("Input {} does not verify after signing", input).into());
    }

    let signed = hex::encode(tx.serialize());
    println!("✍️  Signed input {} of {}", input, tx.id());
    println!("{}", signed);
    Ok(signed)
}

/// Parse a merkle block and check its proof
pub fn cmd_merkleblock(raw: &str) -> CliResult<bool> {
    let block = MerkleBlock::from_hex(raw)?;

    println!("🧱 Merkle block {}", block.header.id());
    println!("   ├─ Transactions: {}", block.total);
    println!("   ├─ Proof hashes: {}", block.hashes.len());
    println!("   └─ Merkle root: {}", hex::encode(block.header.merkle_root));

    let valid = block.is_valid()?;
    if valid {
        println!("✅ Merkle proof is valid!");
    } else {
        println!("❌ Merkle proof does not match the header");
    }
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{p2pkh_script, TxInput, TxOutput};
    use tempfile::tempdir;

    #[test]
    fn test_parse_secret() {
        assert_eq!(parse_secret("5002").unwrap(), BigUint::from(5002u32));
        assert_eq!(parse_secret("0x12345deadbeef").unwrap(), BigUint::from(0x12345deadbeefu64));
        assert!(parse_secret("nope").is_err());
    }

    #[test]
    fn test_cache_sign_and_verify() {
        let dir = tempdir().unwrap();
        let cache_file = dir.path().join("cache.json");
        let mut state = AppState::new(cache_file.clone(), Network::Testnet).unwrap();

        let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
        let funding = Transaction::new(
            1,
            vec![TxInput::new([0x11; 32], 0)],
            vec![TxOutput::new(
                100_000,
                p2pkh_script(&key.point().hash160(true)),
            )],
            0,
            Network::Testnet,
        );
        let funding_id = cmd_cache_add(&mut state, &hex::encode(funding.serialize())).unwrap();
        assert_eq!(funding_id, funding.id());

        let spend = Transaction::new(
            1,
            vec![TxInput::new(funding.hash(), 0)],
            vec![TxOutput::new(90_000, p2pkh_script(&[0x33; 20]))],
            0,
            Network::Testnet,
        );
        let unsigned = hex::encode(spend.serialize());
        assert!(!cmd_tx_verify(&state, &unsigned).unwrap());

        let wif = key.wif(true, Network::Testnet);
        let signed = cmd_tx_sign(&state, &unsigned, 0, &wif).unwrap();
        assert!(cmd_tx_verify(&state, &signed).unwrap());

        // The cache survives a restart
        let reopened = AppState::new(cache_file, Network::Testnet).unwrap();
        assert_eq!(reopened.cache.len(), 1);
        assert!(cmd_tx_verify(&reopened, &signed).unwrap());
    }

    #[test]
    fn test_unknown_input_is_an_error() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("cache.json"), Network::Mainnet).unwrap();
        let tx = Transaction::new(
            1,
            vec![TxInput::new([0x44; 32], 0)],
            vec![],
            0,
            Network::Mainnet,
        );
        assert!(cmd_tx_verify(&state, &hex::encode(tx.serialize())).is_err());
    }
}
