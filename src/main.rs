//! Mini-Bitcoin CLI Application
//!
//! A command-line interface for keys, scripts, transactions and merkle blocks.

use clap::{Parser, Subcommand};
use mini_bitcoin::cli::{self, AppState};
use mini_bitcoin::params::Network;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bitcoin")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "secp256k1 keys, Bitcoin scripts and SPV proofs in Rust", long_about = None)]
struct Cli {
    /// Transaction cache used to resolve previous outputs
    #[arg(short, long, global = true, default_value = ".tx_cache.json")]
    cache: PathBuf,

    /// Use testnet address and WIF prefixes
    #[arg(long, global = true)]
    testnet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show SEC, address and WIF for a secret
    Key {
        /// Secret as a decimal integer or 0x-prefixed hex
        #[arg(short, long)]
        secret: String,

        /// Use the uncompressed SEC form
        #[arg(long)]
        uncompressed: bool,
    },

    /// Disassemble a raw script
    Script {
        /// Script bytes as hex, without a length prefix
        #[arg(long)]
        hex: String,
    },

    /// Transaction cache operations
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Transaction operations
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Parse and validate a merkle block
    Merkleblock {
        /// Serialized merkle block as hex
        #[arg(long)]
        hex: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Add a raw transaction
    Add {
        /// Raw transaction hex
        #[arg(short, long)]
        tx: String,
    },

    /// List cached transactions
    List,
}

#[derive(Subcommand)]
enum TxCommands {
    /// Verify all inputs of a transaction
    Verify {
        /// Raw transaction hex
        #[arg(short, long)]
        tx: String,
    },

    /// Sign one input with a WIF private key
    Sign {
        /// Raw transaction hex
        #[arg(short, long)]
        tx: String,

        /// Index of the input to sign
        #[arg(short, long, default_value = "0")]
        input: usize,

        /// Private key in WIF
        #[arg(short, long)]
        wif: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let network = Network::from_testnet(cli.testnet);

    match cli.command {
        Commands::Key {
            secret,
            uncompressed,
        } => {
            cli::cmd_key(&secret, !uncompressed, network)?;
        }

        Commands::Script { hex } => {
            cli::cmd_script(&hex, network)?;
        }

        Commands::Merkleblock { hex } => {
            cli::cmd_merkleblock(&hex)?;
        }

        Commands::Cache { action } => {
            let mut state = AppState::new(cli.cache, network)?;
            match action {
                CacheCommands::Add { tx } => {
                    cli::cmd_cache_add(&mut state, &tx)?;
                }
                CacheCommands::List => {
                    cli::cmd_cache_list(&state)?;
                }
            }
        }

        Commands::Tx { action } => {
            let state = AppState::new(cli.cache, network)?;
            match action {
                TxCommands::Verify { tx } => {
                    cli::cmd_tx_verify(&state, &tx)?;
                }
                TxCommands::Sign { tx, input, wif } => {
                    cli::cmd_tx_sign(&state, &tx, input, &wif)?;
                }
            }
        }
    }

    Ok(())
}
