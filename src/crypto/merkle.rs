//! Merkle tree implementation for transaction verification
//!
//! Helpers to compute a full merkle root from transaction hashes, and a
//! partial `MerkleTree` that rebuilds the root of a merkle block from the
//! flag bits and hashes a peer supplies. All hashes here are in wire
//! (little-endian) byte order.

use std::fmt;
use thiserror::Error;

use super::hash::hash256;

/// Maximum block weight (BIP141)
const MAX_BLOCK_WEIGHT: usize = 4_000_000;

/// Weight of the smallest possible transaction (60 bytes non-witness)
const MIN_TRANSACTION_WEIGHT: usize = 4 * 60;

/// Most transactions a single block can hold
pub const MAX_TRANSACTIONS: usize = MAX_BLOCK_WEIGHT / MIN_TRANSACTION_WEIGHT;

/// Why a merkle traversal could not finish cleanly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalFault {
    #[error("ran out of hashes")]
    HashesExhausted,
    #[error("ran out of flag bits")]
    FlagBitsExhausted,
    #[error("{0} hashes not consumed")]
    HashesLeft(usize),
    #[error("set flag bits not consumed")]
    FlagBitsLeft,
}

/// Errors that can occur while building a partial merkle tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Merkle tree must have at least one leaf")]
    EmptyTree,
    #[error("{total} transactions exceeds the block limit of {max}")]
    TooManyTransactions { total: usize, max: usize },
    #[error("{hashes} hashes for only {total} transactions")]
    TooManyHashes { hashes: usize, total: usize },
    #[error("{hashes} hashes but only {bits} flag bits")]
    NotEnoughFlagBits { hashes: usize, bits: usize },
    #[error("Incomplete merkle traversal: {0}")]
    IncompleteTraversal(TraversalFault),
}

// =============================================================================
// Full-tree helpers
// =============================================================================

/// hash256 of two concatenated child hashes
pub fn merkle_parent(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left);
    data[32..].copy_from_slice(right);
    hash256(&data)
}

/// Hash one level into the next, duplicating the last hash if the count is odd
pub fn merkle_parent_level(hashes: &[[u8; 32]]) -> Vec<[u8; 32]> {
    hashes
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => merkle_parent(left, right),
            [single] => merkle_parent(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Merkle root of a list of hashes, `None` when the list is empty
pub fn merkle_root(hashes: &[[u8; 32]]) -> Option<[u8; 32]> {
    let mut level = hashes.to_vec();
    while level.len() > 1 {
        level = merkle_parent_level(&level);
    }
    level.first().copied()
}

/// Expand flag bytes into bits, least significant bit of each byte first
pub fn bytes_to_bit_field(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

/// Pack bits into bytes, least significant bit first, zero padded
pub fn bit_field_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
        })
        .collect()
}

// =============================================================================
// Partial merkle tree
// =============================================================================

/// A merkle tree rebuilt from a merkle block's flag bits and hashes
#[derive(Debug, Clone)]
pub struct MerkleTree {
    total: usize,
    max_depth: usize,
    nodes: Vec<Vec<Option<[u8; 32]>>>,
    current_depth: usize,
    current_index: usize,
}

impl MerkleTree {
    /// Create an empty tree shaped for `total` leaves
    pub fn new(total: usize) -> Result<Self, MerkleError> {
        if total == 0 {
            return Err(MerkleError::EmptyTree);
        }
        if total > MAX_TRANSACTIONS {
            return Err(MerkleError::TooManyTransactions {
                total,
                max: MAX_TRANSACTIONS,
            });
        }

        let mut max_depth = 0;
        while (1usize << max_depth) < total {
            max_depth += 1;
        }

        let nodes = (0..=max_depth)
            .map(|depth| {
                let shift = max_depth - depth;
                let width = (total + (1 << shift) - 1) >> shift;
                vec![None; width]
            })
            .collect();

        Ok(Self {
            total,
            max_depth,
            nodes,
            current_depth: 0,
            current_index: 0,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of node slots at each depth, root first
    pub fn level_sizes(&self) -> Vec<usize> {
        self.nodes.iter().map(Vec::len).collect()
    }

    /// The root hash, once populated
    pub fn root(&self) -> Option<[u8; 32]> {
        self.nodes[0][0]
    }

    fn up(&mut self) {
        self.current_depth = self.current_depth.saturating_sub(1);
        self.current_index >>= 1;
    }

    fn left(&mut self) {
        self.current_depth += 1;
        self.current_index <<= 1;
    }

    fn right(&mut self) {
        self.current_depth += 1;
        self.current_index = (self.current_index << 1) + 1;
    }

    fn set_current_node(&mut self, hash: [u8; 32]) {
        self.nodes[self.current_depth][self.current_index] = Some(hash);
    }

    fn left_node(&self) -> Option<[u8; 32]> {
        self.nodes[self.current_depth + 1][self.current_index << 1]
    }

    fn right_node(&self) -> Option<[u8; 32]> {
        self.nodes[self.current_depth + 1][(self.current_index << 1) + 1]
    }

    fn is_leaf(&self) -> bool {
        self.current_depth == self.max_depth
    }

    fn right_exists(&self) -> bool {
        self.nodes[self.current_depth + 1].len() > (self.current_index << 1) + 1
    }

    /// Depth-first reconstruction from flag bits and hashes.
    ///
    /// Every hash must be consumed and no set flag bit may remain.
    pub fn populate(&mut self, flag_bits: &[bool], hashes: &[[u8; 32]]) -> Result<(), MerkleError> {
        let fault = MerkleError::IncompleteTraversal;
        let mut flags = flag_bits.iter().copied();
        let mut hashes = hashes.iter().copied();

        while self.root().is_none() {
            if self.is_leaf() {
                // Leaf flag bits carry no information
                flags
                    .next()
                    .ok_or(fault(TraversalFault::FlagBitsExhausted))?;
                let hash = hashes.next().ok_or(fault(TraversalFault::HashesExhausted))?;
                self.set_current_node(hash);
                self.up();
                continue;
            }

            match self.left_node() {
                None => {
                    let descend = flags
                        .next()
                        .ok_or(fault(TraversalFault::FlagBitsExhausted))?;
                    if descend {
                        self.left();
                    } else {
                        let hash = hashes.next().ok_or(fault(TraversalFault::HashesExhausted))?;
                        self.set_current_node(hash);
                        self.up();
                    }
                }
                Some(left) if self.right_exists() => match self.right_node() {
                    None => self.right(),
                    Some(right) => {
                        self.set_current_node(merkle_parent(&left, &right));
                        self.up();
                    }
                },
                Some(left) => {
                    self.set_current_node(merkle_parent(&left, &left));
                    self.up();
                }
            }
        }

        let left_over = hashes.count();
        if left_over > 0 {
            log::warn!("Merkle traversal finished with {} unused hashes", left_over);
            return Err(fault(TraversalFault::HashesLeft(left_over)));
        }
        if flags.any(|bit| bit) {
            log::warn!("Merkle traversal finished with unused set flag bits");
            return Err(fault(TraversalFault::FlagBitsLeft));
        }

        log::debug!("Merkle tree of {} leaves populated", self.total);
        Ok(())
    }
}

impl fmt::Display for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, level) in self.nodes.iter().enumerate() {
            let items: Vec<String> = level
                .iter()
                .enumerate()
                .map(|(index, node)| {
                    let short = match node {
                        None => "None".to_string(),
                        Some(hash) => format!("{}...", &hex::encode(hash)[..8]),
                    };
                    if depth == self.current_depth && index == self.current_index {
                        format!("*{}*", short)
                    } else {
                        short
                    }
                })
                .collect();
            writeln!(f, "{}", items.join(", "))?;
        }
        Ok(())
    }
}
