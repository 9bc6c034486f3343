//! SPV (Simplified Payment Verification) support
//!
//! Block headers and merkle blocks as light clients receive them:
//! - 80-byte header parsing, hashing and merkle root validation
//! - Merkle block parsing and partial merkle tree proof checking

use std::fmt;

use super::encoding::{encode_varint, ByteReader, EncodingError};
use crate::crypto::hash::{hash256, reversed};
use crate::crypto::merkle::{
    bytes_to_bit_field, merkle_root, MerkleError, MerkleTree, MAX_TRANSACTIONS,
};

/// Serialized header size
pub const HEADER_SIZE: usize = 80;

// =============================================================================
// Block Header
// =============================================================================

/// Block header. Hash fields are held in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
}

impl BlockHeader {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, EncodingError> {
        let version = reader.read_u32_le()?;
        let prev_block = reader.read_hash()?;
        let merkle_root = reader.read_hash()?;
        let timestamp = reader.read_u32_le()?;
        let mut bits = [0u8; 4];
        bits.copy_from_slice(reader.read_bytes(4)?);
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(reader.read_bytes(4)?);
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    pub fn from_hex(raw: &str) -> Result<Self, EncodingError> {
        let bytes = super::encoding::decode_hex(raw)?;
        let mut reader = ByteReader::new(&bytes);
        let header = Self::parse(&mut reader)?;
        reader.finish()?;
        Ok(header)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&reversed(&self.prev_block));
        out.extend_from_slice(&reversed(&self.merkle_root));
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.bits);
        out.extend_from_slice(&self.nonce);
        out
    }

    /// Block hash in display order
    pub fn hash(&self) -> [u8; 32] {
        reversed(&hash256(&self.serialize()))
    }

    pub fn id(&self) -> String {
        hex::encode(self.hash())
    }

    /// BIP9 version bits signalling (top three bits are 001)
    pub fn bip9(&self) -> bool {
        self.version >> 29 == 0b001
    }

    /// BIP91 readiness (bit 4)
    pub fn bip91(&self) -> bool {
        (self.version >> 4) & 1 == 1
    }

    /// BIP141 readiness (bit 1)
    pub fn bip141(&self) -> bool {
        (self.version >> 1) & 1 == 1
    }

    /// Check display-order transaction hashes against the header's merkle root
    pub fn validate_merkle_root(&self, tx_hashes: &[[u8; 32]]) -> bool {
        let leaves: Vec<[u8; 32]> = tx_hashes.iter().map(reversed).collect();
        match merkle_root(&leaves) {
            Some(root) => reversed(&root) == self.merkle_root,
            None => false,
        }
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block: {}", self.id())?;
        writeln!(f, "version: 0x{:08x}", self.version)?;
        writeln!(f, "prev_block: {}", hex::encode(self.prev_block))?;
        writeln!(f, "merkle_root: {}", hex::encode(self.merkle_root))?;
        write!(
            f,
            "timestamp: {} bits: {} nonce: {}",
            self.timestamp,
            hex::encode(self.bits),
            hex::encode(self.nonce)
        )
    }
}

// =============================================================================
// Merkle Block
// =============================================================================

/// Header plus a partial merkle tree proving some transactions are included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    /// Number of transactions in the block
    pub total: u32,
    /// Proof hashes in display order
    pub hashes: Vec<[u8; 32]>,
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, EncodingError> {
        let header = BlockHeader::parse(reader)?;
        let total = reader.read_u32_le()?;
        let hash_count = reader.read_length()?;
        let hashes = (0..hash_count)
            .map(|_| reader.read_hash())
            .collect::<Result<Vec<_>, _>>()?;
        let flag_len = reader.read_length()?;
        let flags = reader.read_bytes(flag_len)?.to_vec();
        Ok(Self {
            header,
            total,
            hashes,
            flags,
        })
    }

    pub fn from_hex(raw: &str) -> Result<Self, EncodingError> {
        let bytes = super::encoding::decode_hex(raw)?;
        let mut reader = ByteReader::new(&bytes);
        let block = Self::parse(&mut reader)?;
        reader.finish()?;
        Ok(block)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.header.serialize();
        out.extend_from_slice(&self.total.to_le_bytes());
        out.extend(encode_varint(self.hashes.len() as u64));
        for hash in &self.hashes {
            out.extend_from_slice(&reversed(hash));
        }
        out.extend(encode_varint(self.flags.len() as u64));
        out.extend_from_slice(&self.flags);
        out
    }

    /// Rebuild the partial tree from the proof.
    ///
    /// The declared transaction count and proof sizes are checked before the
    /// tree is allocated.
    pub fn tree(&self) -> Result<MerkleTree, MerkleError> {
        let total = self.total as usize;
        if total > MAX_TRANSACTIONS {
            return Err(MerkleError::TooManyTransactions {
                total,
                max: MAX_TRANSACTIONS,
            });
        }
        if self.hashes.len() > total {
            return Err(MerkleError::TooManyHashes {
                hashes: self.hashes.len(),
                total,
            });
        }
        let flag_bits = bytes_to_bit_field(&self.flags);
        if self.hashes.len() > flag_bits.len() {
            return Err(MerkleError::NotEnoughFlagBits {
                hashes: self.hashes.len(),
                bits: flag_bits.len(),
            });
        }

        let mut tree = MerkleTree::new(total)?;
        let leaves: Vec<[u8; 32]> = self.hashes.iter().map(reversed).collect();
        tree.populate(&flag_bits, &leaves)?;
        Ok(tree)
    }

    /// Whether the proof reproduces the header's merkle root.
    ///
    /// Malformed proofs that leave hashes or flag bits unconsumed are errors.
    pub fn is_valid(&self) -> Result<bool, MerkleError> {
        let tree = self.tree()?;
        let valid = tree
            .root()
            .map(|root| reversed(&root) == self.header.merkle_root)
            .unwrap_or(false);
        if !valid {
            log::warn!("Merkle proof does not match root of block {}", self.header.id());
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::merkle::TraversalFault;

    const HEADER: &str = "020000208ec39428b17323fa0ddec8e887b4a7c53b8c0a0a220cfd0000000000000000005b0750fce0a889502d40508d39576821155e9c9e3f5c3157f961db38fd8b25be1e77a759e93c0118a4ffd71d";

    const MERKLE_BLOCK: &str = "00000020df3b053dc46f162a9b00c7f0d5124e2676d47bbe7c5d0793a500000000000000ef445fef2ed495c275892206ca533e7411907971013ab83e3b47bd0d692d14d4dc7c835b67d8001ac157e670bf0d00000aba412a0d1480e370173072c9562becffe87aa661c1e4a6dbc305d38ec5dc088a7cf92e6458aca7b32edae818f9c2c98c37e06bf72ae0ce80649a38655ee1e27d34d9421d940b16732f24b94023e9d572a7f9ab8023434a4feb532d2adfc8c2c2158785d1bd04eb99df2e86c54bc13e139862897217400def5d72c280222c4cbaee7261831e1550dbb8fa82853e9fe506fc5fda3f7b919d8fe74b6282f92763cef8e625f977af7c8619c32a369b832bc2d051ecd9c73c51e76370ceabd4f25097c256597fa898d404ed53425de608ac6bfe426f6e2bb457f1c554866eb69dcb8d6bf6f880e9a59b3cd053e6c7060eeacaacf4dac6697dac20e4bd3f38a2ea2543d1ab7953e3430790a9f81e1c67f5b58c825acf46bd02848384eebe9af917274cdfbb1a28a5d58a23a17977def0de10d644258d9c54f886d47d293a411cb6226103b55635";

    fn h32(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hex::decode(s).unwrap());
        out
    }

    #[test]
    fn test_parse_header() {
        let header = BlockHeader::from_hex(HEADER).unwrap();
        assert_eq!(header.version, 0x20000002);
        assert_eq!(
            hex::encode(header.prev_block),
            "000000000000000000fd0c220a0a8c3bc5a7b487e8c8de0dfa2373b12894c38e"
        );
        assert_eq!(
            hex::encode(header.merkle_root),
            "be258bfd38db61f957315c3f9e9c5e15216857398d50402d5089a8e0fc50075b"
        );
        assert_eq!(header.timestamp, 0x59a7771e);
        assert_eq!(header.bits, [0xe9, 0x3c, 0x01, 0x18]);
        assert_eq!(header.nonce, [0xa4, 0xff, 0xd7, 0x1d]);

        assert_eq!(hex::encode(header.serialize()), HEADER);
        assert_eq!(
            header.id(),
            "0000000000000000007e9e4c586439b0cdbe13b1370bdd9435d76a644d047523"
        );
    }

    #[test]
    fn test_version_signals() {
        let header = BlockHeader::from_hex(HEADER).unwrap();
        assert!(header.bip9());
        assert!(!header.bip91());
        assert!(header.bip141());

        let old = BlockHeader::from_hex("0400000039fa821848781f027a2e6dfabbf6bda920d9ae61b63400030000000000000000ecae536a304042e3154be0e3e9a8220e5568c3433a9ab49ac4cbb74f8df8e8b0cc2acf569fb9061806652c27").unwrap();
        assert!(!old.bip9());

        let segsignal = BlockHeader::from_hex("1200002028856ec5bca29cf76980d368b0a163a0bb81fc192951270100000000000000003288f32a2831833c31a25401c52093eb545d28157e200a64b21b3ae8f21c507401877b5935470118144dbfd1").unwrap();
        assert!(segsignal.bip91());

        let no_segwit = BlockHeader::from_hex("0000002066f09203c1cf5ef1531f24ed21b1915ae9abeb691f0d2e0100000000000000003de0976428ce56125351bae62c5b8b8c79d8297c702ea05d60feabb4ed188b59c36fa759e93c0118b74b2618").unwrap();
        assert!(!no_segwit.bip141());
    }

    #[test]
    fn test_validate_merkle_root() {
        let tx_hashes: Vec<[u8; 32]> = [
            "f54cb69e5dc1bd38ee6901e4ec2007a5030e14bdd60afb4d2f3428c88eea17c1",
            "c57c2d678da0a7ee8cfa058f1cf49bfcb00ae21eda966640e312b464414731c1",
            "b027077c94668a84a5d0e72ac0020bae3838cb7f9ee3fa4e81d1eecf6eda91f3",
            "8131a1b8ec3a815b4800b43dff6c6963c75193c4190ec946b93245a9928a233d",
            "ae7d63ffcb3ae2bc0681eca0df10dda3ca36dedb9dbf49e33c5fbe33262f0910",
            "61a14b1bbdcdda8a22e61036839e8b110913832efd4b086948a6a64fd5b3377d",
            "fc7051c8b536ac87344c5497595d5d2ffdaba471c73fae15fe9228547ea71881",
            "77386a46e26f69b3cd435aa4faac932027f58d0b7252e62fb6c9c2489887f6df",
            "59cbc055ccd26a2c4c4df2770382c7fea135c56d9e75d3f758ac465f74c025b8",
            "7c2bf5687f19785a61be9f46e031ba041c7f93e2b7e9212799d84ba052395195",
            "08598eebd94c18b0d59ac921e9ba99e2b8ab7d9fccde7d44f2bd4d5e2e726d2e",
            "f0bb99ef46b029dd6f714e4b12a7d796258c48fee57324ebdc0bbc4700753ab1",
        ]
        .iter()
        .map(|s| h32(s))
        .collect();

        let header = BlockHeader::from_hex("00000020fcb19f7895db08cadc9573e7915e3919fb76d59868a51d995201000000000000acbcab8bcc1af95d8d563b77d24c3d19b18f1486383d75a5085c4e86c86beed691cfa85916ca061a00000000").unwrap();
        assert!(header.validate_merkle_root(&tx_hashes));
        assert!(!header.validate_merkle_root(&tx_hashes[1..]));
        assert!(!header.validate_merkle_root(&[]));
    }

    #[test]
    fn test_parse_merkle_block() {
        let block = MerkleBlock::from_hex(MERKLE_BLOCK).unwrap();
        assert_eq!(block.header.version, 0x20000000);
        assert_eq!(
            hex::encode(block.header.merkle_root),
            "d4142d690dbd473b3eb83a0171799011743e53ca06228975c295d42eef5f44ef"
        );
        assert_eq!(
            hex::encode(block.header.prev_block),
            "00000000000000a593075d7cbe7bd476264e12d5f0c7009b2a166fc43d053bdf"
        );
        assert_eq!(block.header.bits, [0x67, 0xd8, 0x00, 0x1a]);
        assert_eq!(block.header.nonce, [0xc1, 0x57, 0xe6, 0x70]);
        assert_eq!(block.total, 0x0dbf);
        assert_eq!(block.hashes.len(), 10);
        assert_eq!(
            reversed(&block.hashes[0]),
            h32("ba412a0d1480e370173072c9562becffe87aa661c1e4a6dbc305d38ec5dc088a")
        );
        assert_eq!(block.flags, vec![0xb5, 0x56, 0x35]);
        assert_eq!(hex::encode(block.serialize()), MERKLE_BLOCK);
    }

    #[test]
    fn test_merkle_block_is_valid() {
        let block = MerkleBlock::from_hex(MERKLE_BLOCK).unwrap();
        assert!(block.is_valid().unwrap());

        let mut tampered = block.clone();
        tampered.hashes[3][0] ^= 0xff;
        assert!(!tampered.is_valid().unwrap());

        let mut short = block.clone();
        short.hashes.pop();
        assert_eq!(
            short.is_valid(),
            Err(MerkleError::IncompleteTraversal(TraversalFault::HashesExhausted))
        );

        let mut extra = block;
        extra.hashes.push([0u8; 32]);
        assert!(matches!(
            extra.is_valid(),
            Err(MerkleError::IncompleteTraversal(TraversalFault::HashesLeft(1)))
        ));
    }

    #[test]
    fn test_merkle_block_oversized_total() {
        let raw = format!("{}ffffffff01{}0100", HEADER, "00".repeat(32));
        let block = MerkleBlock::from_hex(&raw).unwrap();
        assert_eq!(block.total, u32::MAX);
        assert_eq!(
            block.is_valid(),
            Err(MerkleError::TooManyTransactions {
                total: u32::MAX as usize,
                max: MAX_TRANSACTIONS
            })
        );
    }

    #[test]
    fn test_merkle_block_proof_sizes() {
        let block = MerkleBlock::from_hex(MERKLE_BLOCK).unwrap();

        let mut crowded = block.clone();
        crowded.total = 2;
        assert_eq!(
            crowded.is_valid(),
            Err(MerkleError::TooManyHashes {
                hashes: block.hashes.len(),
                total: 2
            })
        );

        let mut flagless = block.clone();
        flagless.flags = vec![0xff];
        assert_eq!(
            flagless.is_valid(),
            Err(MerkleError::NotEnoughFlagBits {
                hashes: block.hashes.len(),
                bits: 8
            })
        );
    }
}
