//! # Signed Blocks
//!
//! The irreversible block as it is persisted by the block log and served to
//! the API layer.
//!
//! ## Identity
//!
//! A block id is the first 20 bytes of the SHA-256 digest of the signed
//! header, with the leading 4 bytes overwritten by the block number
//! (big-endian). The number of any block can therefore be recovered from its
//! own id, and the number of a block is `previous.block_num() + 1`.
//!
//! ## Encoding
//!
//! `to_bytes` / `from_bytes` use bincode with fixed-width little-endian
//! integers and reject trailing bytes, so the encoding is deterministic and a
//! record boundary error never decodes silently.

use bincode::Options;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

use crate::errors::CodecError;

/// A 32-byte hash (e.g., SHA-256).
pub type Hash = [u8; 32];

/// A 64-byte signature.
pub type Signature = [u8; 64];

/// A 32-byte public key.
pub type PublicKey = [u8; 32];

/// Upper bound for a single encoded block (16 MiB).
pub const MAX_BLOCK_SIZE: u64 = 16 * 1024 * 1024;

fn codec_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_BLOCK_SIZE)
        .reject_trailing_bytes()
}

// =============================================================================
// BLOCK ID
// =============================================================================

/// 20-byte block identifier carrying the block number in its first 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockId(pub [u8; 20]);

impl BlockId {
    /// Byte length of an id.
    pub const LEN: usize = 20;

    /// The id every block 1 points back to.
    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    /// Block number encoded in the id.
    pub fn block_num(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for BlockId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

// =============================================================================
// HEADERS
// =============================================================================

/// Unsigned block header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Id of the parent block.
    pub previous: BlockId,
    /// Unix timestamp (seconds) of block production.
    pub timestamp: u32,
    /// Account name of the producing witness.
    pub witness: String,
    /// Merkle root over the block's transactions.
    pub transaction_merkle_root: [u8; 20],
}

impl BlockHeader {
    /// Number of the block this header belongs to.
    pub fn block_num(&self) -> u32 {
        self.previous.block_num().wrapping_add(1)
    }
}

/// Header plus the producer's signing key and signature.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlockHeader {
    pub header: BlockHeader,
    /// Key the witness signed this block with.
    pub signing_key: PublicKey,
    #[serde_as(as = "Bytes")]
    pub witness_signature: Signature,
}

impl SignedBlockHeader {
    pub fn block_num(&self) -> u32 {
        self.header.block_num()
    }

    /// SHA-256 over the signed header fields.
    pub fn digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.header.previous.0);
        hasher.update(self.header.timestamp.to_le_bytes());
        hasher.update((self.header.witness.len() as u64).to_le_bytes());
        hasher.update(self.header.witness.as_bytes());
        hasher.update(self.header.transaction_merkle_root);
        hasher.update(self.signing_key);
        hasher.update(self.witness_signature);
        hasher.finalize().into()
    }

    /// Block id: digest prefix with the block number stamped in front.
    pub fn id(&self) -> BlockId {
        let digest = self.digest();
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        id[..4].copy_from_slice(&self.block_num().to_be_bytes());
        BlockId(id)
    }

    /// Public key of the signer.
    pub fn signee(&self) -> PublicKey {
        self.signing_key
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// A transaction as carried inside a block; the payload is opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockTransaction {
    /// Reference block number (low 16 bits) for TaPoS.
    pub ref_block_num: u16,
    /// Expiration as unix seconds.
    pub expiration: u32,
    /// Serialized operations.
    pub operations: Vec<u8>,
}

/// A complete signed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: SignedBlockHeader,
    pub transactions: Vec<BlockTransaction>,
}

impl SignedBlock {
    pub fn block_num(&self) -> u32 {
        self.header.block_num()
    }

    pub fn id(&self) -> BlockId {
        self.header.id()
    }

    pub fn signee(&self) -> PublicKey {
        self.header.signee()
    }

    /// Deterministic encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec_options()
            .serialize(self)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode a block; the slice must contain exactly one block.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec_options()
            .deserialize(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Decode only the signed header from a full block encoding.
    pub fn header_from_bytes(bytes: &[u8]) -> Result<SignedBlockHeader, CodecError> {
        // The header is the leading field; decode it without the trailing-bytes check.
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .with_limit(MAX_BLOCK_SIZE)
            .allow_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}
