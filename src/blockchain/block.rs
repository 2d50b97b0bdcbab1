use chrono::Utc;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

use super::encoding::{CanonicalEncode, ObjectWriter, ENCODING_VERSION};
use super::transaction::Transaction;

/// SHA-256 digest of a block's canonical encoding
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// The all-zero digest
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch (informational)
    timestamp: i64,

    /// Proof of work
    nonce: u64,

    /// Digest of the previous block
    #[schema(value_type = String, example = "000a3f...")]
    previous_hash: BlockHash,

    /// Transactions included in this block, in hashing order
    transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// No mining happens here: `nonce` is stored as given.
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        // timestamp_nanos_opt only fails for dates past the year 2262
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self::with_timestamp(timestamp, nonce, previous_hash, transactions)
    }

    /// Creates the timestamp-free block that proof-of-work hashes
    pub fn candidate(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        Self::with_timestamp(0, nonce, previous_hash, transactions)
    }

    pub(crate) fn with_timestamp(
        timestamp: i64,
        nonce: u64,
        previous_hash: BlockHash,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            timestamp,
            nonce,
            previous_hash,
            transactions,
        }
    }

    pub(super) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Calculates the SHA-256 digest of the block
    pub fn digest(&self) -> BlockHash {
        BlockHash(Sha256::digest(self.canonical_bytes()).into())
    }

    /// The digest as a lowercase hexadecimal string
    pub fn hex_digest(&self) -> String {
        self.digest().to_hex()
    }
}

impl CanonicalEncode for Block {
    fn encode_canonical(&self, out: &mut String) {
        ObjectWriter::new(out)
            .number("version", ENCODING_VERSION)
            .number("timestamp", self.timestamp)
            .number("nonce", self.nonce)
            .string("previous_hash", &self.previous_hash.to_hex())
            .array("transactions", &self.transactions)
            .finish();
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "timestamp             {}", self.timestamp)?;
        writeln!(f, "nonce                 {}", self.nonce)?;
        write!(f, "previous_hash         {}", self.previous_hash)?;
        for transaction in &self.transactions {
            write!(f, "\n{}", transaction)?;
        }
        Ok(())
    }
}
