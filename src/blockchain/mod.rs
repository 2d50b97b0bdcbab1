// Blockchain module
//
// This module contains the ledger core:
// - Fixed-precision amounts
// - Canonical encoding shared by hashing and signing
// - Transaction and Block structures
// - Proof of work search
// - Blockchain with its pending pool

pub mod amount;
pub mod block;
pub mod chain;
pub mod encoding;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use amount::Amount;
pub use block::{Block, BlockHash};
pub use chain::{Blockchain, BlockchainError, ChainConfig};
pub use encoding::CanonicalEncode;
pub use pow::{SearchLimit, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
pub use transaction::{Transaction, TransactionError};
