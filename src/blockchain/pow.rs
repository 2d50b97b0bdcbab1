// Proof of work
//
// Linear nonce search from 0. The first nonce whose candidate block digest
// starts with `difficulty` hex zeros wins, so the result only depends on the
// previous hash and the transaction snapshot.

use thiserror::Error;

use std::time::Instant;

use super::block::{Block, BlockHash};
use super::transaction::Transaction;

/// Default number of leading zero hex digits required
pub const DEFAULT_DIFFICULTY: usize = 3;

/// Length of a hex SHA-256 digest; no nonce can satisfy more zeros
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur during the nonce search
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("No valid nonce found after {attempts} attempts")]
    NotFound { attempts: u64 },

    #[error("Difficulty {0} exceeds the maximum of 64")]
    DifficultyTooHigh(usize),
}

/// Bounds on a nonce search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimit {
    /// Maximum number of nonces to try
    pub max_attempts: Option<u64>,

    /// Point in time after which the search gives up
    pub deadline: Option<Instant>,
}

impl SearchLimit {
    /// Searches until a nonce is found
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn attempts(max_attempts: u64) -> Self {
        SearchLimit {
            max_attempts: Some(max_attempts),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn exhausted(&self, attempts: u64) -> bool {
        if self.max_attempts.map_or(false, |max| attempts >= max) {
            return true;
        }
        // Checking the clock on every hash would dominate the loop
        attempts % 1024 == 0 && self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }
}

/// Checks whether `nonce` solves the puzzle for the given block contents
pub fn valid_proof(
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    let guess = Block::candidate(nonce, *previous_hash, transactions.to_vec());
    meets_difficulty(&guess.hex_digest(), difficulty)
}

/// Searches for the first nonce that satisfies `difficulty`
pub fn proof_of_work(
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
    limit: SearchLimit,
) -> Result<u64, ProofError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ProofError::DifficultyTooHigh(difficulty));
    }

    // Reused across attempts so the snapshot is not cloned per nonce
    let mut guess = Block::candidate(0, *previous_hash, transactions.to_vec());
    let mut attempts: u64 = 0;

    loop {
        if limit.exhausted(attempts) {
            return Err(ProofError::NotFound { attempts });
        }

        guess.set_nonce(attempts);
        if meets_difficulty(&guess.hex_digest(), difficulty) {
            return Ok(attempts);
        }

        attempts = attempts.checked_add(1).ok_or(ProofError::NotFound { attempts })?;
    }
}

fn meets_difficulty(hex_digest: &str, difficulty: usize) -> bool {
    hex_digest.len() >= difficulty && hex_digest.bytes().take(difficulty).all(|b| b == b'0')
}
