use log::{debug, info, warn};
use thiserror::Error;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::amount::Amount;
use super::block::{Block, BlockHash};
use super::pow::{self, ProofError, SearchLimit, DEFAULT_DIFFICULTY};
use super::transaction::{Transaction, TransactionError};
use crate::wallet::Address;

/// Label used as the sender of mining rewards
pub const MINING_SENDER: &str = "THE BLOCK CHAIN";

/// Amount credited to the owner for every mined block
pub const MINING_REWARD: Amount = Amount::from_coins(1);

/// Errors that can occur during blockchain operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("Chain has no blocks")]
    EmptyChain,

    #[error("Proof of work not found after {attempts} attempts")]
    ProofNotFound { attempts: u64 },

    #[error("Difficulty {0} can never be met")]
    DifficultyTooHigh(usize),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
}

impl From<ProofError> for BlockchainError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::NotFound { attempts } => BlockchainError::ProofNotFound { attempts },
            ProofError::DifficultyTooHigh(difficulty) => BlockchainError::DifficultyTooHigh(difficulty),
        }
    }
}

/// Settings fixed for the lifetime of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Address credited with mining rewards
    pub owner: Address,

    /// Number of leading zero hex digits a block digest needs
    pub difficulty: usize,

    /// Reward paid for each mined block
    pub mining_reward: Amount,

    /// Reserved sender label of reward transactions
    pub mining_sender: String,

    /// Bound on the nonce search of `mine`
    pub search_limit: SearchLimit,
}

impl ChainConfig {
    /// Default constants with the given owner
    pub fn new(owner: Address) -> Self {
        ChainConfig {
            owner,
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: MINING_REWARD,
            mining_sender: MINING_SENDER.to_string(),
            search_limit: SearchLimit::unbounded(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_search_limit(mut self, search_limit: SearchLimit) -> Self {
        self.search_limit = search_limit;
        self
    }
}

/// Blocks and pending pool, always locked together
#[derive(Debug, Default)]
struct ChainState {
    chain: Vec<Block>,
    transaction_pool: Vec<Transaction>,
}

/// Block contents frozen at the start of a nonce search
#[derive(Debug, Clone)]
struct MiningSnapshot {
    previous_hash: BlockHash,

    /// Pool prefix followed by the reward
    transactions: Vec<Transaction>,

    /// Number of pool transactions in `transactions`
    pooled: usize,
}

impl ChainState {
    fn create_block(&mut self, nonce: u64, previous_hash: BlockHash) -> Block {
        let transactions = std::mem::take(&mut self.transaction_pool);
        let block = Block::new(nonce, previous_hash, transactions);
        self.chain.push(block.clone());
        block
    }

    fn last_block(&self) -> Result<&Block, BlockchainError> {
        self.chain.last().ok_or(BlockchainError::EmptyChain)
    }

    fn mining_snapshot(&self, reward: Transaction) -> Result<MiningSnapshot, BlockchainError> {
        let previous_hash = self.last_block()?.digest();
        let mut transactions = self.transaction_pool.clone();
        let pooled = transactions.len();
        transactions.push(reward);

        Ok(MiningSnapshot {
            previous_hash,
            transactions,
            pooled,
        })
    }

    /// Appends the mined block unless the chain moved on since the snapshot
    ///
    /// Only the snapshotted prefix leaves the pool; later arrivals stay.
    fn commit(&mut self, snapshot: MiningSnapshot, nonce: u64) -> Option<Block> {
        match self.chain.last() {
            Some(last) if last.digest() == snapshot.previous_hash => {}
            _ => return None,
        }
        if self.transaction_pool.len() < snapshot.pooled {
            return None;
        }

        self.transaction_pool.drain(..snapshot.pooled);
        let block = Block::new(nonce, snapshot.previous_hash, snapshot.transactions);
        self.chain.push(block.clone());
        Some(block)
    }
}

/// Previous hash of the genesis block: digest of the all-zero block
fn genesis_previous_hash() -> BlockHash {
    Block::with_timestamp(0, 0, BlockHash::ZERO, Vec::new()).digest()
}

/// Represents the blockchain
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Debug, Clone)]
pub struct Blockchain {
    state: Arc<Mutex<ChainState>>,

    /// Serializes nonce searches; never taken while `state` is held
    mining: Arc<Mutex<()>>,
    config: Arc<ChainConfig>,
}

impl Blockchain {
    /// Creates a new blockchain seeded with the genesis block
    ///
    /// The genesis block has nonce 0, no transactions, and links to the
    /// digest of the all-zero block.
    pub fn new(config: ChainConfig) -> Self {
        let blockchain = Blockchain {
            state: Arc::new(Mutex::new(ChainState::default())),
            mining: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        };

        let genesis = blockchain.create_block(0, genesis_previous_hash());
        debug!("Created genesis block {}", genesis.digest());

        blockchain
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        // A panic while holding the lock cannot leave the vectors half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Address credited with mining rewards
    pub fn owner(&self) -> &Address {
        &self.config.owner
    }

    /// Builds a block from the pending pool and appends it
    ///
    /// The pool is empty when this returns.
    pub fn create_block(&self, nonce: u64, previous_hash: BlockHash) -> Block {
        self.state().create_block(nonce, previous_hash)
    }

    /// Adds a transaction to the pending pool
    ///
    /// Neither the sender's balance nor duplicates are checked here.
    pub fn add_transaction(
        &self,
        sender: Address,
        recipient: Address,
        value: Amount,
    ) -> Result<(), BlockchainError> {
        let transaction = Transaction::new(sender, recipient, value)?;
        self.state().transaction_pool.push(transaction);
        Ok(())
    }

    /// Gets the most recently appended block
    pub fn last_block(&self) -> Result<Block, BlockchainError> {
        self.state().last_block().cloned()
    }

    /// Returns an independent copy of the pending pool
    pub fn copy_transaction_pool(&self) -> Vec<Transaction> {
        self.state().transaction_pool.clone()
    }

    /// Checks a nonce against this chain's difficulty
    pub fn valid_proof(&self, nonce: u64, previous_hash: &BlockHash, transactions: &[Transaction]) -> bool {
        pow::valid_proof(nonce, previous_hash, transactions, self.config.difficulty)
    }

    /// Finds a nonce for the current pool on top of the last block
    pub fn proof_of_work(&self) -> Result<u64, BlockchainError> {
        let (previous_hash, transactions) = {
            let state = self.state();
            (state.last_block()?.digest(), state.transaction_pool.clone())
        };

        Ok(pow::proof_of_work(
            &previous_hash,
            &transactions,
            self.config.difficulty,
            self.config.search_limit,
        )?)
    }

    /// Mines the pending pool into a new block
    ///
    /// The pool is snapshotted under the lock and a reward transaction for the
    /// owner is appended to the snapshot. The nonce search runs without the
    /// lock, so transactions submitted meanwhile are accepted and go into the
    /// next block; the mined block holds exactly the snapshot. If the chain
    /// grew during the search the snapshot is taken again. When the
    /// configured search limit runs out `ProofNotFound` is returned and the
    /// pool is left untouched.
    pub fn mine(&self) -> Result<Block, BlockchainError> {
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let reward = Transaction::reward(
                &self.config.mining_sender,
                self.config.owner.clone(),
                self.config.mining_reward,
            )?;
            let snapshot = self.state().mining_snapshot(reward)?;

            let nonce = pow::proof_of_work(
                &snapshot.previous_hash,
                &snapshot.transactions,
                self.config.difficulty,
                self.config.search_limit,
            )
            .map_err(|err| {
                warn!("action=mining, status=failed, error={}", err);
                BlockchainError::from(err)
            })?;

            let mut state = self.state();
            match state.commit(snapshot, nonce) {
                Some(block) => {
                    info!(
                        "action=mining, status=success, height={}, nonce={}",
                        state.chain.len() - 1,
                        nonce
                    );
                    return Ok(block);
                }
                None => debug!("action=mining, status=stale, retrying"),
            }
        }
    }

    /// Net amount received by `address` over the whole chain
    ///
    /// Walks every transaction of every block on each call.
    pub fn calculate_total_amount(&self, address: &Address) -> Amount {
        let state = self.state();
        let mut total_amount = Amount::ZERO;

        for block in &state.chain {
            for transaction in block.transactions() {
                let value = transaction.value();
                if transaction.recipient() == address {
                    total_amount += value;
                }
                if transaction.sender() == address {
                    total_amount -= value;
                }
            }
        }

        total_amount
    }

    /// Gets the entire blockchain
    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    /// Validates the blockchain
    ///
    /// Every block must link to its predecessor's digest and carry a nonce
    /// that meets the difficulty; genesis must be empty with nonce 0 and link
    /// to the all-zero block.
    pub fn is_valid(&self) -> bool {
        let state = self.state();

        match state.chain.first() {
            Some(genesis)
                if genesis.nonce() == 0
                    && genesis.transactions().is_empty()
                    && *genesis.previous_hash() == genesis_previous_hash() => {}
            _ => return false,
        }

        state.chain.windows(2).all(|pair| {
            let (previous, current) = (&pair[0], &pair[1]);
            *current.previous_hash() == previous.digest()
                && self.valid_proof(current.nonce(), current.previous_hash(), current.transactions())
        })
    }

    /// Renders every block in the chain
    pub fn print(&self) -> String {
        let state = self.state();
        let mut out = String::new();
        for (i, block) in state.chain.iter().enumerate() {
            out.push_str(&format!("{} Chain {} {}\n", "=".repeat(25), i, "=".repeat(25)));
            out.push_str(&format!("{}\n", block));
        }
        out.push_str(&"*".repeat(25));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn test_chain(difficulty: usize) -> (Blockchain, Wallet) {
        let miner = Wallet::new().unwrap();
        let config = ChainConfig::new(miner.address().clone()).with_difficulty(difficulty);
        (Blockchain::new(config), miner)
    }

    #[test]
    fn test_new_blockchain() {
        let (blockchain, _) = test_chain(1);
        let chain = blockchain.chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].nonce(), 0);
        assert!(chain[0].transactions().is_empty());

        let zero_block = Block::with_timestamp(0, 0, BlockHash::ZERO, Vec::new());
        assert_eq!(*chain[0].previous_hash(), zero_block.digest());
        assert!(blockchain.is_valid());
        assert!(blockchain.copy_transaction_pool().is_empty());
    }

    #[test]
    fn test_last_block() {
        let (blockchain, _) = test_chain(1);
        let genesis = blockchain.last_block().unwrap();
        assert_eq!(genesis, blockchain.chain()[0]);

        let block = blockchain.create_block(5, genesis.digest());
        assert_eq!(blockchain.last_block().unwrap(), block);
    }

    #[test]
    fn test_create_block_drains_pool() {
        let (blockchain, _) = test_chain(1);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(1))
            .unwrap();

        let previous_hash = blockchain.last_block().unwrap().digest();
        let block = blockchain.create_block(9, previous_hash);

        assert_eq!(block.transactions().len(), 1);
        assert_eq!(block.nonce(), 9);
        assert!(blockchain.copy_transaction_pool().is_empty());
        assert_eq!(blockchain.len(), 2);
    }

    #[test]
    fn test_add_transaction() {
        let (blockchain, _) = test_chain(1);
        let sender_wallet = Wallet::new().unwrap();
        let recipient_wallet = Wallet::new().unwrap();

        blockchain
            .add_transaction(
                sender_wallet.address().clone(),
                recipient_wallet.address().clone(),
                "10.0".parse().unwrap(),
            )
            .unwrap();

        let pending = blockchain.copy_transaction_pool();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sender(), sender_wallet.address());
    }

    #[test]
    fn test_add_transaction_rejects_negative_value() {
        let (blockchain, _) = test_chain(1);
        let result = blockchain.add_transaction(
            Address::from("A"),
            Address::from("B"),
            "-0.5".parse().unwrap(),
        );

        assert!(matches!(
            result,
            Err(BlockchainError::TransactionError(TransactionError::NegativeValue(_)))
        ));
        assert!(blockchain.copy_transaction_pool().is_empty());
    }

    #[test]
    fn test_copy_transaction_pool_is_independent() {
        let (blockchain, _) = test_chain(1);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(2))
            .unwrap();

        let mut copy = blockchain.copy_transaction_pool();
        copy.push(Transaction::new(Address::from("X"), Address::from("Y"), Amount::ZERO).unwrap());
        copy.clear();

        let pool = blockchain.copy_transaction_pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].sender().as_str(), "A");
    }

    #[test]
    fn test_mine_block() {
        let (blockchain, miner) = test_chain(DEFAULT_DIFFICULTY);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(3))
            .unwrap();

        let block = blockchain.mine().unwrap();

        assert_eq!(blockchain.len(), 2);
        assert!(blockchain.copy_transaction_pool().is_empty());
        assert_eq!(block.transactions().len(), 2); // User transaction + mining reward
        assert!(block.transactions()[1].is_reward(MINING_SENDER));
        assert!(blockchain.valid_proof(block.nonce(), block.previous_hash(), block.transactions()));
        assert!(Block::candidate(block.nonce(), *block.previous_hash(), block.transactions().to_vec())
            .hex_digest()
            .starts_with("000"));
        assert_eq!(blockchain.calculate_total_amount(miner.address()), MINING_REWARD);
    }

    #[test]
    fn test_chain_links() {
        let (blockchain, _) = test_chain(1);
        for i in 0..4 {
            blockchain
                .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(i))
                .unwrap();
            blockchain.mine().unwrap();
        }

        let chain = blockchain.chain();
        assert_eq!(chain.len(), 5);
        for i in 1..chain.len() {
            assert_eq!(*chain[i].previous_hash(), chain[i - 1].digest());
        }
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_reward_is_linear() {
        let (blockchain, miner) = test_chain(1);
        blockchain
            .add_transaction(miner.address().clone(), Address::from("B"), "0.25".parse().unwrap())
            .unwrap();
        blockchain.mine().unwrap();
        let before = blockchain.calculate_total_amount(miner.address());

        blockchain.mine().unwrap();
        let after = blockchain.calculate_total_amount(miner.address());

        assert_eq!(after - before, MINING_REWARD);
    }

    #[test]
    fn test_calculate_total_amount() {
        let (blockchain, _) = test_chain(1);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), "1.5".parse().unwrap())
            .unwrap();
        blockchain
            .add_transaction(Address::from("B"), Address::from("C"), "0.5".parse().unwrap())
            .unwrap();

        // Pending transactions do not count
        assert_eq!(blockchain.calculate_total_amount(&Address::from("B")), Amount::ZERO);

        blockchain.mine().unwrap();

        // No overdraft check: A goes negative
        assert_eq!(blockchain.calculate_total_amount(&Address::from("A")).to_string(), "-1.50000000");
        assert_eq!(blockchain.calculate_total_amount(&Address::from("B")).to_string(), "1.00000000");
        assert_eq!(blockchain.calculate_total_amount(&Address::from("C")).to_string(), "0.50000000");
    }

    #[test]
    fn test_mine_with_exhausted_limit() {
        let miner = Wallet::new().unwrap();
        let config = ChainConfig::new(miner.address().clone())
            .with_difficulty(64)
            .with_search_limit(SearchLimit::attempts(16));
        let blockchain = Blockchain::new(config);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(1))
            .unwrap();

        let result = blockchain.mine();

        assert_eq!(result, Err(BlockchainError::ProofNotFound { attempts: 16 }));
        assert_eq!(blockchain.len(), 1);
        // No reward left behind, user transaction kept for the retry
        let pool = blockchain.copy_transaction_pool();
        assert_eq!(pool.len(), 1);
        assert!(!pool[0].is_reward(MINING_SENDER));
    }

    #[test]
    fn test_mine_with_unreachable_difficulty() {
        let (blockchain, _) = test_chain(65);

        assert_eq!(blockchain.mine(), Err(BlockchainError::DifficultyTooHigh(65)));
        assert_eq!(blockchain.len(), 1);
        assert!(blockchain.copy_transaction_pool().is_empty());
    }

    #[test]
    fn test_transaction_during_search_is_deferred() {
        let (blockchain, miner) = test_chain(2);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(1))
            .unwrap();

        let reward = Transaction::reward(MINING_SENDER, miner.address().clone(), MINING_REWARD).unwrap();
        let snapshot = blockchain.state().mining_snapshot(reward).unwrap();

        // Arrives after the snapshot, before the block is appended
        blockchain
            .add_transaction(Address::from("C"), Address::from("D"), Amount::from_coins(2))
            .unwrap();

        let nonce = pow::proof_of_work(
            &snapshot.previous_hash,
            &snapshot.transactions,
            2,
            SearchLimit::unbounded(),
        )
        .unwrap();
        let block = blockchain.state().commit(snapshot, nonce).unwrap();

        assert_eq!(block.transactions().len(), 2);
        assert_eq!(block.transactions()[0].sender().as_str(), "A");
        assert!(block.transactions()[1].is_reward(MINING_SENDER));

        let pool = blockchain.copy_transaction_pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].sender().as_str(), "C");
        assert!(blockchain.is_valid());

        // The deferred transaction goes into the next block
        let next = blockchain.mine().unwrap();
        assert_eq!(next.transactions()[0].sender().as_str(), "C");
        assert!(blockchain.copy_transaction_pool().is_empty());
    }

    #[test]
    fn test_stale_snapshot_is_not_committed() {
        let (blockchain, miner) = test_chain(1);
        let reward = Transaction::reward(MINING_SENDER, miner.address().clone(), MINING_REWARD).unwrap();
        let snapshot = blockchain.state().mining_snapshot(reward).unwrap();

        blockchain.mine().unwrap();

        assert!(blockchain.state().commit(snapshot, 0).is_none());
        assert_eq!(blockchain.len(), 2);
    }

    #[test]
    fn test_concurrent_submissions_while_mining() {
        let (blockchain, _) = test_chain(4);
        blockchain
            .add_transaction(Address::from("first"), Address::from("B"), Amount::from_coins(1))
            .unwrap();

        let miner_chain = blockchain.clone();
        let handle = std::thread::spawn(move || miner_chain.mine());

        for i in 0..20 {
            blockchain
                .add_transaction(Address::from(format!("late-{}", i)), Address::from("B"), Amount::from_coins(1))
                .unwrap();
        }

        let block = handle.join().unwrap().unwrap();
        let pool = blockchain.copy_transaction_pool();

        // Every transaction is either in the block or still pending, never both
        let mined: Vec<_> = block.transactions().iter().filter(|tx| !tx.is_reward(MINING_SENDER)).collect();
        assert_eq!(mined.len() + pool.len(), 21);
        assert_eq!(mined[0].sender().as_str(), "first");
        for tx in &pool {
            assert!(!mined.contains(&tx));
        }
        // Block contents are a prefix of submission order
        for (i, tx) in mined.iter().enumerate().skip(1) {
            assert_eq!(tx.sender().as_str(), format!("late-{}", i - 1));
        }
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_proof_of_work_uses_last_block() {
        let (blockchain, _) = test_chain(2);
        blockchain
            .add_transaction(Address::from("A"), Address::from("B"), Amount::from_coins(1))
            .unwrap();

        let nonce = blockchain.proof_of_work().unwrap();
        let previous_hash = blockchain.last_block().unwrap().digest();
        assert!(blockchain.valid_proof(nonce, &previous_hash, &blockchain.copy_transaction_pool()));
    }

    #[test]
    fn test_tampered_chain_is_invalid() {
        let (blockchain, _) = test_chain(1);
        blockchain.mine().unwrap();
        // A block appended without proof of work breaks validation
        blockchain.create_block(0, BlockHash([0xff; 32]));
        assert!(!blockchain.is_valid());
    }

    #[test]
    fn test_rewritten_genesis_link_is_invalid() {
        let (blockchain, _) = test_chain(1);
        assert!(blockchain.is_valid());

        blockchain.state().chain[0] = Block::with_timestamp(0, 0, BlockHash([1u8; 32]), Vec::new());

        assert!(!blockchain.is_valid());
    }

    #[test]
    fn test_print() {
        let (blockchain, _) = test_chain(1);
        blockchain.mine().unwrap();
        let printed = blockchain.print();
        assert!(printed.contains("Chain 0"));
        assert!(printed.contains("Chain 1"));
        assert!(printed.contains(MINING_SENDER));
    }
}
