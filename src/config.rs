use clap::Parser;

use crate::blockchain::{ChainConfig, SearchLimit, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::wallet::Address;

/// Server settings, from flags or `LEDGER_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "pow_ledger")]
#[command(about = "A single-node proof-of-work ledger", long_about = None)]
pub struct ServerConfig {
    /// Interface the HTTP server binds to
    #[arg(long, env = "LEDGER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "LEDGER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Leading zero hex digits a block digest needs
    #[arg(
        short,
        long,
        env = "LEDGER_DIFFICULTY",
        default_value_t = DEFAULT_DIFFICULTY,
        value_parser = parse_difficulty
    )]
    pub difficulty: usize,

    /// Nonce attempts per mining request, unbounded when unset
    #[arg(long, env = "LEDGER_MAX_ATTEMPTS")]
    pub max_attempts: Option<u64>,
}

impl ServerConfig {
    /// Chain settings for a chain owned by `owner`
    pub fn chain_config(&self, owner: Address) -> ChainConfig {
        let search_limit = match self.max_attempts {
            Some(max) => SearchLimit::attempts(max),
            None => SearchLimit::unbounded(),
        };

        ChainConfig::new(owner)
            .with_difficulty(self.difficulty)
            .with_search_limit(search_limit)
    }
}

fn parse_difficulty(s: &str) -> Result<usize, String> {
    let difficulty: usize = s.parse().map_err(|e| format!("{}", e))?;
    if difficulty > MAX_DIFFICULTY {
        return Err(format!(
            "a SHA-256 hex digest has only {} digits",
            MAX_DIFFICULTY
        ));
    }
    Ok(difficulty)
}
