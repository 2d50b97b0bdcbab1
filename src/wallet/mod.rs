// Wallet module
//
// Key generation, address derivation and transaction signing. Independent of
// the chain: the ledger only ever sees the resulting address strings.

pub mod address;
pub mod crypto;

pub use address::{decode_address, Address};
pub use crypto::{parse_public_key, verify_sender, verify_transaction, CryptoError, Signature, Wallet};
