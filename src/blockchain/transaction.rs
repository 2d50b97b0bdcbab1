use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::amount::{Amount, AmountError};
use super::encoding::{CanonicalEncode, ObjectWriter};
use crate::wallet::Address;

/// Errors that can occur when a transaction request is validated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction value must not be negative: {0}")]
    NegativeValue(Amount),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value: {0}")]
    InvalidValue(#[from] AmountError),
}

/// A value transfer between two addresses
///
/// Fields are private so a transaction cannot change once it is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, or the reserved mining sender label
    #[serde(rename = "sender_blockchain_address")]
    sender: Address,

    /// Recipient's address
    #[serde(rename = "recipient_blockchain_address")]
    recipient: Address,

    /// Amount being transferred
    #[schema(value_type = String, example = "1.00000000")]
    value: Amount,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// Only the sign of `value` is checked. Whether the sender can afford the
    /// transfer is left to the caller.
    pub fn new(sender: Address, recipient: Address, value: Amount) -> Result<Self, TransactionError> {
        if value.is_negative() {
            return Err(TransactionError::NegativeValue(value));
        }

        Ok(Transaction {
            sender,
            recipient,
            value,
        })
    }

    /// Creates the mining reward paid out of the system sender
    pub fn reward(system_sender: &str, recipient: Address, value: Amount) -> Result<Self, TransactionError> {
        Self::new(Address::from(system_sender), recipient, value)
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    /// Checks if the transaction was issued by the given system sender
    pub fn is_reward(&self, system_sender: &str) -> bool {
        self.sender.as_str() == system_sender
    }
}

impl CanonicalEncode for Transaction {
    fn encode_canonical(&self, out: &mut String) {
        ObjectWriter::new(out)
            .string("sender_blockchain_address", self.sender.as_str())
            .string("recipient_blockchain_address", self.recipient.as_str())
            .string("value", &self.value.to_string())
            .finish();
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, " sender_blockchain_address      {}", self.sender)?;
        writeln!(f, " recipient_blockchain_address   {}", self.recipient)?;
        write!(f, " value                          {}", self.value)
    }
}
