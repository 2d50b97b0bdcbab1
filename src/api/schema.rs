use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Amount, Block, Transaction, TransactionError};
use crate::wallet::{Address, Signature};

/// Response for the chain endpoint
#[derive(Serialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Signed transfer submitted to the ledger
///
/// Every field is optional on the wire so that a missing one is reported as
/// a validation failure instead of a generic parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    pub sender_blockchain_address: Option<String>,
    pub recipient_blockchain_address: Option<String>,

    /// Sender's X || Y public key, 128 hex characters
    pub sender_public_key: Option<String>,

    /// Decimal amount, e.g. "1.5"
    pub value: Option<String>,

    pub signature: Option<Signature>,
}

/// A [`TransactionRequest`] with every field present
pub struct ValidTransactionRequest {
    pub sender: Address,
    pub recipient: Address,
    pub sender_public_key: String,
    pub value: Amount,
    pub signature: Signature,
}

impl TransactionRequest {
    /// Checks every field is present, then parses the value
    pub fn validate(self) -> Result<ValidTransactionRequest, TransactionError> {
        let sender = required(self.sender_blockchain_address, "sender_blockchain_address")?;
        let recipient = required(self.recipient_blockchain_address, "recipient_blockchain_address")?;
        let sender_public_key = required(self.sender_public_key, "sender_public_key")?;
        let value = required(self.value, "value")?;
        let signature = self.signature.ok_or(TransactionError::MissingField("signature"))?;

        Ok(ValidTransactionRequest {
            sender: sender.into(),
            recipient: recipient.into(),
            sender_public_key,
            value: value.parse()?,
            signature,
        })
    }
}

/// Transfer to be signed by the wallet endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WalletTransactionRequest {
    /// Sender's secret scalar, 64 hex characters
    pub sender_private_key: Option<String>,
    pub sender_public_key: Option<String>,
    pub sender_blockchain_address: Option<String>,
    pub recipient_blockchain_address: Option<String>,
    pub value: Option<String>,
}

pub struct ValidWalletTransactionRequest {
    pub sender_private_key: String,
    pub sender_public_key: String,
    pub sender: Address,
    pub recipient: Address,
    pub value: Amount,
}

impl WalletTransactionRequest {
    pub fn validate(self) -> Result<ValidWalletTransactionRequest, TransactionError> {
        let sender_private_key = required(self.sender_private_key, "sender_private_key")?;
        let sender_public_key = required(self.sender_public_key, "sender_public_key")?;
        let sender = required(self.sender_blockchain_address, "sender_blockchain_address")?;
        let recipient = required(self.recipient_blockchain_address, "recipient_blockchain_address")?;
        let value = required(self.value, "value")?;

        Ok(ValidWalletTransactionRequest {
            sender_private_key,
            sender_public_key,
            sender: sender.into(),
            recipient: recipient.into(),
            value: value.parse()?,
        })
    }
}

fn required(field: Option<String>, name: &'static str) -> Result<String, TransactionError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(TransactionError::MissingField(name)),
    }
}

/// Response for the transaction endpoint
#[derive(Serialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// The accepted transaction
    pub transaction: Transaction,
}

/// Response for the mine endpoint
#[derive(Serialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the amount endpoint
#[derive(Serialize, ToSchema)]
pub struct AmountResponse {
    pub address: String,

    /// Net amount received, may be negative
    #[schema(value_type = String, example = "1.00000000")]
    pub amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_request() -> TransactionRequest {
        TransactionRequest {
            sender_blockchain_address: Some("sender".to_string()),
            recipient_blockchain_address: Some("recipient".to_string()),
            sender_public_key: Some("ab".repeat(64)),
            value: Some("2.5".to_string()),
            signature: Some(Signature {
                r: "00".repeat(32),
                s: "00".repeat(32),
            }),
        }
    }

    #[test]
    fn test_validate_complete_request() {
        let valid = complete_request().validate().unwrap();
        assert_eq!(valid.sender, Address::from("sender"));
        assert_eq!(valid.value.to_string(), "2.50000000");
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut request = complete_request();
        request.signature = None;
        assert!(matches!(request.validate(), Err(TransactionError::MissingField("signature"))));

        let mut request = complete_request();
        request.recipient_blockchain_address = Some("  ".to_string());
        assert!(matches!(
            request.validate(),
            Err(TransactionError::MissingField("recipient_blockchain_address"))
        ));

        assert!(matches!(
            WalletTransactionRequest::default().validate(),
            Err(TransactionError::MissingField("sender_private_key"))
        ));
    }

    #[test]
    fn test_missing_field_reported_before_bad_value() {
        let mut request = complete_request();
        request.value = Some("one".to_string());
        request.signature = None;
        assert!(matches!(request.validate(), Err(TransactionError::MissingField("signature"))));

        let request = WalletTransactionRequest {
            sender_private_key: Some("ab".repeat(32)),
            value: Some("-".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            request.validate(),
            Err(TransactionError::MissingField("sender_public_key"))
        ));
    }

    #[test]
    fn test_validate_bad_value() {
        let mut request = complete_request();
        request.value = Some("one".to_string());
        assert!(matches!(request.validate(), Err(TransactionError::InvalidValue(_))));
    }

    #[test]
    fn test_request_from_json() {
        let request: TransactionRequest =
            serde_json::from_str(r#"{"sender_blockchain_address":"a","value":"1"}"#).unwrap();
        assert!(request.recipient_blockchain_address.is_none());
        assert!(request.signature.is_none());
    }
}
