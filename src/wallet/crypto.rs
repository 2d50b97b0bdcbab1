use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::address::{public_key_bytes, Address};
use crate::blockchain::{CanonicalEncode, Transaction};

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature does not match transaction")]
    Authentication,

    #[error("Sender address {0} was not derived from the given public key")]
    AddressMismatch(Address),
}

/// ECDSA signature as its two scalars, each 64 hex characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Signature {
    pub r: String,
    pub s: String,
}

impl Signature {
    fn from_ecdsa(signature: &EcdsaSignature) -> Self {
        let (r, s) = signature.split_bytes();
        Signature {
            r: hex::encode(r),
            s: hex::encode(s),
        }
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature, CryptoError> {
        let decode = |part: &str| -> Result<Vec<u8>, CryptoError> {
            let bytes = hex::decode(part).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(CryptoError::InvalidSignature(format!(
                    "expected 32-byte scalar, got {} bytes",
                    bytes.len()
                )));
            }
            Ok(bytes)
        };

        let mut bytes = decode(&self.r)?;
        bytes.extend(decode(&self.s)?);

        EcdsaSignature::from_slice(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.r, self.s)
    }
}

/// Represents a wallet with a P-256 keypair
///
/// The signing key never leaves the wallet except through
/// [`Wallet::private_key_hex`].
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Result<Self, CryptoError> {
        Ok(Self::from_signing_key(SigningKey::random(&mut OsRng)))
    }

    /// Creates a wallet from an existing 32-byte secret scalar
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(secret_key_bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Creates a wallet from a hex-encoded secret scalar
    pub fn from_private_key_hex(private_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(private_key).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_secret_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Wallet {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// X || Y as 128 hex characters
    pub fn public_key_hex(&self) -> String {
        hex::encode(public_key_bytes(&self.verifying_key))
    }

    /// Secret scalar as 64 hex characters
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Signs the canonical encoding of a transaction
    pub fn sign_transaction(&self, transaction: &Transaction) -> Signature {
        let signature: EcdsaSignature = self.signing_key.sign(&transaction.canonical_bytes());
        Signature::from_ecdsa(&signature)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Serialize for Wallet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Wallet", 3)?;
        state.serialize_field("private_key", &self.private_key_hex())?;
        state.serialize_field("public_key", &self.public_key_hex())?;
        state.serialize_field("blockchain_address", &self.address)?;
        state.end()
    }
}

/// Parses a 128-hex-character X || Y public key
pub fn parse_public_key(public_key: &str) -> Result<VerifyingKey, CryptoError> {
    let coordinates = hex::decode(public_key).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    if coordinates.len() != 64 {
        return Err(CryptoError::InvalidPublicKey(format!(
            "expected 64 bytes, got {}",
            coordinates.len()
        )));
    }

    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&coordinates);

    VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Checks that `signature` was made over `transaction` by `public_key`
pub fn verify_transaction(
    public_key: &VerifyingKey,
    transaction: &Transaction,
    signature: &Signature,
) -> Result<(), CryptoError> {
    let signature = signature.to_ecdsa()?;
    public_key
        .verify(&transaction.canonical_bytes(), &signature)
        .map_err(|_| CryptoError::Authentication)
}

/// Checks that the transaction's sender address belongs to `public_key`
pub fn verify_sender(public_key: &VerifyingKey, sender: &Address) -> Result<(), CryptoError> {
    if Address::from_public_key(public_key) != *sender {
        return Err(CryptoError::AddressMismatch(sender.clone()));
    }
    Ok(())
}
