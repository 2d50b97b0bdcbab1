use actix_web::{web, HttpResponse, Responder};
use log::warn;

use super::schema::{
    AmountResponse, ChainResponse, MineResponse, TransactionRequest, TransactionResponse,
    WalletTransactionRequest,
};
use crate::blockchain::{Blockchain, BlockchainError, Transaction};
use crate::wallet::{self, Address, CryptoError, Wallet};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn crypto_error(err: CryptoError) -> HttpResponse {
    match err {
        CryptoError::Authentication | CryptoError::AddressMismatch(_) => {
            warn!("Rejected transaction: {}", err);
            HttpResponse::Unauthorized().json(serde_json::json!({ "error": err.to_string() }))
        }
        other => bad_request(other.to_string()),
    }
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.chain();
    let is_valid = blockchain.is_valid();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns the transactions waiting to be mined into the next block
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_transactions(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.copy_transaction_pool())
}

/// Submit a signed transaction
///
/// The signature and the sender address are checked against the public key
/// before the transaction enters the pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction added to the pool", body = TransactionResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 401, description = "Signature or sender address does not match the public key")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let request = match transaction_req.into_inner().validate() {
        Ok(request) => request,
        Err(err) => return bad_request(err.to_string()),
    };

    let public_key = match wallet::parse_public_key(&request.sender_public_key) {
        Ok(public_key) => public_key,
        Err(err) => return crypto_error(err),
    };

    if let Err(err) = wallet::verify_sender(&public_key, &request.sender) {
        return crypto_error(err);
    }

    let transaction = match Transaction::new(request.sender, request.recipient, request.value) {
        Ok(transaction) => transaction,
        Err(err) => return bad_request(err.to_string()),
    };

    if let Err(err) = wallet::verify_transaction(&public_key, &transaction, &request.signature) {
        return crypto_error(err);
    }

    match blockchain.add_transaction(
        transaction.sender().clone(),
        transaction.recipient().clone(),
        transaction.value(),
    ) {
        Ok(()) => HttpResponse::Created().json(TransactionResponse {
            message: "Transaction will be added to the next block".to_string(),
            transaction,
        }),
        Err(err) => bad_request(format!("Failed to add transaction: {}", err)),
    }
}

/// Mine a new block
///
/// Bundles the pending pool and the owner's reward into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 503, description = "Nonce search limit reached, retry later"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_ref().clone();

    // Proof of work is CPU-bound, keep it off the async workers
    match web::block(move || chain.mine()).await {
        Ok(Ok(block)) => HttpResponse::Ok().json(MineResponse {
            message: "New Block Mined".to_string(),
            block,
        }),
        Ok(Err(err @ BlockchainError::ProofNotFound { .. })) => HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({ "error": format!("Failed to mine block: {}", err) })),
        Ok(Err(err)) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": format!("Failed to mine block: {}", err) })),
        Err(err) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": format!("Mining task failed: {}", err) })),
    }
}

/// Get the net amount of an address
///
/// Sums everything received minus everything sent over the whole chain
#[utoipa::path(
    get,
    path = "/api/v1/amount/{address}",
    params(
        ("address" = String, Path, description = "Blockchain address")
    ),
    responses(
        (status = 200, description = "Amount calculated", body = AmountResponse)
    )
)]
pub async fn get_total_amount(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());
    let amount = blockchain.calculate_total_amount(&address);

    HttpResponse::Ok().json(AmountResponse {
        address: address.0,
        amount,
    })
}

/// Check if the blockchain is valid
///
/// Validates every link and proof of work in the chain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.is_valid())
}

/// Create a new wallet
///
/// Returns the private key, public key and derived address.
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet",
    responses(
        (status = 201, description = "Wallet created successfully"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_wallet() -> impl Responder {
    match Wallet::new() {
        Ok(wallet) => HttpResponse::Created().json(wallet),
        Err(err) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": format!("Failed to create wallet: {}", err) })),
    }
}

/// Sign a transaction with a wallet's private key
///
/// Returns the body expected by `POST /api/v1/transactions`
#[utoipa::path(
    post,
    path = "/api/v1/wallet/transaction",
    request_body = WalletTransactionRequest,
    responses(
        (status = 200, description = "Signed transaction", body = TransactionRequest),
        (status = 400, description = "Missing or malformed fields")
    )
)]
pub async fn sign_transaction(request: web::Json<WalletTransactionRequest>) -> impl Responder {
    let request = match request.into_inner().validate() {
        Ok(request) => request,
        Err(err) => return bad_request(err.to_string()),
    };

    let wallet = match Wallet::from_private_key_hex(&request.sender_private_key) {
        Ok(wallet) => wallet,
        Err(err) => return crypto_error(err),
    };

    if !wallet.public_key_hex().eq_ignore_ascii_case(&request.sender_public_key)
        || wallet.address() != &request.sender
    {
        return bad_request("Private key does not match sender public key and address".to_string());
    }

    if let Err(err) = wallet::decode_address(request.recipient.as_str()) {
        return bad_request(format!("Invalid recipient address: {}", err));
    }

    let transaction = match Transaction::new(request.sender, request.recipient, request.value) {
        Ok(transaction) => transaction,
        Err(err) => return bad_request(err.to_string()),
    };

    let signature = wallet.sign_transaction(&transaction);

    HttpResponse::Ok().json(TransactionRequest {
        sender_blockchain_address: Some(transaction.sender().to_string()),
        recipient_blockchain_address: Some(transaction.recipient().to_string()),
        sender_public_key: Some(wallet.public_key_hex()),
        value: Some(transaction.value().to_string()),
        signature: Some(signature),
    })
}
