use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;
mod wallet;

use config::ServerConfig;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::get_total_amount,
        api::handlers::validate_chain,
        api::handlers::create_wallet,
        api::handlers::sign_transaction
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            wallet::Address,
            wallet::Signature,
            api::schema::ChainResponse,
            api::schema::TransactionRequest,
            api::schema::TransactionResponse,
            api::schema::WalletTransactionRequest,
            api::schema::MineResponse,
            api::schema::AmountResponse
        )
    ),
    tags(
        (name = "blockchain", description = "Ledger API endpoints")
    ),
    info(
        title = "PoW Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::parse();

    // Mining rewards go to a wallet created for this process
    let miner = wallet::Wallet::new()?;
    info!("Miner wallet address: {}", miner.address());

    let blockchain = web::Data::new(blockchain::Blockchain::new(
        config.chain_config(miner.address().clone()),
    ));
    info!(
        "Chain initialized with difficulty {} (search limit: {:?})",
        blockchain.config().difficulty,
        blockchain.config().search_limit
    );

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi())
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
