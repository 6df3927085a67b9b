// src/main.rs
mod config;
mod cooldown;
mod handlers;
mod models;
mod proxy;
mod query;
mod storage;
mod utils;

use actix_web::{middleware::Logger, App, HttpServer};
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;

use crate::config::Config;
use crate::handlers::AppState;
use crate::storage::kv::FileKvStore;
use crate::storage::memory::DirectoryStorage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger only once at the start
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();

    let storage = DirectoryStorage::new(config.clone());
    let seed = DirectoryStorage::load_seed(&config).map_err(|e| {
        error!("Failed to load seed servers: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })?;
    for record in seed {
        storage.add_server(record);
    }

    let votes = FileKvStore::open(&config.vote_store_path).map_err(|e| {
        error!("Failed to open vote store {}: {}", config.vote_store_path, e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let bind = config.bind();
    let state = AppState::new(config, storage, Arc::new(votes));

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
        .bind(&bind)?
        .run().await
}
