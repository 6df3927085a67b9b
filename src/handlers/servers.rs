// src/handlers/servers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde::Serialize;

use crate::config::Config;
use crate::handlers::{check_rate, ListLimiter};
use crate::models::filter::{FilterParams, FilterSpec};
use crate::models::server::ServerRecord;
use crate::proxy::TrustedProxies;
use crate::query;
use crate::storage::memory::DirectoryStorage;
use crate::utils::{extract_real_ip, RequestError};

#[derive(Serialize)]
pub struct ServerDetail {
    #[serde(flatten)]
    pub server: ServerRecord,
    pub address: String,
    pub fill_percent: f64,
}

pub async fn list_servers(
    req: HttpRequest,
    params: web::Query<FilterParams>,
    storage: web::Data<DirectoryStorage>,
    config: web::Data<Config>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<ListLimiter>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, peer_ip, "server list")?;

    let spec = FilterSpec::from_params(params.into_inner(), config.page_size);
    let servers = storage.get_servers();
    let result = query::query(&servers, &spec);

    debug!(
        "Query {:?} matched {} of {} servers, page {}/{}",
        spec,
        result.total_matched,
        servers.len(),
        result.page,
        result.total_pages
    );

    Ok(HttpResponse::Ok().json(result))
}

pub async fn featured_servers(
    storage: web::Data<DirectoryStorage>,
) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(query::featured(&storage.get_servers())))
}

pub async fn top_servers(
    storage: web::Data<DirectoryStorage>,
) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(query::top_voted(&storage.get_servers())))
}

pub async fn get_server(
    req: HttpRequest,
    path: web::Path<String>,
    storage: web::Data<DirectoryStorage>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<ListLimiter>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, peer_ip, "server detail")?;

    let server = storage.get_server(&path)?;
    Ok(HttpResponse::Ok().json(ServerDetail {
        address: server.address(),
        fill_percent: server.players.fill_percent(),
        server,
    }))
}
