// src/handlers/mod.rs
pub mod index;
pub mod servers;
pub mod submissions;
pub mod votes;

use actix_web::web;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{clock::DefaultClock, RateLimiter};
use log::error;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::proxy::TrustedProxies;
use crate::storage::kv::KeyValueStore;
use crate::storage::memory::DirectoryStorage;
use crate::utils::RequestError;

pub type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub struct ListLimiter(pub KeyedLimiter);
pub struct VoteLimiter(pub KeyedLimiter);
pub struct SubmitLimiter(pub KeyedLimiter);

/// Process-wide vote state, shared by every voter.
pub struct VoteStore(pub Arc<dyn KeyValueStore>);

pub fn check_rate(limiter: &KeyedLimiter, ip: IpAddr, what: &str) -> Result<(), RequestError> {
    if limiter.check_key(&ip).is_err() {
        error!("Rate limit exceeded for {} for ip: {}", what, ip);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub storage: web::Data<DirectoryStorage>,
    pub votes: web::Data<VoteStore>,
    pub proxies: web::Data<TrustedProxies>,
    list_limiter: web::Data<ListLimiter>,
    vote_limiter: web::Data<VoteLimiter>,
    submit_limiter: web::Data<SubmitLimiter>,
}

impl AppState {
    pub fn new(config: Config, storage: DirectoryStorage, votes: Arc<dyn KeyValueStore>) -> Self {
        Self {
            proxies: web::Data::new(TrustedProxies::new(config.trusted_proxies.clone())),
            list_limiter: web::Data::new(ListLimiter(RateLimiter::keyed(
                config.server_list_quota(),
            ))),
            vote_limiter: web::Data::new(VoteLimiter(RateLimiter::keyed(config.vote_quota()))),
            submit_limiter: web::Data::new(SubmitLimiter(RateLimiter::keyed(
                config.submit_quota(),
            ))),
            storage: web::Data::new(storage),
            votes: web::Data::new(VoteStore(votes)),
            config: web::Data::new(config),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.storage.clone())
            .app_data(self.votes.clone())
            .app_data(self.proxies.clone())
            .app_data(self.list_limiter.clone())
            .app_data(self.vote_limiter.clone())
            .app_data(self.submit_limiter.clone())
            .route("/", web::get().to(index::index))
            .route("/servers", web::get().to(servers::list_servers))
            .route("/servers", web::post().to(submissions::submit_server))
            .route("/servers/featured", web::get().to(servers::featured_servers))
            .route("/servers/top", web::get().to(servers::top_servers))
            .route("/servers/{id}", web::get().to(servers::get_server))
            .route("/servers/{id}/vote", web::get().to(votes::vote_status))
            .route("/servers/{id}/vote", web::post().to(votes::cast_vote))
            .route("/servers/{id}/vote/countdown", web::get().to(votes::vote_countdown));
    }
}
