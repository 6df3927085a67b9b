use std::env;
use std::num::NonZeroU32;
use std::time::Duration;
use governor::Quota;
use ipnetwork::IpNetwork;
use log::warn;

use crate::models::filter::DEFAULT_PAGE_SIZE;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    // Directory
    pub page_size: usize,
    pub seed_file: Option<String>,
    pub vote_store_path: String,
    pub max_submissions_per_ip: usize,

    // Only these peers may set forwarding headers
    pub trusted_proxies: Vec<IpNetwork>,

    // Rate limiting configs
    pub server_list_period_secs: u64,
    pub server_list_burst_limit: u32,
    pub vote_period_secs: u64,
    pub vote_burst_limit: u32,
    pub submit_period_secs: u64,
    pub submit_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            page_size: DEFAULT_PAGE_SIZE,
            seed_file: None,
            vote_store_path: "votes.json".to_string(),
            max_submissions_per_ip: 3,
            trusted_proxies: Vec::new(),
            server_list_period_secs: 1,
            server_list_burst_limit: 60,
            vote_period_secs: 5,
            vote_burst_limit: 10,
            submit_period_secs: 60,
            submit_burst_limit: 5,
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn parse_networks(raw: &str) -> Vec<IpNetwork> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<IpNetwork>() {
            Ok(network) => Some(network),
            Err(e) => {
                warn!("Ignoring invalid trusted proxy {}: {}", s, e);
                None
            }
        })
        .collect()
}

fn quota(period_secs: u64, burst: u32) -> Quota {
    let period = Duration::from_secs(period_secs.max(1));
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let page_size = match parsed("PAGE_SIZE", defaults.page_size) {
            0 => DEFAULT_PAGE_SIZE,
            n => n,
        };

        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parsed("PORT", defaults.port),
            page_size,
            seed_file: env::var("SEED_FILE").ok().filter(|v| !v.is_empty()),
            vote_store_path: env::var("VOTE_STORE_PATH").unwrap_or(defaults.vote_store_path),
            max_submissions_per_ip: parsed(
                "MAX_SUBMISSIONS_PER_IP",
                defaults.max_submissions_per_ip,
            ),
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|v| parse_networks(&v))
                .unwrap_or_default(),
            server_list_period_secs: parsed(
                "SERVER_LIST_PERIOD_SECS",
                defaults.server_list_period_secs,
            ),
            server_list_burst_limit: parsed(
                "SERVER_LIST_BURST_LIMIT",
                defaults.server_list_burst_limit,
            ),
            vote_period_secs: parsed("VOTE_PERIOD_SECS", defaults.vote_period_secs),
            vote_burst_limit: parsed("VOTE_BURST_LIMIT", defaults.vote_burst_limit),
            submit_period_secs: parsed("SUBMIT_PERIOD_SECS", defaults.submit_period_secs),
            submit_burst_limit: parsed("SUBMIT_BURST_LIMIT", defaults.submit_burst_limit),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn server_list_quota(&self) -> Quota {
        quota(self.server_list_period_secs, self.server_list_burst_limit)
    }

    pub fn vote_quota(&self) -> Quota {
        quota(self.vote_period_secs, self.vote_burst_limit)
    }

    pub fn submit_quota(&self) -> Quota {
        quota(self.submit_period_secs, self.submit_burst_limit)
    }
}
