// src/storage/memory.rs
use dashmap::DashMap;
use log::{error, info};
use serde::Serialize;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::config::Config;
use crate::cooldown::VoteListener;
use crate::models::server::{ServerRecord, ServerStatus, Submission};

const BUILTIN_SEED: &str = include_str!("../../data/servers.json");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("server {0} not found")]
    RecordNotFound(String),
    #[error("a server at {0} is already listed")]
    DuplicateAddress(String),
    #[error("maximum number of pending submissions ({0}) reached for this address")]
    SubmissionLimit(usize),
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed data: {0}")]
    Json(#[from] serde_json::Error),
}

struct Entry {
    seq: u64,
    record: ServerRecord,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DirectorySummary {
    pub total_servers: usize,
    pub online_servers: usize,
    pub players_online: u64,
    pub total_votes: u64,
}

/// The record source handed to the query pipeline. Snapshots come back in
/// insertion order so pipeline ties stay deterministic.
pub struct DirectoryStorage {
    servers: DashMap<String, Entry>,
    submissions: DashMap<String, Submission>,
    next_seq: AtomicU64,
    config: Config,
}

impl DirectoryStorage {
    pub fn new(config: Config) -> Self {
        Self {
            servers: DashMap::new(),
            submissions: DashMap::new(),
            next_seq: AtomicU64::new(0),
            config,
        }
    }

    /// Reads `SEED_FILE` when configured, else the bundled listing.
    pub fn load_seed(config: &Config) -> Result<Vec<ServerRecord>, StorageError> {
        let records: Vec<ServerRecord> = match &config.seed_file {
            Some(path) => serde_json::from_slice(&fs::read(path)?)?,
            None => serde_json::from_str(BUILTIN_SEED)?,
        };
        info!("Loaded {} seed servers", records.len());
        Ok(records)
    }

    pub fn add_server(&self, record: ServerRecord) {
        let seq = match self.servers.get(&record.id) {
            Some(existing) => existing.seq,
            None => self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.servers.insert(record.id.clone(), Entry { seq, record });
    }

    pub fn get_servers(&self) -> Vec<ServerRecord> {
        let mut entries: Vec<(u64, ServerRecord)> = self
            .servers
            .iter()
            .map(|r| (r.value().seq, r.value().record.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    pub fn get_server(&self, id: &str) -> Result<ServerRecord, StorageError> {
        self.servers
            .get(id)
            .map(|r| r.value().record.clone())
            .ok_or_else(|| StorageError::RecordNotFound(id.to_string()))
    }

    pub fn increment_votes(&self, id: &str) -> Result<u64, StorageError> {
        let mut entry = self
            .servers
            .get_mut(id)
            .ok_or_else(|| StorageError::RecordNotFound(id.to_string()))?;
        entry.record.votes += 1;
        Ok(entry.record.votes)
    }

    pub fn summary(&self) -> DirectorySummary {
        let mut summary = DirectorySummary {
            total_servers: 0,
            online_servers: 0,
            players_online: 0,
            total_votes: 0,
        };
        for r in self.servers.iter() {
            let record = &r.value().record;
            summary.total_servers += 1;
            summary.total_votes += record.votes;
            if record.status == ServerStatus::Online {
                summary.online_servers += 1;
                summary.players_online += record.players.current as u64;
            }
        }
        summary
    }

    pub fn add_submission(&self, submission: Submission) -> Result<(), StorageError> {
        let address = format!("{}:{}", submission.ip, submission.port);
        let listed = self
            .servers
            .iter()
            .any(|r| r.value().record.address() == address);
        let pending = self
            .submissions
            .iter()
            .any(|r| r.value().ip == submission.ip && r.value().port == submission.port);
        if listed || pending {
            return Err(StorageError::DuplicateAddress(address));
        }

        let from_client = self
            .submissions
            .iter()
            .filter(|r| r.value().submitted_by == submission.submitted_by)
            .count();
        if from_client >= self.config.max_submissions_per_ip {
            return Err(StorageError::SubmissionLimit(self.config.max_submissions_per_ip));
        }

        info!("Queued submission {} ({}) for review", submission.id, address);
        self.submissions.insert(submission.id.clone(), submission);
        Ok(())
    }

    pub fn pending_submissions(&self) -> usize {
        self.submissions.len()
    }
}

impl VoteListener for DirectoryStorage {
    fn vote_recorded(&self, server_id: &str) {
        if let Err(e) = self.increment_votes(server_id) {
            error!("Failed to count vote: {}", e);
        }
    }
}
