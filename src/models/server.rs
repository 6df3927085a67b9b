// src/models/server.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub current: u32,
    pub max: u32,
}

impl Players {
    pub fn fill_percent(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.current as f64 / self.max as f64) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

/// A listed game server. Records are treated as read-only snapshots by the
/// query pipeline; only the storage layer bumps `votes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    pub players: Players,
    pub votes: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ServerStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl ServerRecord {
    /// The `ip:port` form shown to players and matched by search.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
}

/// A server submitted through the add-server form, waiting for an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub website: Option<String>,
    pub description: String,
    pub country: String,
    pub submitted_by: String,
    pub submitted_at: u64,
    pub status: SubmissionStatus,
}
