// src/utils.rs
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use log::debug;
use serde::Serialize;
use serde_json::json;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::cooldown::{format_countdown, VoteError};
use crate::proxy::TrustedProxies;
use crate::storage::memory::StorageError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Failed to extract client IP")]
    MissingPeerIP,
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("{0}")]
    NotFound(String),
    #[error("Already voted for this server")]
    AlreadyCooling { remaining_ms: u64 },
    #[error("Invalid submission")]
    InvalidSubmission(Vec<FieldError>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManySubmissions(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingPeerIP => StatusCode::BAD_REQUEST,
            Self::RateLimitExceeded | Self::TooManySubmissions(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyCooling { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::AlreadyCooling { remaining_ms } => json!({
                "error": self.to_string(),
                "remaining_ms": remaining_ms,
                "countdown": format_countdown(*remaining_ms),
            }),
            Self::InvalidSubmission(fields) => json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<StorageError> for RequestError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::RecordNotFound(_) => Self::NotFound(e.to_string()),
            StorageError::DuplicateAddress(_) => Self::Conflict(e.to_string()),
            StorageError::SubmissionLimit(_) => Self::TooManySubmissions(e.to_string()),
            StorageError::Io(_) | StorageError::Json(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<VoteError> for RequestError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::AlreadyCooling { remaining_ms } => Self::AlreadyCooling { remaining_ms },
            VoteError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

/// The connecting peer, unless it is a trusted proxy, in which case the first
/// `X-Forwarded-For` entry (or `X-Real-IP`) wins.
pub fn extract_real_ip(
    req: &HttpRequest,
    proxies: &TrustedProxies,
) -> Result<IpAddr, RequestError> {
    let peer_addr = match req.peer_addr() {
        Some(addr) => addr.ip(),
        None => return Err(RequestError::MissingPeerIP),
    };

    if !proxies.is_trusted(peer_addr) {
        return Ok(peer_addr);
    }

    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    debug!("Using X-Forwarded-For {} from proxy {}", ip, peer_addr);
                    return Ok(ip);
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP") {
        if let Some(ip) = real_ip.to_str().ok().and_then(|s| s.trim().parse::<IpAddr>().ok()) {
            debug!("Using X-Real-IP {} from proxy {}", ip, peer_addr);
            return Ok(ip);
        }
    }

    Ok(peer_addr)
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
