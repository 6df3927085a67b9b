// src/handlers/submissions.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::handlers::{check_rate, SubmitLimiter};
use crate::models::server::{Submission, SubmissionStatus};
use crate::proxy::TrustedProxies;
use crate::storage::memory::DirectoryStorage;
use crate::utils::{extract_real_ip, now_ms, FieldError, RequestError};

/// Browsers post the port as typed text, API clients as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionForm {
    pub name: String,
    pub ip: String,
    pub port: PortField,
    #[serde(default)]
    pub website: Option<String>,
    pub description: String,
    pub country: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    id: String,
    status: SubmissionStatus,
}

fn field(field: &'static str, message: &str) -> FieldError {
    FieldError {
        field,
        message: message.to_string(),
    }
}

fn parse_port(port: &PortField) -> Option<u16> {
    match port {
        PortField::Number(n) => u16::try_from(*n).ok(),
        PortField::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        PortField::Text(_) => None,
    }
}

fn is_valid_url(url: &str) -> bool {
    let rest = match url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) {
        Some(rest) => rest,
        None => return false,
    };
    let host = rest.split(&['/', '?', '#'][..]).next().unwrap_or("");
    let host = host.rsplit_once(':').map_or(host, |(h, _)| h);
    !host.is_empty()
        && !url.chars().any(char::is_whitespace)
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Checks every field and reports all problems at once.
pub fn validate(form: &SubmissionForm) -> Result<(u16, Option<String>), Vec<FieldError>> {
    let mut errors = Vec::new();

    let name_len = form.name.chars().count();
    if name_len < 3 {
        errors.push(field("name", "Server name must be at least 3 characters"));
    } else if name_len > 50 {
        errors.push(field("name", "Server name must be at most 50 characters"));
    }

    if form.ip.trim().is_empty() {
        errors.push(field("ip", "IP address is required"));
    }

    let port = parse_port(&form.port);
    if port.is_none() {
        errors.push(field("port", "Port must be a number"));
    }

    let website = form.website.as_deref().map(str::trim).filter(|w| !w.is_empty());
    if let Some(url) = website {
        if !is_valid_url(url) {
            errors.push(field("website", "Must be a valid URL"));
        }
    }

    if form.description.chars().count() < 30 {
        errors.push(field("description", "Description must be at least 30 characters"));
    }

    if form.country.trim().is_empty() {
        errors.push(field("country", "Country is required"));
    }

    match port {
        Some(port) if errors.is_empty() => Ok((port, website.map(str::to_string))),
        _ => Err(errors),
    }
}

pub async fn submit_server(
    req: HttpRequest,
    form: web::Json<SubmissionForm>,
    storage: web::Data<DirectoryStorage>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<SubmitLimiter>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, peer_ip, "submission")?;

    let form = form.into_inner();
    let (port, website) = validate(&form).map_err(|errors| {
        warn!("Rejected submission from {}: {} invalid fields", peer_ip, errors.len());
        RequestError::InvalidSubmission(errors)
    })?;

    let submission = Submission {
        id: uuid::Uuid::new_v4().to_string(),
        name: form.name,
        ip: form.ip.trim().to_string(),
        port,
        website,
        description: form.description,
        country: form.country,
        submitted_by: peer_ip.to_string(),
        submitted_at: now_ms(),
        status: SubmissionStatus::PendingReview,
    };
    let accepted = Accepted {
        id: submission.id.clone(),
        status: submission.status,
    };
    storage.add_submission(submission)?;
    info!("{} submissions pending review", storage.pending_submissions());

    Ok(HttpResponse::Accepted().json(json!({
        "submission": accepted,
        "message": "Server submitted successfully! It will be reviewed by admins.",
    })))
}
