// src/query.rs
//! Directory query pipeline: filter, stable sort, paginate.
//!
//! Every function here is pure over the snapshot it is handed. The input slice
//! is never reordered; results are cloned out.
use feruca::Collator;
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::filter::{FilterSpec, SortKey, StatusFilter};
use crate::models::server::{ServerRecord, ServerStatus};

pub const FEATURED_LIMIT: usize = 3;
pub const TOP_VOTED_LIMIT: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub servers: Vec<ServerRecord>,
    pub total_matched: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

pub fn query(records: &[ServerRecord], spec: &FilterSpec) -> QueryResult {
    let needle = spec.search.to_lowercase();
    let mut matched: Vec<&ServerRecord> = records
        .iter()
        .filter(|r| matches(r, spec, &needle))
        .collect();

    // sort_by is stable, equal elements keep their filtered order
    let mut collator = Collator::default();
    matched.sort_by(|a, b| compare(a, b, spec.sort, &mut collator));

    let page_size = spec.page_size.max(1);
    let total_matched = matched.len();
    let total_pages = total_matched.div_ceil(page_size).max(1);

    let servers = match spec.page.checked_sub(1).map(|p| p.saturating_mul(page_size)) {
        Some(start) if start < total_matched => {
            let end = (start + page_size).min(total_matched);
            matched[start..end].iter().map(|r| (*r).clone()).collect()
        }
        _ => Vec::new(),
    };

    QueryResult {
        servers,
        total_matched,
        total_pages,
        page: spec.page,
        page_size,
    }
}

/// `needle` is the lowercased search text. It is matched against the
/// lowercased name and against the address exactly as listed.
fn matches(record: &ServerRecord, spec: &FilterSpec, needle: &str) -> bool {
    if !needle.is_empty() {
        let name_hit = record.name.to_lowercase().contains(needle);
        if !name_hit && !record.address().contains(needle) {
            return false;
        }
    }

    let status_hit = match spec.status {
        StatusFilter::All => true,
        StatusFilter::Online => record.status == ServerStatus::Online,
        StatusFilter::Offline => record.status == ServerStatus::Offline,
    };
    if !status_hit {
        return false;
    }

    spec.tags.is_empty() || spec.tags.iter().any(|t| record.tags.contains(t))
}

fn compare(a: &ServerRecord, b: &ServerRecord, sort: SortKey, collator: &mut Collator) -> Ordering {
    match sort {
        SortKey::Votes => b.votes.cmp(&a.votes),
        SortKey::Players => b.players.current.cmp(&a.players.current),
        // ids stand in for creation order until records carry a timestamp
        SortKey::Newest => b.id.cmp(&a.id),
        // Unicode collation, root locale
        SortKey::Name => collator.collate(a.name.as_str(), b.name.as_str()),
    }
}

/// Featured records for the landing page, in directory order.
pub fn featured(records: &[ServerRecord]) -> Vec<ServerRecord> {
    records
        .iter()
        .filter(|r| r.featured)
        .take(FEATURED_LIMIT)
        .cloned()
        .collect()
}

pub fn top_voted(records: &[ServerRecord]) -> Vec<ServerRecord> {
    let mut sorted: Vec<&ServerRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));
    sorted.into_iter().take(TOP_VOTED_LIMIT).cloned().collect()
}
