// src/models/filter.rs
use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid filter spec: unknown {field} value {value:?}")]
    InvalidFilterSpec { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Online,
    Offline,
}

impl FromStr for StatusFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(FilterError::InvalidFilterSpec {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Votes,
    Players,
    Newest,
    Name,
}

impl FromStr for SortKey {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "votes" => Ok(Self::Votes),
            "players" => Ok(Self::Players),
            "newest" => Ok(Self::Newest),
            "name" => Ok(Self::Name),
            other => Err(FilterError::InvalidFilterSpec {
                field: "sort",
                value: other.to_string(),
            }),
        }
    }
}

/// Raw browse-page query string, as sent by the client.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub search: Option<String>,
    pub status: Option<String>,
    /// Comma separated.
    pub tags: Option<String>,
    pub sort: Option<String>,
    /// Kept as text so a bad page never rejects the whole request.
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub search: String,
    pub status: StatusFilter,
    pub tags: Vec<String>,
    pub sort: SortKey,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            tags: Vec::new(),
            sort: SortKey::Votes,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Missing or blank means the first page. Anything else that is not a
/// positive integer maps to page 0, which the pipeline answers with an empty
/// page and the usual totals.
fn parse_page(raw: Option<&str>) -> usize {
    match raw.map(str::trim) {
        None | Some("") => 1,
        Some(text) => text.parse::<usize>().unwrap_or_else(|_| {
            warn!("invalid page {:?}, returning an empty page", text);
            0
        }),
    }
}

impl FilterSpec {
    /// Builds a spec from query params. Unknown `status` or `sort` values are
    /// not an error for the caller: they fall back to `all` and `votes`.
    pub fn from_params(params: FilterParams, page_size: usize) -> Self {
        let status = params
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<StatusFilter>)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("{}, falling back to all", e);
                None
            })
            .unwrap_or_default();

        let sort = params
            .sort
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<SortKey>)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("{}, falling back to votes", e);
                None
            })
            .unwrap_or_default();

        let mut tags: Vec<String> = Vec::new();
        for tag in params.tags.as_deref().unwrap_or("").split(',') {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Self {
            search: params.search.unwrap_or_default(),
            status,
            tags,
            sort,
            page: parse_page(params.page.as_deref()),
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
        }
    }
}
