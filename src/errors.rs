//! Typed error hierarchy for the leadflow board engine.
//!
//! Three top-level enums cover the three subsystems:
//! - `BoardError` — in-memory pipeline board contract violations
//! - `SourceError` — lead data source (HTTP) failures
//! - `CacheError` — persistence cache failures
//!
//! Board errors surface synchronously to the caller. A source error during a
//! stage move triggers rollback of the optimistic update; during a background
//! refresh it is logged and retried on the next interval. Cache errors are
//! never fatal: the board keeps operating in memory and emits a degradation
//! event instead.

use thiserror::Error;

use crate::board::models::LeadId;

/// Errors from operations on the in-memory pipeline board.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Lead {id} not found")]
    NotFound { id: LeadId },

    #[error("Lead {id} already exists")]
    DuplicateId { id: LeadId },
}

/// Errors from the lead data source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Stage change rejected: {0}")]
    Rejected(String),

    #[error("Malformed pipeline payload: {0}")]
    InvalidPayload(String),
}

/// Errors from the persistence cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to read cache key '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cache key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache entry '{key}': {message}")]
    Corrupt { key: String, message: String },
}
