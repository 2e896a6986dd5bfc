//! EVOX - task ingestion and agent assignment for an AI agent team dashboard.
//!
//! This library provides the core functionality for the `evox` binary:
//! syncing tasks from the Linear issue tracker (webhooks and bulk polls),
//! mapping tracker fields onto the board, and auto-assigning new work to agents.

pub mod activity;
pub mod assign;
pub mod cli;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod linear;
pub mod logging;
pub mod models;
pub mod server;
pub mod storage;
pub mod sync;
pub mod webhook;

/// Build metadata injected by `build.rs`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = env!("EVOX_GIT_COMMIT");
pub const BUILD_TIMESTAMP: &str = env!("EVOX_BUILD_TIMESTAMP");


/// Closed classification of failures, reported in every JSON error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Validation,
    NotFound,
    Upstream,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Library-level error type for EVOX operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Upstream(_) => ErrorKind::Upstream,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Io(_) | Error::Json(_) | Error::Database(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Message safe to show to API clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias for EVOX operations.
pub type Result<T> = std::result::Result<T, Error>;
