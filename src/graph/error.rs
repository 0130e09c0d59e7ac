//! Graph client errors
//!
//! Every failure surfaced by the client is a [`GraphError`], tagged with the
//! stage of the request/response exchange that failed.

use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Stage of a request at which an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Auth,
    Uri,
    Transport,
    Status,
    BodyRead,
    Deserialization,
    Serialization,
    Cancelled,
}

/// Errors raised while acquiring an access token
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials configured: {0}")]
    MissingCredentials(String),

    #[error("token request failed")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned {status}")]
    Rejected { status: StatusCode, body: String },

    #[error("failed to parse token response")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to acquire access token")]
    Auth(#[from] AuthError),

    #[error("invalid request URL {entity}: {reason}")]
    InvalidUri { entity: String, reason: String },

    #[error("failed to send {method} request")]
    Transport {
        method: Method,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request failed: {method} {entity} returned {status}")]
    UnexpectedStatus {
        method: Method,
        entity: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to read response body")]
    BodyRead {
        status: StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse response JSON")]
    Deserialization {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize request body")]
    Serialization(#[source] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl GraphError {
    pub fn stage(&self) -> Stage {
        match self {
            GraphError::Auth(_) => Stage::Auth,
            GraphError::InvalidUri { .. } => Stage::Uri,
            GraphError::Transport { .. } => Stage::Transport,
            GraphError::UnexpectedStatus { .. } => Stage::Status,
            GraphError::BodyRead { .. } => Stage::BodyRead,
            GraphError::Deserialization { .. } => Stage::Deserialization,
            GraphError::Serialization(_) => Stage::Serialization,
            GraphError::Cancelled => Stage::Cancelled,
        }
    }

    /// Status code observed before the failure, if a response was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GraphError::UnexpectedStatus { status, .. }
            | GraphError::BodyRead { status, .. }
            | GraphError::Deserialization { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
