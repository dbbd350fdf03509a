// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use axum::http::{Method, StatusCode};
use thiserror::Error;

/// Errors that can occur when reading or writing the versioned catalog document
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Document store returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Revision {expected} is stale, the document was modified concurrently")]
    Conflict { expected: String },

    #[error("Malformed document store response: {0}")]
    MalformedResponse(String),

    #[error("Failed to serialize document store request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("Document store lock poisoned")]
    Poisoned,
}

/// Errors that can occur while applying a catalog mutation
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Episode '{0}' not found")]
    EpisodeNotFound(String),

    #[error("Comment '{comment_id}' not found on episode '{episode_id}'")]
    CommentNotFound {
        episode_id: String,
        comment_id: String,
    },

    #[error("Comment '{comment_id}' belongs to another user")]
    Unauthorized { comment_id: String },

    #[error("Episode '{id}' in the catalog is malformed: {reason}")]
    MalformedEpisode { id: String, reason: String },

    #[error("Catalog document is not valid JSON: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("Failed to serialize catalog: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that can occur in the audio blob store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid object key '{0}': expected letters, digits, '_', '-', '.' and an .mp3 suffix")]
    InvalidKey(String),

    #[error("Failed to create blob directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read blob directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write blob {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload stream for '{key}' failed: {source}")]
    StreamFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse blob metadata {path}: {source}")]
    MetadataParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize blob metadata: {0}")]
    MetadataSerializeFailed(#[from] serde_json::Error),
}

/// Errors that can occur in the push subscription store
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Invalid subscription: {0}")]
    Invalid(String),

    #[error("Failed to access subscription store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse subscription record {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize subscription: {0}")]
    SerializeFailed(#[from] serde_json::Error),

    #[error("Subscription store lock poisoned")]
    Poisoned,
}

/// Errors from a single push delivery attempt
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Push endpoint {endpoint} is gone")]
    Gone { endpoint: String },

    #[error("Failed to prepare push message for {endpoint}: {reason}")]
    Prepare { endpoint: String, reason: String },

    #[error("Push delivery to {endpoint} failed: {reason}")]
    Rejected { endpoint: String, reason: String },
}

impl DeliveryError {
    /// Whether the push service reported the subscription as permanently expired
    pub fn is_gone(&self) -> bool {
        matches!(self, DeliveryError::Gone { .. })
    }
}

/// Missing or invalid server configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required configuration '{0}' is not set")]
    Missing(&'static str),

    #[error("Configuration '{name}' is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Top-level errors returned by request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("Action '{action}' is not supported for {method}")]
    UnknownAction { method: Method, action: String },

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::UnknownAction { .. } => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Catalog(err) => match err {
                CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CatalogError::EpisodeNotFound(_) | CatalogError::CommentNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                CatalogError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                // Conflicts are not retried; the caller re-fetches and re-applies
                CatalogError::MalformedEpisode { .. }
                | CatalogError::Corrupt(_)
                | CatalogError::SerializeFailed(_)
                | CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Blob(BlobError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Blob(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Subscription(SubscriptionError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Subscription(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code for response bodies
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::MethodNotAllowed(_) => "method_not_allowed",
            ApiError::UnknownAction { .. } => "unknown_action",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::Catalog(err) => match err {
                CatalogError::InvalidInput(_) => "invalid_input",
                CatalogError::EpisodeNotFound(_) => "episode_not_found",
                CatalogError::CommentNotFound { .. } => "comment_not_found",
                CatalogError::Unauthorized { .. } => "unauthorized",
                CatalogError::Store(StoreError::Conflict { .. }) => "conflict",
                CatalogError::MalformedEpisode { .. }
                | CatalogError::Corrupt(_)
                | CatalogError::SerializeFailed(_)
                | CatalogError::Store(_) => "upstream_unavailable",
            },
            ApiError::Blob(BlobError::InvalidKey(_)) => "invalid_input",
            ApiError::Blob(_) => "upstream_unavailable",
            ApiError::Subscription(SubscriptionError::Invalid(_)) => "invalid_input",
            ApiError::Subscription(_) => "upstream_unavailable",
        }
    }
}
