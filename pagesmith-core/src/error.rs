//! Error types for pagesmith

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pagesmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pagesmith operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected libgit2 failure outside the classified cases below
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// The working copy could not be cloned, opened or fetched
    #[error("Repository unavailable ({url}): {reason}")]
    RepositoryUnavailable { url: String, reason: String },

    /// Switching branches was blocked by local state
    #[error("Failed to check out branch '{branch}': {reason}")]
    CheckoutFailed { branch: String, reason: String },

    /// The current branch could not be fast-forwarded from its upstream
    #[error("Failed to sync branch '{branch}': {reason}")]
    SyncFailed { branch: String, reason: String },

    /// A commit was attempted with nothing staged
    #[error("Nothing to commit")]
    NothingToCommit,

    /// The remote refused the pushed branch
    #[error("Push of branch '{branch}' was rejected: {reason}")]
    PushRejected { branch: String, reason: String },

    /// An artifact carried streamed contents instead of a buffer
    #[error("Streamed contents are not supported: {}", path.display())]
    UnsupportedArtifact { path: PathBuf },

    /// An artifact path would land outside the working copy
    #[error("Invalid artifact path '{}': {reason}", path.display())]
    InvalidArtifactPath { path: PathBuf, reason: String },

    /// The artifact producer went away without signalling end of input
    #[error("Artifact input ended without an end-of-input signal ({received} received)")]
    IncompleteInput { received: usize },

    /// Deployment phase machine was driven along an edge it does not have
    #[error("Invalid deployment transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
