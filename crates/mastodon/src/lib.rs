//! deadwood Mastodon - Remote API client
//!
//! - types: Account, Status, Relationship payloads
//! - pacing: rate-limit bookkeeping from response headers
//! - client: reqwest implementation of `SocialApi`

mod client;
mod pacing;
mod types;

pub use client::MastodonClient;
pub use pacing::RateLimit;
pub use types::{Account, Relationship, Status};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid URL: {0}")]
    Url(String),
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// The operations the sweep needs from a Mastodon-compatible server.
///
/// Every call completes (or fails) before returning; implementations pace
/// themselves against the server's rate limits and may sleep to do so.
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// The account owning the access token.
    async fn verify_credentials(&self) -> Result<Account, ApiError>;

    /// All followers of `account_id`, every page resolved.
    async fn followers(&self, account_id: &str) -> Result<Vec<Account>, ApiError>;

    /// All accounts `account_id` follows, every page resolved.
    async fn following(&self, account_id: &str) -> Result<Vec<Account>, ApiError>;

    /// The first page of statuses visible to us.
    async fn account_statuses(&self, account_id: &str) -> Result<Vec<Status>, ApiError>;

    async fn relationship(&self, account_id: &str) -> Result<Relationship, ApiError>;

    async fn unfollow(&self, account_id: &str) -> Result<Relationship, ApiError>;

    async fn block(&self, account_id: &str) -> Result<Relationship, ApiError>;

    async fn unblock(&self, account_id: &str) -> Result<Relationship, ApiError>;
}
