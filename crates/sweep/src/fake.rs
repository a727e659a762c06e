//! In-memory `SocialApi` that records every call.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use deadwood_mastodon::{Account, ApiError, Relationship, SocialApi, Status};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    VerifyCredentials,
    Followers,
    Following,
    Statuses(String),
    Relationship(String),
    Unfollow(String),
    Block(String),
    Unblock(String),
}

pub fn at(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap()
}

pub fn account(id: &str, acct: &str) -> Account {
    Account {
        id: id.to_string(),
        username: acct.split('@').next().unwrap_or(acct).to_string(),
        acct: acct.to_string(),
        display_name: String::new(),
        url: None,
        created_at: None,
        moved: None,
        followers_count: 0,
        following_count: 0,
        statuses_count: 0,
    }
}

pub fn moved_account(id: &str, acct: &str, moved_to: &str) -> Account {
    Account {
        moved: Some(Box::new(account("moved", moved_to))),
        ..account(id, acct)
    }
}

fn http_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        body: "fake failure".to_string(),
    }
}

pub struct FakeApi {
    me: Account,
    following: Vec<Account>,
    followers: Vec<Account>,
    statuses: HashMap<String, Result<Vec<DateTime<Utc>>, u16>>,
    relationships: HashMap<String, Result<Relationship, u16>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            me: account("0", "me"),
            following: Vec::new(),
            followers: Vec::new(),
            statuses: HashMap::new(),
            relationships: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accounts we follow; the profile's following count matches.
    pub fn with_following(mut self, accounts: Vec<Account>) -> Self {
        self.me.following_count = accounts.len() as u64;
        self.following = accounts;
        self
    }

    pub fn with_followers(mut self, accounts: Vec<Account>) -> Self {
        self.me.followers_count = accounts.len() as u64;
        self.followers = accounts;
        self
    }

    pub fn with_statuses(mut self, id: &str, created: Vec<DateTime<Utc>>) -> Self {
        self.statuses.insert(id.to_string(), Ok(created));
        self
    }

    pub fn failing_statuses(mut self, id: &str, status: u16) -> Self {
        self.statuses.insert(id.to_string(), Err(status));
        self
    }

    pub fn with_relationship(mut self, id: &str, following: bool, requested: bool) -> Self {
        let relationship = Relationship {
            id: id.to_string(),
            following,
            requested,
            followed_by: true,
        };
        self.relationships.insert(id.to_string(), Ok(relationship));
        self
    }

    pub fn failing_relationship(mut self, id: &str, status: u16) -> Self {
        self.relationships.insert(id.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Statuses(_)))
            .count()
    }

    /// Calls that change follow state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Unfollow(_) | Call::Block(_) | Call::Unblock(_)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn relationship_for(&self, id: &str) -> Relationship {
        Relationship {
            id: id.to_string(),
            ..Relationship::default()
        }
    }
}

#[async_trait]
impl SocialApi for FakeApi {
    async fn verify_credentials(&self) -> Result<Account, ApiError> {
        self.record(Call::VerifyCredentials);
        Ok(self.me.clone())
    }

    async fn followers(&self, _account_id: &str) -> Result<Vec<Account>, ApiError> {
        self.record(Call::Followers);
        Ok(self.followers.clone())
    }

    async fn following(&self, _account_id: &str) -> Result<Vec<Account>, ApiError> {
        self.record(Call::Following);
        Ok(self.following.clone())
    }

    async fn account_statuses(&self, account_id: &str) -> Result<Vec<Status>, ApiError> {
        self.record(Call::Statuses(account_id.to_string()));
        match self.statuses.get(account_id) {
            Some(Ok(created)) => Ok(created
                .iter()
                .enumerate()
                .map(|(i, created_at)| Status {
                    id: format!("{}-{}", account_id, i),
                    created_at: *created_at,
                })
                .collect()),
            Some(Err(status)) => Err(http_error(*status)),
            None => Ok(Vec::new()),
        }
    }

    async fn relationship(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.record(Call::Relationship(account_id.to_string()));
        match self.relationships.get(account_id) {
            Some(Ok(relationship)) => Ok(relationship.clone()),
            Some(Err(status)) => Err(http_error(*status)),
            None => Ok(self.relationship_for(account_id)),
        }
    }

    async fn unfollow(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.record(Call::Unfollow(account_id.to_string()));
        Ok(self.relationship_for(account_id))
    }

    async fn block(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.record(Call::Block(account_id.to_string()));
        Ok(self.relationship_for(account_id))
    }

    async fn unblock(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.record(Call::Unblock(account_id.to_string()));
        Ok(self.relationship_for(account_id))
    }
}
