use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub username: String,
    /// `user` for local accounts, `user@instance` for remote ones.
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Set when the account announced a migration to another account.
    #[serde(default)]
    pub moved: Option<Box<Account>>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
}

impl Account {
    /// Home instance, lower-cased. `None` for accounts local to our instance.
    pub fn instance(&self) -> Option<String> {
        self.acct
            .split_once('@')
            .map(|(_, domain)| domain.to_lowercase())
    }

    pub fn handle(&self) -> String {
        format!("@{}", self.acct)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Relationship {
    pub id: String,
    #[serde(default)]
    pub following: bool,
    #[serde(default)]
    pub requested: bool,
    #[serde(default)]
    pub followed_by: bool,
}

impl Relationship {
    /// We follow them back, or asked to.
    pub fn is_mutual(&self) -> bool {
        self.following || self.requested
    }
}
