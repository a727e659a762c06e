use crate::pacing::RateLimit;
use crate::{Account, ApiError, Relationship, SocialApi, Status};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(6);
const PAGE_LIMIT: &str = "80";
const MAX_ATTEMPTS: u32 = 3;
const MAX_ERROR_BODY: usize = 200;

/// Blocking-per-call Mastodon REST client with built-in pacing.
pub struct MastodonClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limit: Mutex<RateLimit>,
}

impl MastodonClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("deadwood/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            rate_limit: Mutex::new(RateLimit::default()),
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = format!("{}/api/v1/{}", self.base_url, path);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| ApiError::Url(format!("{}: {}", raw, e)))
    }

    fn rate_limit(&self) -> MutexGuard<'_, RateLimit> {
        self.rate_limit.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pace(&self) {
        let delay = self.rate_limit().delay(chrono::Utc::now());
        if let Some(delay) = delay {
            debug!("⏳ Rate limit low, sleeping {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Paced request with retries on 429 and 5xx.
    async fn request(&self, method: Method, url: Url) -> Result<Response, ApiError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.pace().await;

            let res = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = res.status();
            self.rate_limit().observe(res.headers());

            if status.is_success() {
                return Ok(res);
            }

            if (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                && attempts < MAX_ATTEMPTS
            {
                let wait = if status == StatusCode::TOO_MANY_REQUESTS {
                    self.rate_limit().retry_after(chrono::Utc::now(), attempts)
                } else {
                    Duration::from_millis(1000 * 2u64.pow(attempts - 1))
                };
                warn!(
                    "⚠️ API Error {} on {} {}, retrying in {:?} (attempt {}/{})",
                    status, method, url.path(), wait, attempts, MAX_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let mut body = res.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        Ok(self.request(Method::GET, url).await?.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        Ok(self.request(Method::POST, url).await?.json().await?)
    }

    /// Follows `rel="next"` links until the collection is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let res = self.request(Method::GET, url).await?;
            let link = next_link(res.headers());
            let mut page: Vec<T> = res.json().await?;
            if page.is_empty() {
                break;
            }
            items.append(&mut page);

            next = match link {
                Some(raw) => Some(Url::parse(&raw).map_err(|e| ApiError::Url(format!("{}: {}", raw, e)))?),
                None => None,
            };
            debug!("📄 Fetched {} accounts so far", items.len());
        }

        Ok(items)
    }

    async fn account_action(&self, account_id: &str, action: &str) -> Result<Relationship, ApiError> {
        let url = self.endpoint(&format!("accounts/{}/{}", account_id, action), &[])?;
        self.post_json(url).await
    }
}

#[async_trait]
impl SocialApi for MastodonClient {
    async fn verify_credentials(&self) -> Result<Account, ApiError> {
        self.get_json(self.endpoint("accounts/verify_credentials", &[])?).await
    }

    async fn followers(&self, account_id: &str) -> Result<Vec<Account>, ApiError> {
        let url = self.endpoint(&format!("accounts/{}/followers", account_id), &[("limit", PAGE_LIMIT)])?;
        self.get_all_pages(url).await
    }

    async fn following(&self, account_id: &str) -> Result<Vec<Account>, ApiError> {
        let url = self.endpoint(&format!("accounts/{}/following", account_id), &[("limit", PAGE_LIMIT)])?;
        self.get_all_pages(url).await
    }

    async fn account_statuses(&self, account_id: &str) -> Result<Vec<Status>, ApiError> {
        self.get_json(self.endpoint(&format!("accounts/{}/statuses", account_id), &[])?).await
    }

    async fn relationship(&self, account_id: &str) -> Result<Relationship, ApiError> {
        let url = self.endpoint("accounts/relationships", &[("id[]", account_id)])?;
        let relationships: Vec<Relationship> = self.get_json(url).await?;
        relationships
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Unexpected(format!("no relationship returned for #{}", account_id)))
    }

    async fn unfollow(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.account_action(account_id, "unfollow").await
    }

    async fn block(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.account_action(account_id, "block").await
    }

    async fn unblock(&self, account_id: &str) -> Result<Relationship, ApiError> {
        self.account_action(account_id, "unblock").await
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.split_whitespace().collect::<String>() == "rel=\"next\"");
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}
