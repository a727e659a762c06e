//! Request pacing from the server's rate-limit headers.
//!
//! Mastodon reports `X-RateLimit-Remaining` and `X-RateLimit-Reset` on every
//! response. Once the budget runs low the remaining calls are spread evenly
//! over the window instead of bursting into a 429.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Below this many remaining calls, requests are spread across the window.
const LOW_WATERMARK: u64 = 20;

#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimit {
    pub fn observe(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = header_str(headers, "x-ratelimit-remaining")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.remaining = Some(remaining);
        }
        if let Some(reset) = header_str(headers, "x-ratelimit-reset")
            .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
        {
            self.reset_at = Some(reset.with_timezone(&Utc));
        }
    }

    /// How long to wait before the next request.
    pub fn delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        let (remaining, reset_at) = (self.remaining?, self.reset_at?);
        let window = (reset_at - now).to_std().ok()?;

        if remaining == 0 {
            return Some(window);
        }
        if remaining >= LOW_WATERMARK {
            return None;
        }
        Some(window / (remaining as u32 + 1))
    }

    /// Wait for a throttled request: until reset, or the backoff step.
    pub fn retry_after(&self, now: DateTime<Utc>, attempt: u32) -> Duration {
        self.reset_at
            .and_then(|reset| (reset - now).to_std().ok())
            .unwrap_or_else(|| Duration::from_millis(1000 * 2u64.pow(attempt.saturating_sub(1))))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
