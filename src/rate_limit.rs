//! Per-client daily request quota

use axum::http::HeaderMap;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use tracing::debug;

/// Header carrying a client API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Result of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left today after this one; `u32::MAX` when unlimited
    pub remaining: u32,
    /// Daily limit; 0 means unlimited
    pub limit: u32,
}

/// Fixed-window counter that resets at the UTC day boundary
#[derive(Debug)]
pub struct DailyRateLimiter {
    limit: u32,
    state: Mutex<HashMap<String, (NaiveDate, u32)>>,
}

impl DailyRateLimiter {
    /// Create a limiter allowing `limit` requests per key per day (0 = unlimited)
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request for `key` on `today`
    ///
    /// Rejected requests do not consume quota.
    pub fn check(&self, key: &str, today: NaiveDate) -> RateDecision {
        if self.limit == 0 {
            return RateDecision {
                allowed: true,
                remaining: u32::MAX,
                limit: 0,
            };
        }

        // A poisoned map only ever held counters, keep using it
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Drop entries from previous days so the map stays bounded
        state.retain(|_, (date, _)| *date == today);

        let (_, count) = state.entry(key.to_string()).or_insert((today, 0));
        if *count >= self.limit {
            debug!(key, limit = self.limit, "daily limit reached");
            return RateDecision {
                allowed: false,
                remaining: 0,
                limit: self.limit,
            };
        }

        *count += 1;
        RateDecision {
            allowed: true,
            remaining: self.limit - *count,
            limit: self.limit,
        }
    }
}

/// Identify the client a request counts against
///
/// Precedence: `X-API-Key`, then the first `X-Forwarded-For` hop (only when
/// `trust_forwarded_for` is set), then the peer address.
///
/// The API key is not authenticated. It only groups requests, so a client
/// that sends a new key each time also gets a new quota. Deployments that
/// need a hard per-client cap should strip the header at the proxy.
#[must_use]
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        return format!("key:{key}");
    }

    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return format!("ip:{forwarded}");
    }

    match peer {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
