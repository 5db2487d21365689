//! Fixed-window request limiter keyed by client identity and endpoint
//! category. Independent of the per-phone OTP cooldown/cap, which are
//! ledger queries inside the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use mongodb::bson::DateTime;

use crate::services::error::AuthError;

pub const ANON_LIMIT: u32 = 20;
pub const ANON_WINDOW_MS: i64 = 60 * 1000;
pub const LOGIN_LIMIT: u32 = 5;
pub const LOGIN_WINDOW_MS: i64 = 60 * 1000;
pub const OTP_LIMIT: u32 = 3;
pub const OTP_WINDOW_MS: i64 = 60 * 1000;
pub const REFRESH_LIMIT: u32 = 10;
pub const REFRESH_WINDOW_MS: i64 = 60 * 1000;

struct Window {
    count: u32,
    expires_at_ms: i64,
}

#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, limit: u32, window_ms: i64) -> Result<(), AuthError> {
        self.check_at(key, limit, window_ms, DateTime::now())
    }

    /// Check-and-increment under one lock, so two concurrent requests can
    /// never both pass a check meant to admit only one.
    pub fn check_at(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now: DateTime,
    ) -> Result<(), AuthError> {
        let now_ms = now.timestamp_millis();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at_ms: now_ms + window_ms,
        });
        if window.expires_at_ms <= now_ms {
            window.count = 0;
            window.expires_at_ms = now_ms + window_ms;
        }
        if window.count >= limit {
            return Err(AuthError::RateLimited);
        }
        window.count += 1;
        Ok(())
    }
}
