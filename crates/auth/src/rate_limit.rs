//! Anti-brute-force rate limiting with progressive delay and exponential
//! lockouts.
//!
//! Records live in storage buckets (`rate_limit:<class>`), one per
//! `(identifier, class)`. Identifiers may be pipe-separated composites (IP,
//! UA family, fingerprints): a request is blocked when **any** component is
//! blocked, and the worst delay is surfaced.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use arcp_domain::error::{Error, Result};
use arcp_storage::StorageAdapter;

/// Flat penalty seconds added per prior lockout to the progressive delay.
const REPEAT_PENALTY_PER_LOCKOUT: f64 = 30.0;
/// Ceiling on the accumulated repeat penalty.
const MAX_REPEAT_PENALTY: f64 = 150.0;

/// Per-(identifier, class) attempt record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptInfo {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub first_attempt: f64,
    #[serde(default)]
    pub last_attempt: f64,
    #[serde(default)]
    pub locked_until: Option<f64>,
    #[serde(default)]
    pub lockout_count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCheck {
    pub allowed: bool,
    /// Seconds the caller must wait; set iff not allowed.
    pub retry_after: Option<f64>,
    pub reason: Option<String>,
}

impl RateCheck {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
            reason: None,
        }
    }

    fn blocked(retry_after: f64, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after.max(0.0)),
            reason: Some(reason.into()),
        }
    }

    /// Project the check into the shared error taxonomy.
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(Error::RateLimited {
                retry_after: self.retry_after.unwrap_or(0.0),
                detail: self.reason.unwrap_or_else(|| "rate limited".into()),
            })
        }
    }
}

pub struct RateLimiter {
    storage: Arc<StorageAdapter>,
    bucket: String,
    max_attempts: u32,
    lockout_duration: f64,
    window_duration: f64,
    progressive_delay: bool,
    max_lockout_duration: f64,
}

impl RateLimiter {
    pub fn new(
        storage: Arc<StorageAdapter>,
        class: &str,
        max_attempts: u32,
        lockout_duration: f64,
        window_duration: f64,
        max_lockout_duration: f64,
    ) -> Self {
        Self {
            storage,
            bucket: format!("rate_limit:{class}"),
            max_attempts: max_attempts.max(1),
            lockout_duration,
            window_duration,
            progressive_delay: true,
            max_lockout_duration,
        }
    }

    // ── arithmetic ──────────────────────────────────────────────────

    /// Seconds that must elapse between failed attempts:
    /// `min(2^(count−1) + 30·lockouts, lockout_duration + 150)`.
    pub fn delay(&self, count: u32, lockout_count: u32) -> f64 {
        if !self.progressive_delay {
            return 1.0;
        }
        let base = 2f64.powi(count.saturating_sub(1).min(30) as i32);
        let penalty =
            (f64::from(lockout_count) * REPEAT_PENALTY_PER_LOCKOUT).min(MAX_REPEAT_PENALTY);
        (base + penalty).min(self.lockout_duration + MAX_REPEAT_PENALTY)
    }

    /// Lockout length for the n-th lockout: `min(base · 2^(n−1), max)`.
    pub fn lockout_duration_for(&self, lockout_count: u32) -> f64 {
        let factor = 2f64.powi(lockout_count.saturating_sub(1).min(30) as i32);
        (self.lockout_duration * factor).min(self.max_lockout_duration)
    }

    // ── storage plumbing ────────────────────────────────────────────

    async fn load(&self, identifier: &str) -> Result<Option<AttemptInfo>> {
        Ok(self
            .storage
            .hget(&self.bucket, identifier)
            .await?
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn save(&self, identifier: &str, info: &AttemptInfo) -> Result<()> {
        let value = serde_json::to_value(info)?;
        // Degraded durability is acceptable for limiter records.
        match self.storage.hset(&self.bucket, identifier, &value).await {
            Ok(()) | Err(Error::BackendTransient(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        match self.storage.hdel(&self.bucket, identifier).await {
            Ok(_) | Err(Error::BackendTransient(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ── checks & recording ──────────────────────────────────────────

    /// Check whether `identifier` (possibly a pipe-separated composite) may
    /// attempt now. Does not consume an attempt.
    pub async fn check(&self, identifier: &str) -> Result<RateCheck> {
        self.check_at(identifier, now_secs()).await
    }

    async fn check_at(&self, identifier: &str, now: f64) -> Result<RateCheck> {
        let mut worst: Option<RateCheck> = None;
        for part in split_identifiers(identifier) {
            let check = self.check_single(part, now).await?;
            if !check.allowed {
                let is_worse = match &worst {
                    Some(w) => check.retry_after > w.retry_after,
                    None => true,
                };
                if is_worse {
                    worst = Some(check);
                }
            }
        }
        Ok(worst.unwrap_or_else(RateCheck::allowed))
    }

    async fn check_single(&self, identifier: &str, now: f64) -> Result<RateCheck> {
        let Some(mut info) = self.load(identifier).await? else {
            return Ok(RateCheck::allowed());
        };

        if let Some(until) = info.locked_until {
            if until > now {
                return Ok(RateCheck::blocked(
                    until - now,
                    "identifier is temporarily locked out",
                ));
            }
            // Lockout expired: clear it so the window restarts clean.
            info.locked_until = None;
            info.count = 0;
            self.save(identifier, &info).await?;
            return Ok(RateCheck::allowed());
        }

        if info.count >= 1 {
            let required = self.delay(info.count, info.lockout_count);
            let elapsed = now - info.last_attempt;
            if elapsed < required {
                return Ok(RateCheck::blocked(
                    required - elapsed,
                    "Too many attempts, slow down",
                ));
            }
        }
        Ok(RateCheck::allowed())
    }

    /// Record an attempt outcome. Returns the lockout duration in seconds
    /// when this failure triggered one (the maximum across composite
    /// identifiers).
    pub async fn record(&self, identifier: &str, success: bool) -> Result<Option<f64>> {
        self.record_at(identifier, success, now_secs()).await
    }

    async fn record_at(
        &self,
        identifier: &str,
        success: bool,
        now: f64,
    ) -> Result<Option<f64>> {
        let mut worst: Option<f64> = None;
        for part in split_identifiers(identifier) {
            if let Some(lockout) = self.record_single(part, success, now).await? {
                worst = Some(worst.map_or(lockout, |w: f64| w.max(lockout)));
            }
        }
        Ok(worst)
    }

    async fn record_single(
        &self,
        identifier: &str,
        success: bool,
        now: f64,
    ) -> Result<Option<f64>> {
        let mut info = self.load(identifier).await?.unwrap_or_default();

        if success {
            info.count = 0;
            info.first_attempt = 0.0;
            info.lockout_count = 0;
            info.locked_until = None;
            self.save(identifier, &info).await?;
            return Ok(None);
        }

        info.count += 1;
        if info.first_attempt == 0.0 {
            info.first_attempt = now;
        }
        info.last_attempt = now;

        if info.count >= self.max_attempts {
            info.lockout_count += 1;
            let duration = self.lockout_duration_for(info.lockout_count);
            info.locked_until = Some(now + duration);
            info.count = 0;
            self.save(identifier, &info).await?;
            tracing::warn!(
                bucket = %self.bucket,
                lockout_count = info.lockout_count,
                duration_secs = duration,
                "identifier locked out"
            );
            return Ok(Some(duration));
        }

        self.save(identifier, &info).await?;
        Ok(None)
    }

    /// Clear every record for an identifier (admin remediation).
    pub async fn clear(&self, identifier: &str) -> Result<()> {
        for part in split_identifiers(identifier) {
            self.delete(part).await?;
        }
        Ok(())
    }

    /// Remove records idle past the window that are not currently locked.
    /// Returns how many were removed.
    pub async fn cleanup(&self) -> Result<usize> {
        self.cleanup_at(now_secs()).await
    }

    async fn cleanup_at(&self, now: f64) -> Result<usize> {
        let mut removed = 0;
        for key in self.storage.hkeys(&self.bucket).await? {
            let Some(info) = self.load(&key).await? else {
                continue;
            };
            if let Some(until) = info.locked_until {
                if until > now {
                    continue;
                }
            }
            if now - info.last_attempt > self.window_duration {
                self.delete(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn split_identifiers(identifier: &str) -> impl Iterator<Item = &str> {
    identifier
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Process-wide limiter set
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The three attempt classes, constructed explicitly and carried in the
/// gateway state (no module-level singletons, so tests get fresh cores).
pub struct RateLimiters {
    pub login: RateLimiter,
    pub pin: RateLimiter,
    pub global: RateLimiter,
    enabled: bool,
}

impl RateLimiters {
    pub fn new(storage: Arc<StorageAdapter>, enabled: bool) -> Self {
        Self {
            login: RateLimiter::new(storage.clone(), "login", 5, 300.0, 900.0, 3600.0),
            pin: RateLimiter::new(storage.clone(), "pin", 3, 600.0, 900.0, 7200.0),
            global: RateLimiter::new(storage, "global", 10, 60.0, 900.0, 1800.0),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Check one class; a disabled limiter always allows.
    pub async fn check(&self, limiter: &RateLimiter, identifier: &str) -> Result<RateCheck> {
        if !self.enabled {
            return Ok(RateCheck::allowed());
        }
        limiter.check(identifier).await
    }

    pub async fn record(
        &self,
        limiter: &RateLimiter,
        identifier: &str,
        success: bool,
    ) -> Result<Option<f64>> {
        if !self.enabled {
            return Ok(None);
        }
        limiter.record(identifier, success).await
    }

    /// Sweep all three buckets.
    pub async fn cleanup(&self) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        Ok(self.login.cleanup().await?
            + self.pin.cleanup().await?
            + self.global.cleanup().await?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
