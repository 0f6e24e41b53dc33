// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the submission endpoint.
//!
//! Every client address gets a counter that resets when its window elapses.
//! This is a fixed window, not a sliding one: a client can spend its whole
//! quota at the end of one window and again at the start of the next, so up
//! to `2 * max_requests` submissions may land within a short span around a
//! boundary. State lives in memory only and is lost on restart.
//!
//! Expired windows are pruned when a new address arrives and the table has
//! reached its prune threshold. After each pass the threshold moves to twice
//! the surviving size (never below `max_tracked_clients`), so a flood of live
//! distinct addresses pays for one full scan per doubling, not per request.

use crate::config::RateLimitConfig;
use crate::response::ApiResponse;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

pub const RATE_LIMITED_MESSAGE: &str = "Too many email requests. Please try again later.";
pub const RATE_LIMITED_ERROR: &str = "Rate limit exceeded";

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Counter for one client address.
#[derive(Debug)]
struct RateWindow {
    count: u32,
    started_at: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            count: 1,
            started_at: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.started_at) >= window
    }

    fn reset_in(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.started_at))
    }
}

/// Thread-safe rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Per-IP windows
    table: Arc<RwLock<WindowTable>>,
}

#[derive(Debug)]
struct WindowTable {
    windows: HashMap<IpAddr, RateWindow>,
    /// Size at which the next new address triggers a prune pass.
    prune_at: usize,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            table: Arc::new(RwLock::new(WindowTable {
                windows: HashMap::new(),
                prune_at: config.max_tracked_clients,
            })),
            config,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.config.max_requests
    }

    /// Count a request from `ip` against its current window.
    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        let window = self.config.window_duration();
        let max = self.config.max_requests;

        // Read, compare and increment under one guard.
        let mut table = self.table.write().await;
        let now = Instant::now();

        if table.windows.len() >= table.prune_at && !table.windows.contains_key(&ip) {
            let before = table.windows.len();
            table.windows.retain(|_, w| !w.is_expired(now, window));
            table.prune_at = self
                .config
                .max_tracked_clients
                .max(table.windows.len().saturating_mul(2));
            debug!(
                pruned = before - table.windows.len(),
                next_prune_at = table.prune_at,
                "Pruned expired rate windows"
            );
        }

        let windows = &mut table.windows;

        let entry = windows
            .entry(ip)
            .and_modify(|w| {
                if w.is_expired(now, window) {
                    *w = RateWindow::new(now);
                } else {
                    w.count = w.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RateWindow::new(now));

        let reset_in = entry.reset_in(now, window);
        if entry.count > max {
            debug!(%ip, count = entry.count, ?reset_in, "Rate limit exceeded");
            RateLimitResult::Limited {
                retry_after: reset_in,
            }
        } else {
            RateLimitResult::Allowed {
                remaining: max - entry.count,
                reset_in,
            }
        }
    }

    /// Number of client addresses currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.table.read().await.windows.len()
    }
}

/// Middleware that rejects over-quota clients before the handler runs.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = addr.ip();
    let limit = limiter.max_requests();

    match limiter.check(ip).await {
        RateLimitResult::Allowed {
            remaining,
            reset_in,
        } => {
            let mut response = next.run(request).await;
            insert_rate_headers(response.headers_mut(), limit, remaining, reset_in);
            response
        }
        RateLimitResult::Limited { retry_after } => {
            info!(
                %ip,
                retry_after_secs = retry_after.as_secs(),
                "Request rate limited"
            );
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ApiResponse::<()>::failure(
                    RATE_LIMITED_MESSAGE,
                    RATE_LIMITED_ERROR,
                )),
            )
                .into_response();
            let headers = response.headers_mut();
            insert_rate_headers(headers, limit, 0, retry_after);
            headers.insert("Retry-After", HeaderValue::from(ceil_secs(retry_after)));
            response
        }
    }
}

fn insert_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_in: Duration) {
    headers.insert("RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("RateLimit-Remaining", HeaderValue::from(remaining));
    headers.insert("RateLimit-Reset", HeaderValue::from(ceil_secs(reset_in)));
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_ms,
            max_requests,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_window_limiting() {
        let limiter = limiter(5, 60_000);
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        // First 5 requests should succeed
        for expected_remaining in (0..5).rev() {
            match limiter.check(ip).await {
                RateLimitResult::Allowed { remaining, .. } => {
                    assert_eq!(remaining, expected_remaining)
                }
                RateLimitResult::Limited { .. } => panic!("Should not be limited"),
            }
        }

        // 6th request should be limited
        assert!(!limiter.check(ip).await.is_allowed());

        // Window elapses, counter starts over
        tokio::time::advance(Duration::from_millis(60_000)).await;
        assert_eq!(
            limiter.check(ip).await,
            RateLimitResult::Allowed {
                remaining: 4,
                reset_in: Duration::from_millis(60_000),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_not_sliding() {
        let limiter = limiter(2, 10_000);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(limiter.check(ip).await.is_allowed());
        tokio::time::advance(Duration::from_millis(9_000)).await;
        assert!(limiter.check(ip).await.is_allowed());
        assert_eq!(
            limiter.check(ip).await,
            RateLimitResult::Limited {
                retry_after: Duration::from_millis(1_000),
            }
        );

        // Boundary burst: a fresh window opens right after the old one.
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(limiter.check(ip).await.is_allowed());
        assert!(limiter.check(ip).await.is_allowed());
        assert!(!limiter.check(ip).await.is_allowed());
    }

    #[tokio::test]
    async fn test_addresses_independent() {
        let limiter = limiter(1, 60_000);
        let a = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2));

        assert!(limiter.check(a).await.is_allowed());
        assert!(!limiter.check(a).await.is_allowed());
        assert!(limiter.check(b).await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_windows_pruned() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 1_000,
            max_requests: 5,
            max_tracked_clients: 2,
        });

        limiter.check(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))).await;
        limiter.check(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 2))).await;
        assert_eq!(limiter.tracked_clients().await, 2);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        limiter.check(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 3))).await;
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_flood_defers_next_prune() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 1_000,
            max_requests: 5,
            max_tracked_clients: 2,
        });

        // Table full of live windows: the pass frees nothing and the
        // threshold doubles.
        for last in 1..=3 {
            limiter.check(IpAddr::V4(Ipv4Addr::new(2, 2, 2, last))).await;
        }
        assert_eq!(limiter.tracked_clients().await, 3);

        // Everything has expired, but the table is still below the new
        // threshold, so no scan runs yet.
        tokio::time::advance(Duration::from_millis(1_500)).await;
        limiter.check(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 4))).await;
        assert_eq!(limiter.tracked_clients().await, 4);

        // Threshold reached: expired windows go.
        limiter.check(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 5))).await;
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_counted_once_each() {
        let limiter = limiter(5, 60_000);
        let ip = IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check(ip).await.is_allowed() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1_000)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1_001)), 2);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }
}
