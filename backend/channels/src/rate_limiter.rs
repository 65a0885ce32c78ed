//! Command throttle: fixed-window limit on heavy commands per channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Max heavy commands allowed per window.
    pub max_commands: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_commands: 3,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Seconds until the window resets.
    pub reset_in_secs: u64,
    pub remaining: u32,
}

struct Window {
    count: u32,
    started: Instant,
}

pub struct CommandRateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
}

impl CommandRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one command against `channel` and report whether it may run.
    pub async fn check(&self, channel: &str) -> RateLimitResult {
        self.check_at(channel, Instant::now()).await
    }

    async fn check_at(&self, channel: &str, now: Instant) -> RateLimitResult {
        let mut windows = self.windows.lock().await;
        // Forget expired windows so the map stays bounded by active channels.
        windows.retain(|_, w| now.duration_since(w.started) < self.policy.window);

        let window = windows.entry(channel.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        let reset_in_secs = self
            .policy
            .window
            .saturating_sub(now.duration_since(window.started))
            .as_secs();

        if window.count < self.policy.max_commands {
            window.count += 1;
            let remaining = self.policy.max_commands - window.count;
            debug!(channel, count = window.count, remaining, "Command allowed");
            RateLimitResult { allowed: true, reset_in_secs, remaining }
        } else {
            debug!(channel, count = window.count, "Command throttled");
            RateLimitResult { allowed: false, reset_in_secs, remaining: 0 }
        }
    }
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
