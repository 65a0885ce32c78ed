use async_trait::async_trait;

pub mod commands;
pub mod discord;
pub mod rate_limiter;

pub use commands::{Command, parse_command};
pub use discord::{CommandSettings, DiscordAdapter, DiscordBot};
pub use rate_limiter::{CommandRateLimiter, RateLimitPolicy, RateLimitResult};

/// Chat platform front ends implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Connect and process inbound events until the connection ends.
    async fn start(&self) -> anyhow::Result<()>;
}
