use std::sync::Arc;

use crate::ChannelAdapter;
use crate::commands::{self, Command, parse_command};
use crate::rate_limiter::CommandRateLimiter;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serenity::builder::{CreateMessage, GetMessages};
use serenity::http::Http;
use serenity::model::channel::Message as DiscordMessage;
use serenity::model::gateway::Ready;
use serenity::model::id::{
    ChannelId as DiscordChannelId, GuildId, MessageId as DiscordMessageId, UserId as DiscordUserId,
};
use serenity::model::permissions::Permissions;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};
use trackwatch_core::{
    Attachment, ChannelRef, ChatMessage, CommunityId, HistorySource, MemberRef, MemberResolver,
    MessageId, Notifier, TrackwatchError, UserId,
};
use trackwatch_engine::Tracker;

/// Discord rejects messages longer than this.
const MAX_MESSAGE_LEN: usize = 2000;

/// 2015-01-01T00:00:00Z in unix milliseconds, the zero point of snowflake ids.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Parse a snowflake, rejecting zero (serenity ids are non-zero).
fn snowflake(kind: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| {
            anyhow!(TrackwatchError::Resolution {
                what: format!("{kind} id"),
                message: format!("{raw:?} is not a Discord snowflake"),
            })
        })
}

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(err, serenity::Error::Http(e) if e.status_code().map(|s| s.as_u16()) == Some(404))
}

/// Creation time carried in the top 42 bits of a snowflake, in unix milliseconds.
fn snowflake_millis(id: u64) -> i64 {
    (id >> 22) as i64 + DISCORD_EPOCH_MS
}

/// Platform-neutral view of a Discord message.
pub fn to_chat_message(msg: &DiscordMessage) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(msg.id.to_string()),
        author: UserId::new(msg.author.id.to_string()),
        system_authored: msg.author.bot || msg.author.system,
        timestamp_ms: snowflake_millis(msg.id.get()),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
    }
}

/// Owners always count as administrators; otherwise any role granting
/// Administrator does.
pub fn grants_administrator(is_owner: bool, role_permissions: impl IntoIterator<Item = Permissions>) -> bool {
    is_owner
        || role_permissions
            .into_iter()
            .any(|p| p.contains(Permissions::ADMINISTRATOR))
}

/// Cut `text` to fit one Discord message, on a line boundary where possible.
pub fn truncate_for_discord(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    let budget = MAX_MESSAGE_LEN - 2;
    let cut: String = text.chars().take(budget).collect();
    let cut = match cut.rfind('\n') {
        Some(i) if i > 0 => cut[..i].to_string(),
        _ => cut,
    };
    format!("{cut}\n…")
}

/// REST side of the bot: sends reminders, resolves members, pages history.
pub struct DiscordAdapter {
    http: Arc<Http>,
}

impl DiscordAdapter {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl Notifier for DiscordAdapter {
    async fn send_direct(&self, member: &MemberRef, text: &str) -> Result<()> {
        let user = DiscordUserId::new(snowflake("user", member.user.as_str())?);
        user.direct_message(&self.http, CreateMessage::new().content(text))
            .await
            .map_err(|e| TrackwatchError::Delivery {
                target: member.tag.clone(),
                message: e.to_string(),
            })?;
        debug!(member = %member.tag, "Sent DM");
        Ok(())
    }

    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<()> {
        let id = DiscordChannelId::new(snowflake("channel", channel.channel.as_str())?);
        id.say(&self.http, text)
            .await
            .map_err(|e| TrackwatchError::Delivery {
                target: channel.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl MemberResolver for DiscordAdapter {
    async fn resolve_member(&self, community: &CommunityId, user: &UserId) -> Result<Option<MemberRef>> {
        let guild = GuildId::new(snowflake("guild", community.as_str())?);
        let user_id = DiscordUserId::new(snowflake("user", user.as_str())?);

        match guild.member(&self.http, user_id).await {
            Ok(member) => Ok(Some(MemberRef {
                user: user.clone(),
                mention: format!("<@{}>", member.user.id),
                tag: member.user.tag(),
            })),
            // Left the server or deleted their account.
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(TrackwatchError::Resolution {
                what: format!("member {user} in {community}"),
                message: e.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl HistorySource for DiscordAdapter {
    async fn fetch_page(
        &self,
        channel: &ChannelRef,
        limit: usize,
        before: Option<&MessageId>,
    ) -> Result<Vec<ChatMessage>> {
        let id = DiscordChannelId::new(snowflake("channel", channel.channel.as_str())?);
        // Discord pages hold at most 100 messages.
        let mut request = GetMessages::new().limit(limit.clamp(1, 100) as u8);
        if let Some(before) = before {
            request = request.before(DiscordMessageId::new(snowflake("message", before.as_str())?));
        }

        let page = id
            .messages(&self.http, request)
            .await
            .map_err(|e| TrackwatchError::History {
                channel: channel.to_string(),
                message: e.to_string(),
            })?;
        Ok(page.iter().map(to_chat_message).collect())
    }
}

/// How the gateway handler treats commands.
#[derive(Debug, Clone)]
pub struct CommandSettings {
    pub prefix: String,
    pub backfill_budget: usize,
    pub backfill_on_check: bool,
}

struct Handler {
    tracker: Arc<Tracker>,
    settings: CommandSettings,
    limiter: CommandRateLimiter,
}

impl Handler {
    async fn reply(&self, ctx: &Context, channel: DiscordChannelId, text: &str) {
        if let Err(e) = channel.say(&ctx.http, truncate_for_discord(text)).await {
            warn!(channel = %channel, error = %e, "Failed to reply to command");
        }
    }

    async fn is_admin(&self, ctx: &Context, guild_id: GuildId, user: DiscordUserId) -> bool {
        let guild = match guild_id.to_partial_guild(&ctx.http).await {
            Ok(guild) => guild,
            Err(e) => {
                warn!(guild = %guild_id, error = %e, "Could not load guild for permission check");
                return false;
            }
        };
        let member = match guild_id.member(&ctx.http, user).await {
            Ok(member) => member,
            Err(e) => {
                warn!(guild = %guild_id, user = %user, error = %e, "Could not load member for permission check");
                return false;
            }
        };

        // @everyone shares the guild's id and applies to every member.
        let everyone = guild_id.get();
        let role_permissions = guild
            .roles
            .iter()
            .filter(|&(id, _)| id.get() == everyone || member.roles.contains(id))
            .map(|(_, role)| role.permissions);
        grants_administrator(guild.owner_id == user, role_permissions)
    }

    async fn run_command(&self, ctx: &Context, msg: &DiscordMessage, channel: &ChannelRef, command: Command) {
        let reply_to = msg.channel_id;
        match command {
            Command::Check => {
                self.reply(ctx, reply_to, commands::CHECK_STARTED).await;
                if self.settings.backfill_on_check {
                    self.tracker
                        .run_backfill(channel, self.settings.backfill_budget)
                        .await;
                }
                let report = self.tracker.run_check_pass().await;
                let text = format!("{} {}", commands::CHECK_DONE, commands::check_summary(&report));
                self.reply(ctx, reply_to, &text).await;
            }
            Command::TestPing => {
                self.reply(ctx, reply_to, commands::TESTPING_STARTED).await;
                let report = self.tracker.run_check_pass().await;
                let text = format!("{} {}", commands::TESTPING_DONE, commands::check_summary(&report));
                self.reply(ctx, reply_to, &text).await;
            }
            Command::Backfill { budget } => {
                let budget = budget.unwrap_or(self.settings.backfill_budget);
                let report = self.tracker.run_backfill(channel, budget).await;
                self.reply(ctx, reply_to, &commands::backfill_summary(&report)).await;
            }
            Command::Status => {
                let rows = self
                    .tracker
                    .channel_status(channel, Utc::now().timestamp_millis());
                self.reply(ctx, reply_to, &commands::status_lines(&rows)).await;
            }
            Command::Reset => {
                self.tracker.reset();
                self.reply(ctx, reply_to, commands::RESET_DONE).await;
            }
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: DiscordMessage) {
        // Direct messages are never tracked.
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let channel = ChannelRef::new(guild_id.to_string(), msg.channel_id.to_string());
        let chat = to_chat_message(&msg);
        self.tracker.observe_message(&channel, &chat);

        if chat.system_authored {
            return;
        }
        let Some(command) = parse_command(&self.settings.prefix, &msg.content) else {
            return;
        };
        info!(command = ?command, channel = %channel, author = %msg.author.tag(), "Command received");

        if command.is_heavy() {
            let limit = self.limiter.check(channel.channel.as_str()).await;
            if !limit.allowed {
                self.reply(&ctx, msg.channel_id, &commands::rate_limited(limit.reset_in_secs))
                    .await;
                return;
            }
        }
        if command.requires_admin() && !self.is_admin(&ctx, guild_id, msg.author.id).await {
            warn!(author = %msg.author.tag(), command = ?command, "Denied admin command");
            self.reply(&ctx, msg.channel_id, commands::ADMIN_ONLY).await;
            return;
        }
        self.run_command(&ctx, &msg, &channel, command).await;
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!(bot = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");
    }
}

/// Gateway side of the bot: observes messages and answers commands.
pub struct DiscordBot {
    token: String,
    tracker: Arc<Tracker>,
    settings: CommandSettings,
}

impl DiscordBot {
    pub fn new(token: String, tracker: Arc<Tracker>, settings: CommandSettings) -> Self {
        Self {
            token,
            tracker,
            settings,
        }
    }
}

#[async_trait]
impl ChannelAdapter for DiscordBot {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<()> {
        info!(prefix = %self.settings.prefix, "Starting Discord gateway");

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = Handler {
            tracker: Arc::clone(&self.tracker),
            settings: self.settings.clone(),
            limiter: CommandRateLimiter::default(),
        };
        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await?;

        if let Err(why) = client.start().await {
            error!(error = %why, "Discord client error");
            anyhow::bail!("Discord client error: {why}");
        }

        Ok(())
    }
}
