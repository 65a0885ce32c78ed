use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds in one day, the unit every deadline computation uses.
pub const MS_PER_DAY: i64 = 86_400_000;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

snowflake_id!(
    /// A community (Discord guild) identifier.
    CommunityId
);
snowflake_id!(
    /// A text channel identifier, unique across communities.
    ChannelId
);
snowflake_id!(
    /// A platform user identifier.
    UserId
);
snowflake_id!(
    /// A message identifier, used as the pagination cursor for history pages.
    MessageId
);

/// The unique identity of an activity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityKey {
    pub community: CommunityId,
    pub channel: ChannelId,
    pub user: UserId,
}

impl ActivityKey {
    pub fn new(
        community: impl Into<CommunityId>,
        channel: impl Into<ChannelId>,
        user: impl Into<UserId>,
    ) -> Self {
        Self {
            community: community.into(),
            channel: channel.into(),
            user: user.into(),
        }
    }

    pub fn channel_ref(&self) -> ChannelRef {
        ChannelRef {
            community: self.community.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.community, self.channel, self.user)
    }
}

/// A channel handle qualified by its community.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub community: CommunityId,
    pub channel: ChannelId,
}

impl ChannelRef {
    pub fn new(community: impl Into<CommunityId>, channel: impl Into<ChannelId>) -> Self {
        Self {
            community: community.into(),
            channel: channel.into(),
        }
    }

    pub fn key_for(&self, user: impl Into<UserId>) -> ActivityKey {
        ActivityKey {
            community: self.community.clone(),
            channel: self.channel.clone(),
            user: user.into(),
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.community, self.channel)
    }
}

/// A reminder threshold expressed as "days left before the deadline".
///
/// Fewer days means more severe; `0` is the overdue threshold. Ordering
/// (`Ord`) follows the raw day count, so use [`Threshold::is_more_severe_than`]
/// whenever severity is what matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(u32);

impl Threshold {
    pub const OVERDUE: Threshold = Threshold(0);

    pub const fn days(days: u32) -> Self {
        Self(days)
    }

    pub fn day_count(self) -> u32 {
        self.0
    }

    pub fn is_overdue(self) -> bool {
        self.0 == 0
    }

    pub fn is_more_severe_than(self, other: Threshold) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_overdue() {
            f.write_str("overdue")
        } else {
            write!(f, "{}d", self.0)
        }
    }
}

/// Last known qualifying activity for one (community, channel, user) triple.
///
/// Serialized field names match the `audioData.json` layout so existing data
/// files keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Milliseconds since the epoch.
    #[serde(default, rename = "lastAudio", alias = "lastActivityAt")]
    pub last_activity_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notified_threshold: Option<Threshold>,
}

impl ActivityRecord {
    pub fn new(last_activity_at: i64) -> Self {
        Self {
            last_activity_at,
            last_notified_threshold: None,
        }
    }

    /// Fractional days remaining until the deadline; negative once overdue.
    pub fn days_left(&self, now_ms: i64, target_days: u32) -> f64 {
        let elapsed_days = (now_ms - self.last_activity_at) as f64 / MS_PER_DAY as f64;
        f64::from(target_days) - elapsed_days
    }

    /// Deadline in milliseconds since the epoch.
    pub fn due_at(&self, target_days: u32) -> i64 {
        self.last_activity_at + i64::from(target_days) * MS_PER_DAY
    }
}

/// A record together with the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedActivity {
    pub key: ActivityKey,
    pub record: ActivityRecord,
}

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
        }
    }
}

/// A platform-neutral view of one chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: UserId,
    /// Bot accounts and platform system messages never count as activity.
    pub system_authored: bool,
    /// Milliseconds since the epoch.
    pub timestamp_ms: i64,
    pub attachments: Vec<Attachment>,
}

/// A resolved community member that notifications can be addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub user: UserId,
    /// Text that pings the member when posted, e.g. `<@123>`.
    pub mention: String,
    /// Human-readable handle used in logs.
    pub tag: String,
}
