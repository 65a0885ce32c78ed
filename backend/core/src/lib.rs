pub mod channel;
pub mod classifier;
pub mod error;
pub mod message;
pub mod template;
pub mod traits;
pub mod types;

pub use channel::TrackerBus;
pub use classifier::{AttachmentClassifier, DEFAULT_AUDIO_EXTENSIONS};
pub use error::TrackwatchError;
pub use message::{BackfillRequest, CheckRequest, TrackerMessage};
pub use template::MessageTemplate;
pub use traits::{Component, HistorySource, MemberResolver, Notifier};
pub use types::{
    ActivityKey, ActivityRecord, Attachment, ChannelId, ChannelRef, ChatMessage, CommunityId,
    MemberRef, MessageId, Threshold, TrackedActivity, UserId, MS_PER_DAY,
};
