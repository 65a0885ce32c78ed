//! Decides whether a chat attachment counts as a posted track.
//!
//! The filename extension is the only signal; content types are ignored so
//! the check stays deterministic and works offline.

use crate::types::{Attachment, ChatMessage};

/// Audio extensions accepted when no override is configured.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac", "opus"];

#[derive(Debug, Clone)]
pub struct AttachmentClassifier {
    /// Lowercase, without the leading dot.
    extensions: Vec<String>,
}

impl AttachmentClassifier {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        extensions.sort();
        extensions.dedup();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_qualifying(&self, attachment: &Attachment) -> bool {
        let name = attachment.filename.trim();
        let Some((stem, ext)) = name.rsplit_once('.') else {
            return false;
        };
        if stem.is_empty() {
            return false;
        }
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// A message qualifies when a human posted at least one qualifying attachment.
    pub fn is_qualifying_message(&self, message: &ChatMessage) -> bool {
        !message.system_authored && message.attachments.iter().any(|a| self.is_qualifying(a))
    }
}

impl Default for AttachmentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIO_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageId, UserId};

    fn att(name: &str) -> Attachment {
        Attachment::named(name)
    }

    #[test]
    fn matches_audio_extensions_case_insensitively() {
        let c = AttachmentClassifier::default();
        assert!(c.is_qualifying(&att("demo.mp3")));
        assert!(c.is_qualifying(&att("Final Mix.WAV")));
        assert!(c.is_qualifying(&att("  take2.Opus  ")));
        assert!(c.is_qualifying(&att("loop.v2.flac")));
    }

    #[test]
    fn rejects_other_files() {
        let c = AttachmentClassifier::default();
        assert!(!c.is_qualifying(&att("cover.png")));
        assert!(!c.is_qualifying(&att("README")));
        assert!(!c.is_qualifying(&att("mp3")));
        assert!(!c.is_qualifying(&att(".mp3")));
        assert!(!c.is_qualifying(&att("song.mp3.zip")));
        assert!(!c.is_qualifying(&att("")));
    }

    #[test]
    fn ignores_content_type() {
        let c = AttachmentClassifier::default();
        let lying = Attachment {
            filename: "notes.txt".into(),
            content_type: Some("audio/mpeg".into()),
        };
        assert!(!c.is_qualifying(&lying));
    }

    #[test]
    fn custom_extensions_are_normalized() {
        let c = AttachmentClassifier::new([".MID", "aiff", " "]);
        assert_eq!(c.extensions(), &["aiff".to_string(), "mid".to_string()]);
        assert!(c.is_qualifying(&att("beat.mid")));
        assert!(!c.is_qualifying(&att("beat.mp3")));
    }

    #[test]
    fn system_messages_never_qualify() {
        let c = AttachmentClassifier::default();
        let mut msg = ChatMessage {
            id: MessageId::new("1"),
            author: UserId::new("42"),
            system_authored: true,
            timestamp_ms: 0,
            attachments: vec![att("song.mp3")],
        };
        assert!(!c.is_qualifying_message(&msg));
        msg.system_authored = false;
        assert!(c.is_qualifying_message(&msg));
        msg.attachments = vec![att("photo.jpg")];
        assert!(!c.is_qualifying_message(&msg));
    }
}
