//! Log Redaction Layer
//!
//! Scrubs bot tokens and bearer credentials from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

/// Discord bot tokens: base64 user id, timestamp, and HMAC separated by dots.
static BOT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_-]{23,28}\.[A-Za-z0-9_-]{6,7}\.[A-Za-z0-9_-]{27,}").unwrap()
});
static BEARER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Bot|Bearer)\s+[A-Za-z0-9\-\._~+/]+=*").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "$1 [REDACTED_TOKEN]");
    BOT_TOKEN_RE.replace_all(&redacted, "[REDACTED_TOKEN]").into_owned()
}

/// Describe whether a secret is set without revealing it.
pub fn presence(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.trim().is_empty() => "present",
        _ => "missing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let token = "MTA5ODc2NTQzMjEwOTg3NjU0Mw.GhIjKl.abcdefghijklmnopqrstuvwxyz0123";
        let raw = format!("login failed with {token} and header Bot abc.def");
        let clean = redact_sensitive_data(&raw);
        assert!(!clean.contains(token));
        assert!(!clean.contains("abc.def"));
        assert!(clean.contains("[REDACTED_TOKEN]"));
    }

    #[test]
    fn leaves_plain_text_alone() {
        let raw = "user 123456789 posted demo.mp3";
        assert_eq!(redact_sensitive_data(raw), raw);
    }

    #[test]
    fn presence_never_echoes_secret() {
        assert_eq!(presence(Some("secret")), "present");
        assert_eq!(presence(Some("  ")), "missing");
        assert_eq!(presence(None), "missing");
    }
}
