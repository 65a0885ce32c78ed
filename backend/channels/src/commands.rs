//! Chat commands
//!
//! Parsing and reply wording for `!check`, `!testping`, `!backfill`,
//! `!status` and `!reset`. Everything here is platform-free; the Discord
//! handler does the I/O.

use trackwatch_engine::{BackfillReport, CheckReport, MemberStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Refresh the current channel from history, then run a reminder pass.
    Check,
    /// Run a reminder pass without touching history.
    TestPing,
    /// Scan up to `budget` messages (default: configured budget).
    Backfill { budget: Option<usize> },
    Status,
    /// Wipe all tracking state. Administrators only.
    Reset,
}

impl Command {
    pub fn requires_admin(self) -> bool {
        matches!(self, Command::Reset)
    }

    /// Commands that hit history or send reminders, and so are throttled.
    pub fn is_heavy(self) -> bool {
        matches!(self, Command::Check | Command::TestPing | Command::Backfill { .. })
    }
}

/// Parse `content` as a command. Unknown commands and plain chat give `None`.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_ascii_lowercase();

    match name.as_str() {
        "check" => Some(Command::Check),
        "testping" => Some(Command::TestPing),
        "backfill" => {
            let budget = words.next().and_then(|n| n.parse::<usize>().ok()).filter(|n| *n > 0);
            Some(Command::Backfill { budget })
        }
        "status" => Some(Command::Status),
        "reset" => Some(Command::Reset),
        _ => None,
    }
}

pub const CHECK_STARTED: &str = "🔄 Updating recent audio posts...";
pub const CHECK_DONE: &str = "✅ Check complete.";
pub const TESTPING_STARTED: &str = "🧪 Running test notification simulation...";
pub const TESTPING_DONE: &str = "✅ Test complete.";
pub const RESET_DONE: &str = "🗑️ Tracking data cleared.";
pub const ADMIN_ONLY: &str = "⛔ Only administrators can do that.";
pub fn rate_limited(reset_in_secs: u64) -> String {
    format!("⏳ Slow down, try again in {}s.", reset_in_secs.max(1))
}

pub fn check_summary(report: &CheckReport) -> String {
    let mut text = format!(
        "{} tracked, {} reminder(s) sent",
        report.tracked, report.notified
    );
    if report.skipped_unresolved > 0 {
        text.push_str(&format!(", {} member(s) not found", report.skipped_unresolved));
    }
    if report.delivery_failures > 0 {
        text.push_str(&format!(", {} delivery failure(s)", report.delivery_failures));
    }
    text
}

pub fn backfill_summary(report: &BackfillReport) -> String {
    let mut text = format!(
        "📜 Scanned {} message(s): {} poster(s) found, {} updated.",
        report.messages_scanned, report.users_seen, report.users_updated
    );
    if report.aborted {
        text.push_str(" History fetch failed part way; results are partial.");
    }
    text
}

/// One line per tracked member, closest to the deadline first.
/// One line per member. Ids are shown as code, not mentions, so listing the
/// channel does not ping everyone in it.
pub fn status_lines(rows: &[MemberStatus]) -> String {
    if rows.is_empty() {
        return "No audio posts tracked in this channel yet.".to_string();
    }
    rows.iter()
        .map(|row| {
            let days = row.days_left.floor() as i64;
            let standing = if days < 0 {
                format!("overdue by {} day(s)", -days)
            } else {
                format!("{days} day(s) left")
            };
            match row.last_notified {
                Some(t) => format!("`{}`: {standing} (last reminder: {t})", row.user),
                None => format!("`{}`: {standing}", row.user),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackwatch_core::{Threshold, UserId};

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("!", "!check"), Some(Command::Check));
        assert_eq!(parse_command("!", "  !TestPing extra"), Some(Command::TestPing));
        assert_eq!(parse_command("!", "!status"), Some(Command::Status));
        assert_eq!(parse_command("!", "!reset"), Some(Command::Reset));
    }

    #[test]
    fn backfill_budget_is_optional() {
        assert_eq!(
            parse_command("!", "!backfill"),
            Some(Command::Backfill { budget: None })
        );
        assert_eq!(
            parse_command("!", "!backfill 250"),
            Some(Command::Backfill { budget: Some(250) })
        );
        assert_eq!(
            parse_command("!", "!backfill lots"),
            Some(Command::Backfill { budget: None })
        );
        assert_eq!(
            parse_command("!", "!backfill 0"),
            Some(Command::Backfill { budget: None })
        );
    }

    #[test]
    fn ignores_plain_chat_and_unknown_commands() {
        assert_eq!(parse_command("!", "check this out"), None);
        assert_eq!(parse_command("!", "!"), None);
        assert_eq!(parse_command("!", "!dance"), None);
        assert_eq!(parse_command("?", "!check"), None);
        assert_eq!(parse_command("tw!", "tw!check"), Some(Command::Check));
    }

    #[test]
    fn only_reset_needs_admin() {
        assert!(Command::Reset.requires_admin());
        assert!(!Command::Check.requires_admin());
        assert!(Command::Backfill { budget: None }.is_heavy());
        assert!(!Command::Status.is_heavy());
    }

    #[test]
    fn status_formats_days_and_last_reminder() {
        let rows = vec![
            MemberStatus {
                user: UserId::new("1"),
                last_activity_at: 0,
                days_left: -2.5,
                last_notified: Some(Threshold::OVERDUE),
            },
            MemberStatus {
                user: UserId::new("2"),
                last_activity_at: 0,
                days_left: 12.4,
                last_notified: None,
            },
        ];
        let text = status_lines(&rows);
        assert_eq!(text, "`1`: overdue by 3 day(s) (last reminder: overdue)\n`2`: 12 day(s) left");
        assert!(!text.contains("<@"));
        assert!(status_lines(&[]).starts_with("No audio posts"));
    }

    #[test]
    fn rate_limited_reply_names_the_wait() {
        assert_eq!(rate_limited(42), "⏳ Slow down, try again in 42s.");
        assert_eq!(rate_limited(0), "⏳ Slow down, try again in 1s.");
    }

    #[test]
    fn summaries_mention_problems_only_when_present() {
        let clean = CheckReport {
            tracked: 4,
            notified: 1,
            ..CheckReport::default()
        };
        assert_eq!(check_summary(&clean), "4 tracked, 1 reminder(s) sent");

        let partial = BackfillReport {
            messages_scanned: 10,
            aborted: true,
            ..BackfillReport::default()
        };
        assert!(backfill_summary(&partial).contains("partial"));
    }
}
