//! Reminder message templates with `{name}` placeholders.
//!
//! Rendering is a single left-to-right scan: substituted values are never
//! rescanned, and placeholders without a value are kept verbatim.

use std::collections::HashMap;

/// Placeholder replaced with the member mention.
pub const USER_PLACEHOLDER: &str = "user";
/// Placeholder replaced with the formatted due date.
pub const DUE_DATE_PLACEHOLDER: &str = "duedate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
}

impl MessageTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(|c| c == '{' || c == '}') {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let name = &after[..close];
                    match values.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    // Unterminated or nested brace: emit it literally.
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Render with the two placeholders every reminder understands.
    pub fn render_reminder(&self, user: &str, due_date: &str) -> String {
        let values = HashMap::from([
            (USER_PLACEHOLDER, user.to_string()),
            (DUE_DATE_PLACEHOLDER, due_date.to_string()),
        ]);
        self.render(&values)
    }
}

impl From<&str> for MessageTemplate {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for MessageTemplate {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}
