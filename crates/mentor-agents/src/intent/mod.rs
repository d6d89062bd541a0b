//! Intent classification from raw message text.
//!
//! Keyword sets are scanned in a fixed priority order (scheduling, then
//! course info, then enrollment). The first set with a keyword contained in
//! the lower-cased message wins; otherwise the message is `general`.

pub mod time_parser;

use mentor_core::types::IntentLabel;

/// Keyword sets in priority order.
const KEYWORDS: [(IntentLabel, &[&str]); 3] = [
    (IntentLabel::Scheduling, &["book", "schedule", "appointment"]),
    (IntentLabel::CourseInfo, &["course", "program", "curriculum"]),
    (IntentLabel::Enrollment, &["enroll", "signup", "register"]),
];

/// Outcome of classifying one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: IntentLabel,
    /// The keyword that decided the label; `None` for `general`.
    pub keyword: Option<&'static str>,
}

/// Deterministic keyword classifier. Never fails and never suspends.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str) -> IntentLabel {
        self.explain(message).label
    }

    /// Classify and report which keyword matched.
    pub fn explain(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();
        for (label, keywords) in KEYWORDS {
            if let Some(keyword) = keywords.iter().find(|k| lowered.contains(*k)) {
                return Classification {
                    label,
                    keyword: Some(*keyword),
                };
            }
        }
        Classification {
            label: IntentLabel::General,
            keyword: None,
        }
    }
}
