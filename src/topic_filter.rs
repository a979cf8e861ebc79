//! Unsupported-topic filter
//!
//! The data is a single current snapshot with no history and no predictive
//! model behind it, so questions about forecasts or specific past years are
//! turned away before the language model is asked anything.

/// Substrings that mark a question as out of scope.
pub const UNSUPPORTED_TERMS: [&str; 9] = [
    "forecast",
    "predict",
    "future",
    "2020",
    "2021",
    "2022",
    "2023",
    "last year",
    "next year",
];

#[derive(Debug, Clone)]
pub struct TopicFilter {
    deny_list: Vec<String>,
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self::new(UNSUPPORTED_TERMS.iter().map(|t| t.to_string()).collect())
    }
}

impl TopicFilter {
    pub fn new(deny_list: Vec<String>) -> Self {
        Self {
            deny_list: deny_list.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// True unless the lower-cased question contains a deny-listed term.
    pub fn is_supported(&self, question: &str) -> bool {
        self.matched_term(question).is_none()
    }

    /// First deny-listed term found in the question, if any.
    pub fn matched_term(&self, question: &str) -> Option<&str> {
        let q = question.to_lowercase();
        self.deny_list
            .iter()
            .find(|term| q.contains(term.as_str()))
            .map(|s| s.as_str())
    }
}

/// Free-function form over the default deny-list.
pub fn is_supported(question: &str) -> bool {
    TopicFilter::default().is_supported(question)
}
