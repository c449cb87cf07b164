//! Under-specified question heuristic.
//!
//! Decides whether a question is too short or too generic to answer
//! directly, which switches the sanitizer's closing style from a statement
//! to a single clarifying question.

use crate::config::SanitizeConfig;

#[derive(Debug, Clone)]
pub struct VaguenessClassifier {
    max_trivial_chars: usize,
    generic_token: String,
    topic_keywords: Vec<String>,
}

impl VaguenessClassifier {
    pub fn new(config: &SanitizeConfig) -> Self {
        Self {
            max_trivial_chars: config.max_trivial_chars,
            generic_token: config.generic_token.clone(),
            topic_keywords: config.topic_keywords.clone(),
        }
    }

    /// Order matters: the length check short-circuits before the keyword
    /// check.
    pub fn is_vague(&self, question: &str) -> bool {
        let q = question.trim();
        if q.is_empty() {
            return true;
        }
        if q.chars().count() <= self.max_trivial_chars {
            return true;
        }
        if q.contains(&self.generic_token)
            && !self.topic_keywords.iter().any(|kw| q.contains(kw.as_str()))
        {
            return true;
        }
        false
    }
}
