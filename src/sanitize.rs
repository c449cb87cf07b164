//! Voice-draft post-processor.
//!
//! The generation collaborator is instructed to produce a short spoken-style
//! answer, but instructions are advisory; this module is the enforcement.
//! A fixed sequence of rewrite rules strips formatting artifacts, swaps
//! banned phrases for warmer equivalents, enforces the hard length cap, and
//! resolves the closing style (statement vs. one clarifying question) from
//! the vagueness verdict on the original question.
//!
//! Rule order is load-bearing: later rules assume earlier normalization
//! (the length cap counts a single-line, de-bulleted string; the ending
//! rules run on capped text). The whole thing is a total function over any
//! string input.

use regex::Regex;

use crate::config::SanitizeConfig;
use crate::error::{PipelineError, Result};
use crate::vague::VaguenessClassifier;

pub struct Sanitizer {
    bullet_re: Regex,
    numbering_re: Regex,
    newline_re: Regex,
    bracket_re: Regex,
    ws_re: Regex,
    replacements: Vec<(Regex, String)>,
    connectives: Vec<(Regex, String)>,
    hard_cap: usize,
    vague_cap: usize,
    clarifying_question: String,
    reassurance_closer: String,
    classifier: VaguenessClassifier,
}

impl Sanitizer {
    /// Compile the rule tables once at startup. Fails only on an invalid
    /// user-supplied pattern in the config.
    pub fn new(config: &SanitizeConfig) -> Result<Self> {
        let compile = |rules: &[crate::config::ReplaceRule]| -> Result<Vec<(Regex, String)>> {
            rules
                .iter()
                .map(|rule| {
                    let re = Regex::new(&rule.pattern).map_err(|e| {
                        PipelineError::Config(format!(
                            "invalid sanitize pattern '{}': {}",
                            rule.pattern, e
                        ))
                    })?;
                    Ok((re, rule.replacement.clone()))
                })
                .collect()
        };

        Ok(Self {
            bullet_re: Regex::new(r"(?m)^\s*[-・●■◆]+\s*").unwrap(),
            numbering_re: Regex::new(r"(?m)^\s*\d+\.?\s+").unwrap(),
            newline_re: Regex::new(r"[\r\n]+").unwrap(),
            bracket_re: Regex::new(r"[【】「」『』]").unwrap(),
            ws_re: Regex::new(r"\s+").unwrap(),
            replacements: compile(&config.replacements)?,
            connectives: compile(&config.connectives)?,
            hard_cap: config.hard_cap,
            vague_cap: config.vague_cap,
            clarifying_question: config.clarifying_question.clone(),
            reassurance_closer: config.reassurance_closer.clone(),
            classifier: VaguenessClassifier::new(config),
        })
    }

    /// Rewrite a raw spoken-style draft into its final single-line form.
    /// Accepts any input; never fails.
    pub fn sanitize(&self, draft: &str, question: &str) -> String {
        let mut t = draft.trim().to_string();

        // 1. bullet / numbering accidents at line starts
        t = self.bullet_re.replace_all(&t, "").into_owned();
        t = self.numbering_re.replace_all(&t, "").into_owned();

        // 2. single line
        t = self.newline_re.replace_all(&t, " ").into_owned();

        // 3. bracket decoration
        t = self.bracket_re.replace_all(&t, "").into_owned();

        // 4. whitespace
        t = self.squeeze(&t);

        // 5. banned phrases (applied even when they match zero times)
        for (re, replacement) in &self.replacements {
            t = re.replace_all(&t, replacement.as_str()).into_owned();
        }

        // 6. split long clause-joined sentences
        for (re, replacement) in &self.connectives {
            t = re.replace_all(&t, replacement.as_str()).into_owned();
        }

        // 7. hard length cap with sentence-boundary back-off
        if t.chars().count() > self.hard_cap {
            t = cap_at_sentence(&t, self.hard_cap);
        }

        // 8. ending style
        if self.classifier.is_vague(question) {
            if !t.ends_with(['？', '?']) {
                if t.chars().count() > self.vague_cap {
                    t = cap_at_sentence(&t, self.vague_cap);
                }
                t = format!("{} {}", t, self.clarifying_question)
                    .trim()
                    .to_string();
            }
            // a vague answer ends on the question, not a reassurance
            if let Some(stripped) = t.strip_suffix(self.reassurance_closer.as_str()) {
                t = stripped.trim_end().to_string();
            }
        } else if t.ends_with(['？', '?']) {
            t.pop();
            t.push('。');
        }

        // 9. final whitespace normalization
        self.squeeze(&t)
    }

    fn squeeze(&self, text: &str) -> String {
        self.ws_re.replace_all(text, " ").trim().to_string()
    }
}

/// Truncate to `cap` chars, then back off to the last complete sentence if a
/// `。` survives the cut; otherwise keep the raw truncation.
fn cap_at_sentence(text: &str, cap: usize) -> String {
    let mut t: String = text.chars().take(cap).collect();
    if let Some(pos) = t.rfind('。') {
        t.truncate(pos + '。'.len_utf8());
    }
    t.trim().to_string()
}
