//! Prompt templates.
//!
//! A template is plain text containing the literal placeholders
//! `{{ system }}` and `{{ question }}`. Rendering replaces each occurrence
//! with the job's field verbatim in a single left-to-right pass, so text
//! substituted from a job is never itself scanned for placeholders. Any
//! other `{{ ... }}` sequence is left untouched.

use std::path::{Path, PathBuf};

/// Placeholder replaced with the job's `system` text.
pub const SYSTEM_PLACEHOLDER: &str = "{{ system }}";

/// Placeholder replaced with the job's `question` text.
pub const QUESTION_PLACEHOLDER: &str = "{{ question }}";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A prompt template loaded once at startup and shared by all workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wrap template text that is already in memory.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|source| TemplateError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the template references at least one known placeholder.
    pub fn has_placeholders(&self) -> bool {
        self.text.contains(SYSTEM_PLACEHOLDER) || self.text.contains(QUESTION_PLACEHOLDER)
    }

    /// Substitute `system` and `question` into the template.
    pub fn render(&self, system: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + system.len() + question.len());
        let mut rest = self.text.as_str();

        loop {
            let next_system = rest.find(SYSTEM_PLACEHOLDER);
            let next_question = rest.find(QUESTION_PLACEHOLDER);

            let (at, placeholder, value) = match (next_system, next_question) {
                (Some(s), Some(q)) if s <= q => (s, SYSTEM_PLACEHOLDER, system),
                (_, Some(q)) => (q, QUESTION_PLACEHOLDER, question),
                (Some(s), None) => (s, SYSTEM_PLACEHOLDER, system),
                (None, None) => break,
            };

            out.push_str(&rest[..at]);
            out.push_str(value);
            rest = &rest[at + placeholder.len()..];
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const PHI3: &str = "<|system|>\n{{ system }}<|end|>\n<|user|>\n{{ question }}<|end|>\n<|assistant|>\n";

    #[test]
    fn substitutes_both_placeholders() {
        let template = PromptTemplate::new(PHI3);
        let prompt = template.render("Continue the tale", "Once upon a time in a castle");
        assert_eq!(
            prompt,
            "<|system|>\nContinue the tale<|end|>\n<|user|>\nOnce upon a time in a castle<|end|>\n<|assistant|>\n"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = PromptTemplate::new(PHI3);
        let a = template.render("s", "q");
        let b = template.render("s", "q");
        assert_eq!(a, b);
    }

    #[test]
    fn replaces_every_occurrence() {
        let template = PromptTemplate::new("{{ question }} / {{ question }} ({{ system }})");
        assert_eq!(template.render("S", "Q"), "Q / Q (S)");
    }

    #[test]
    fn unknown_placeholders_are_left_untouched() {
        let template = PromptTemplate::new("{{ user }} {{system}} {{ system }}");
        assert_eq!(template.render("S", "Q"), "{{ user }} {{system}} S");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let template = PromptTemplate::new("{{ system }}|{{ question }}");
        let prompt = template.render("{{ question }}", "{{ system }}");
        assert_eq!(prompt, "{{ question }}|{{ system }}");
    }

    #[test]
    fn template_without_placeholders_renders_verbatim() {
        let template = PromptTemplate::new("static prompt");
        assert!(!template.has_placeholders());
        assert_eq!(template.render("S", "Q"), "static prompt");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PHI3.as_bytes()).unwrap();

        let template = PromptTemplate::load(file.path()).unwrap();
        assert_eq!(template.as_str(), PHI3);
        assert!(template.has_placeholders());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PromptTemplate::load("/definitely/not/here.template").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.template"));
    }
}
