use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Sentiment tag attached to a comment by the enrichment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
    Neutral,
    Confused,
}

/// Words that signal a negative reading when the model doesn't name a class.
const CONTEXTUAL_NEGATIVE: &[&str] = &[
    "hate",
    "discriminatory",
    "violent",
    "dehumanizing",
    "derogatory",
    "offensive",
    "harmful",
    "stereotypes",
    "violence",
    "assault",
    "punishment",
];

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(positive|negative|neutral|confused)").expect("static regex is valid")
    })
}

impl Label {
    /// Normalize free-form classifier output into a label.
    ///
    /// An explicit class name wins; otherwise contextual vocabulary maps to
    /// `Negative`; anything else is `Confused`.
    pub fn from_model_output(output: &str) -> Self {
        let lowered = output.trim().to_lowercase();

        if let Some(m) = label_pattern().find(&lowered) {
            return match m.as_str() {
                "positive" => Label::Positive,
                "negative" => Label::Negative,
                "neutral" => Label::Neutral,
                _ => Label::Confused,
            };
        }

        if CONTEXTUAL_NEGATIVE.iter().any(|kw| lowered.contains(kw)) {
            return Label::Negative;
        }

        Label::Confused
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
            Label::Neutral => "neutral",
            Label::Confused => "confused",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment's label as it arrived on the wire.
///
/// Values outside the four classes are kept verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentLabel {
    Known(Label),
    Other(serde_json::Value),
}

impl CommentLabel {
    pub fn known(&self) -> Option<Label> {
        match self {
            CommentLabel::Known(label) => Some(*label),
            CommentLabel::Other(_) => None,
        }
    }
}

impl From<Label> for CommentLabel {
    fn from(label: Label) -> Self {
        CommentLabel::Known(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_class() {
        assert_eq!(Label::from_model_output("Positive"), Label::Positive);
        assert_eq!(Label::from_model_output("  NEGATIVE.\n"), Label::Negative);
        assert_eq!(Label::from_model_output("The sentiment is neutral"), Label::Neutral);
    }

    #[test]
    fn test_first_class_wins() {
        assert_eq!(
            Label::from_model_output("negative, not positive"),
            Label::Negative
        );
    }

    #[test]
    fn test_contextual_keyword() {
        assert_eq!(
            Label::from_model_output("This comment contains hate speech"),
            Label::Negative
        );
        assert_eq!(Label::from_model_output("derogatory"), Label::Negative);
    }

    #[test]
    fn test_fallback_confused() {
        assert_eq!(Label::from_model_output("Error"), Label::Confused);
        assert_eq!(Label::from_model_output(""), Label::Confused);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Label::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
    }

    #[test]
    fn test_comment_label_keeps_unknown_values() {
        let known: CommentLabel = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(known.known(), Some(Label::Negative));

        let other: CommentLabel = serde_json::from_str("\"Positive\"").unwrap();
        assert_eq!(other.known(), None);
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"Positive\"");

        let scored: CommentLabel = serde_json::from_str(r#"{"score":0.9}"#).unwrap();
        assert_eq!(serde_json::to_string(&scored).unwrap(), r#"{"score":0.9}"#);
    }
}
