pub mod label;

pub use label::{CommentLabel, Label};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Logical stream identity, independent of physical broker topic names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicClass {
    Raw,
    Processed,
}

impl TopicClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicClass::Raw => "raw",
            TopicClass::Processed => "processed",
        }
    }
}

impl fmt::Display for TopicClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum MalformedRecord {
    #[error("invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),
}

/// One article with its comment thread, as produced by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier (article URL)
    pub href: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,

    /// Locale-specific date string, e.g. "الإثنين 22 أبريل 2024 - 21:21"
    #[serde(rename = "date", default)]
    pub raw_date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Fields we don't model are carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub author: String,

    #[serde(rename = "date", default)]
    pub raw_date: String,

    #[serde(default)]
    pub text: String,

    #[serde(default, deserialize_with = "deserialize_likes")]
    pub likes: Likes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<CommentLabel>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Decode and validate a broker payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MalformedRecord> {
        let record: Record = serde_json::from_slice(bytes)?;
        if record.href.trim().is_empty() {
            return Err(MalformedRecord::MissingField("href"));
        }
        Ok(record)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Reaction count. Values that aren't a plain integer are kept as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Likes {
    Count(i64),
    Raw(serde_json::Value),
}

impl Likes {
    pub fn count(&self) -> Option<i64> {
        match self {
            Likes::Count(n) => Some(*n),
            Likes::Raw(_) => None,
        }
    }
}

impl Default for Likes {
    fn default() -> Self {
        Likes::Count(0)
    }
}

impl From<i64> for Likes {
    fn from(n: i64) -> Self {
        Likes::Count(n)
    }
}

/// The scraper emits reaction counts as strings ("5", "-2"); accept both forms.
fn deserialize_likes<'de, D>(deserializer: D) -> Result<Likes, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let likes = match &value {
        serde_json::Value::Null => Likes::Count(0),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Likes::Count(i),
            None => n
                .as_f64()
                .map(|f| Likes::Count(f as i64))
                .unwrap_or(Likes::Raw(value.clone())),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Likes::Count(0)
            } else {
                s.parse::<i64>()
                    .map(Likes::Count)
                    .unwrap_or(Likes::Raw(value.clone()))
            }
        }
        _ => Likes::Raw(value.clone()),
    };
    Ok(likes)
}
