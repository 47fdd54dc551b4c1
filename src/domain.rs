use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::EnricherError;

/// Numeric feed identifier assigned by the podcast directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FeedId(u64);

impl FeedId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Accepts both numeric and numeric-string ids, the directory emits either.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().filter(|id| *id > 0).map(Self),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FeedId {
    type Err = EnricherError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let id = value
            .trim()
            .parse::<u64>()
            .map_err(|_| EnricherError::InvalidFeedId(value.to_string()))?;
        if id == 0 {
            return Err(EnricherError::InvalidFeedId(value.to_string()));
        }
        Ok(Self(id))
    }
}

/// An unverified search hit, pending detail confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCandidate {
    pub external_id: Option<FeedId>,
    pub title: String,
    pub feed_url: Option<String>,
    pub original_url: Option<String>,
}

impl SearchCandidate {
    pub fn from_json(value: &Value, title: String) -> Self {
        Self {
            external_id: value.get("id").and_then(FeedId::from_json),
            title,
            feed_url: text_field(value, "url"),
            original_url: text_field(value, "originalUrl"),
        }
    }

    pub fn lookup_url(&self) -> Option<&str> {
        self.feed_url.as_deref().or(self.original_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Categories {
    Map(BTreeMap<String, Value>),
    Text(String),
}

impl Categories {
    /// An empty object counts as no categories.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.is_empty() => None,
            Value::Object(map) => Some(Self::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )),
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// Serialized form stored in the output table.
    pub fn to_blob(&self) -> String {
        match self {
            Categories::Map(map) => serde_json::to_string(map).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "could not serialize categories");
                "{}".to_string()
            }),
            Categories::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedDetail {
    pub feed_id: FeedId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub feed_url: Option<String>,
    pub original_url: Option<String>,
    pub image_url: Option<String>,
    pub episode_count: Option<i64>,
    pub last_update_time: Option<i64>,
    pub categories: Option<Categories>,
    pub guid: Option<String>,
}

impl FeedDetail {
    /// Builds a detail record from the `feed` object of a podcasts/* response.
    pub fn from_json(feed: &Value) -> Result<Self, EnricherError> {
        let feed_id = feed
            .get("id")
            .and_then(FeedId::from_json)
            .ok_or_else(|| EnricherError::MissingField("feed.id".to_string()))?;

        Ok(Self {
            feed_id,
            title: text_field(feed, "title"),
            description: text_field(feed, "description"),
            feed_url: text_field(feed, "url"),
            original_url: text_field(feed, "originalUrl"),
            image_url: text_field(feed, "image").or_else(|| text_field(feed, "artwork")),
            episode_count: feed.get("episodeCount").and_then(Value::as_i64),
            last_update_time: feed.get("lastUpdateTime").and_then(Value::as_i64),
            categories: feed.get("categories").and_then(Categories::from_json),
            guid: text_field(feed, "podcastGuid"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpisodeStats {
    pub average_duration_seconds: Option<i64>,
    pub latest_episode_title: Option<String>,
}

/// One row of the `Podcasts` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastRecord {
    pub feed_id: FeedId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub feed_url: Option<String>,
    pub image_url: Option<String>,
    pub episode_count: Option<i64>,
    pub average_duration_last_10: Option<i64>,
    pub latest_episode_title: Option<String>,
    pub last_update_time: Option<i64>,
    pub categories: Option<String>,
    pub guid: Option<String>,
    pub original_url: Option<String>,
}

impl PodcastRecord {
    pub fn assemble(detail: FeedDetail, candidate: &SearchCandidate, stats: EpisodeStats) -> Self {
        Self {
            feed_id: detail.feed_id,
            title: detail.title,
            description: detail.description,
            feed_url: detail.feed_url.or_else(|| candidate.feed_url.clone()),
            image_url: detail.image_url,
            episode_count: detail.episode_count,
            average_duration_last_10: stats.average_duration_seconds,
            latest_episode_title: stats.latest_episode_title,
            last_update_time: detail.last_update_time,
            categories: detail.categories.as_ref().map(Categories::to_blob),
            guid: detail.guid,
            original_url: detail.original_url.or_else(|| candidate.original_url.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Status(u16),
    Decode,
    MissingField,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Status(status) => write!(f, "status {status}"),
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::MissingField => write!(f, "missing field"),
            FailureKind::Storage => write!(f, "storage"),
        }
    }
}

impl From<&EnricherError> for FailureKind {
    fn from(err: &EnricherError) -> Self {
        match err {
            EnricherError::DirectoryStatus { status, .. } => FailureKind::Status(*status),
            EnricherError::DirectoryDecode(_) => FailureKind::Decode,
            EnricherError::MissingField(_) => FailureKind::MissingField,
            EnricherError::Database(_) => FailureKind::Storage,
            _ => FailureKind::Transport,
        }
    }
}

/// Result of one pipeline stage for one title.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Found(T),
    NotFound,
    Failed { kind: FailureKind, detail: String },
}

impl<T> StageOutcome<T> {
    pub fn failed(err: &EnricherError) -> Self {
        StageOutcome::Failed {
            kind: FailureKind::from(err),
            detail: err.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, StageOutcome::Found(_))
    }

    pub fn describe(&self) -> String {
        match self {
            StageOutcome::Found(_) => "found".to_string(),
            StageOutcome::NotFound => "not found".to_string(),
            StageOutcome::Failed { kind, detail } => format!("{kind}: {detail}"),
        }
    }
}

/// Non-empty string field, mirroring how the directory leaves blanks for unknown values.
pub(crate) fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(|text| text.to_string())
}
