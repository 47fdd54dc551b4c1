use std::fmt;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::auth::AuthHeaders;
use crate::config::{Credentials, Settings};
use crate::domain::FeedId;
use crate::error::EnricherError;

const RAW_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    SearchByTerm,
    SearchByTitle,
    PodcastByFeedId,
    PodcastByFeedUrl,
    EpisodesByFeedId,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::SearchByTerm => "search/byterm",
            Endpoint::SearchByTitle => "search/bytitle",
            Endpoint::PodcastByFeedId => "podcasts/byfeedid",
            Endpoint::PodcastByFeedUrl => "podcasts/byfeedurl",
            Endpoint::EpisodesByFeedId => "episodes/byfeedid",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Read-only view of the podcast directory. Each call returns the decoded JSON body.
pub trait DirectoryClient: Send + Sync {
    fn search_by_term(&self, query: &str, max: u32) -> Result<Value, EnricherError>;
    fn search_by_title(&self, query: &str, max: u32) -> Result<Value, EnricherError>;
    fn podcast_by_feed_id(&self, id: FeedId) -> Result<Value, EnricherError>;
    fn podcast_by_feed_url(&self, url: &str) -> Result<Value, EnricherError>;
    fn episodes_by_feed_id(&self, id: FeedId, max: u32) -> Result<Value, EnricherError>;
}

#[derive(Clone)]
pub struct DirectoryHttpClient {
    client: Client,
    base_url: String,
    user_agent: String,
    credentials: Credentials,
}

impl DirectoryHttpClient {
    pub fn new(settings: &Settings, credentials: Credentials) -> Result<Self, EnricherError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| EnricherError::DirectoryHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            user_agent: settings.user_agent.clone(),
            credentials,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn get_json(&self, endpoint: Endpoint, query: &[(&str, String)]) -> Result<Value, EnricherError> {
        // Signed per request: the directory rejects stale auth dates.
        let headers = AuthHeaders::now(&self.credentials).to_header_map(&self.user_agent)?;
        let response = self
            .client
            .get(self.endpoint_url(endpoint))
            .headers(headers)
            .query(query)
            .send()
            .map_err(|err| EnricherError::DirectoryHttp(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| EnricherError::DirectoryHttp(err.to_string()))?;
        debug!(%endpoint, status = status.as_u16(), raw = %preview(&body), "directory response");

        if !status.is_success() {
            return Err(EnricherError::DirectoryStatus {
                status: status.as_u16(),
                message: preview(&body),
            });
        }
        serde_json::from_str(&body).map_err(|err| {
            EnricherError::DirectoryDecode(format!("{err} (response was: {})", preview(&body)))
        })
    }
}

impl DirectoryClient for DirectoryHttpClient {
    fn search_by_term(&self, query: &str, max: u32) -> Result<Value, EnricherError> {
        self.get_json(
            Endpoint::SearchByTerm,
            &[("q", query.to_string()), ("max", max.to_string())],
        )
    }

    fn search_by_title(&self, query: &str, max: u32) -> Result<Value, EnricherError> {
        self.get_json(
            Endpoint::SearchByTitle,
            &[("q", query.to_string()), ("max", max.to_string())],
        )
    }

    fn podcast_by_feed_id(&self, id: FeedId) -> Result<Value, EnricherError> {
        self.get_json(Endpoint::PodcastByFeedId, &[("id", id.to_string())])
    }

    fn podcast_by_feed_url(&self, url: &str) -> Result<Value, EnricherError> {
        self.get_json(Endpoint::PodcastByFeedUrl, &[("url", url.to_string())])
    }

    fn episodes_by_feed_id(&self, id: FeedId, max: u32) -> Result<Value, EnricherError> {
        self.get_json(
            Endpoint::EpisodesByFeedId,
            &[("id", id.to_string()), ("max", max.to_string())],
        )
    }
}

/// First 200 characters of a response body, for log lines.
pub fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(RAW_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
