use serde_json::Value;
use tracing::{info, warn};

use crate::directory::{DirectoryClient, Endpoint};
use crate::domain::{FeedDetail, FeedId, SearchCandidate, StageOutcome};
use crate::error::EnricherError;

pub struct DetailFetcher<'a, D: DirectoryClient> {
    client: &'a D,
}

impl<'a, D: DirectoryClient> DetailFetcher<'a, D> {
    pub fn new(client: &'a D) -> Self {
        Self { client }
    }

    /// Looks the candidate up by id, then by feed URL if the id path gave nothing usable.
    pub fn fetch_detail(&self, candidate: &SearchCandidate) -> StageOutcome<FeedDetail> {
        let primary = match candidate.external_id {
            Some(id) => self.by_feed_id(id),
            None => {
                warn!(candidate = %candidate.title, "candidate has no feed id");
                StageOutcome::NotFound
            }
        };
        if primary.is_found() {
            return primary;
        }

        match candidate.lookup_url() {
            Some(url) => {
                info!(candidate = %candidate.title, url, "falling back to feed url lookup");
                self.by_feed_url(url)
            }
            None => {
                warn!(candidate = %candidate.title, "no feed url to fall back to");
                primary
            }
        }
    }

    pub fn by_feed_id(&self, id: FeedId) -> StageOutcome<FeedDetail> {
        let response = self.client.podcast_by_feed_id(id);
        detail_from_response(Endpoint::PodcastByFeedId, &id.to_string(), response)
    }

    pub fn by_feed_url(&self, url: &str) -> StageOutcome<FeedDetail> {
        let response = self.client.podcast_by_feed_url(url);
        detail_from_response(Endpoint::PodcastByFeedUrl, url, response)
    }
}

fn detail_from_response(
    endpoint: Endpoint,
    key: &str,
    response: Result<Value, EnricherError>,
) -> StageOutcome<FeedDetail> {
    let payload = match response {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%endpoint, key, error = %err, "detail lookup failed");
            return StageOutcome::failed(&err);
        }
    };

    let Some(feed) = payload.get("feed").filter(|feed| is_feed_object(feed)) else {
        info!(%endpoint, key, "response carried no feed");
        return StageOutcome::NotFound;
    };

    match FeedDetail::from_json(feed) {
        Ok(detail) => {
            info!(%endpoint, key, feed_id = %detail.feed_id, "fetched feed detail");
            StageOutcome::Found(detail)
        }
        Err(err) => {
            warn!(%endpoint, key, error = %err, "unusable feed payload");
            StageOutcome::failed(&err)
        }
    }
}

// Unknown feeds come back as `"feed": []` or an empty object.
fn is_feed_object(feed: &Value) -> bool {
    feed.as_object().is_some_and(|object| !object.is_empty())
}
