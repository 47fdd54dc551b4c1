use serde_json::Value;
use tracing::{info, warn};

use crate::directory::DirectoryClient;
use crate::domain::{EpisodeStats, FeedId, text_field};

pub struct EpisodeAggregator<'a, D: DirectoryClient> {
    client: &'a D,
    episode_max: u32,
}

impl<'a, D: DirectoryClient> EpisodeAggregator<'a, D> {
    pub fn new(client: &'a D, episode_max: u32) -> Self {
        Self {
            client,
            episode_max,
        }
    }

    /// Stats over the most recent episodes. Any failure yields empty stats.
    pub fn compute_episode_stats(&self, feed_id: FeedId) -> EpisodeStats {
        let payload = match self.client.episodes_by_feed_id(feed_id, self.episode_max) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%feed_id, error = %err, "episode lookup failed");
                return EpisodeStats::default();
            }
        };

        let Some(items) = payload.get("items").and_then(Value::as_array) else {
            warn!(%feed_id, "episode response has no items list");
            return EpisodeStats::default();
        };
        if items.is_empty() {
            info!(%feed_id, "no episodes found");
        }

        let stats = aggregate_episodes(items);
        info!(
            %feed_id,
            episodes = items.len(),
            average_duration = ?stats.average_duration_seconds,
            latest = ?stats.latest_episode_title,
            "computed episode stats"
        );
        stats
    }
}

/// Latest title is the first item's; the mean counts only positive integer durations.
pub fn aggregate_episodes(items: &[Value]) -> EpisodeStats {
    let latest_episode_title = items.first().and_then(|item| text_field(item, "title"));

    // i128 holds any sum of up to 2^64 positive i64 values.
    let (total, count) = items
        .iter()
        .filter_map(|item| item.get("duration").and_then(Value::as_i64))
        .filter(|duration| *duration > 0)
        .fold((0i128, 0i128), |(total, count), duration| {
            (total + i128::from(duration), count + 1)
        });

    // The mean of i64 values always fits back into i64.
    let average_duration_seconds = (count > 0)
        .then(|| total / count)
        .and_then(|average| i64::try_from(average).ok());

    EpisodeStats {
        average_duration_seconds,
        latest_episode_title,
    }
}
