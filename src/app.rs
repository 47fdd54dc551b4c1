use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::detail::DetailFetcher;
use crate::directory::DirectoryClient;
use crate::domain::{PodcastRecord, SearchCandidate, StageOutcome};
use crate::episodes::EpisodeAggregator;
use crate::error::EnricherError;
use crate::resolver::QueryResolver;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Search,
    Detail,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Search => write!(f, "search"),
            Stage::Detail => write!(f, "detail"),
            Stage::Write => write!(f, "write"),
        }
    }
}

/// Why a title produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSkip {
    pub stage: Stage,
    pub reason: String,
}

impl StageSkip {
    fn from_outcome<T>(stage: Stage, outcome: &StageOutcome<T>) -> Self {
        Self {
            stage,
            reason: outcome.describe(),
        }
    }
}

/// A fully assembled record plus the candidate it was resolved from.
#[derive(Debug, Clone, Serialize)]
pub struct Enrichment {
    pub title: String,
    pub candidate: SearchCandidate,
    pub record: PodcastRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleResult {
    pub title: String,
    pub action: String,
    pub stage: Option<Stage>,
    pub feed_id: Option<u64>,
    pub reason: Option<String>,
}

impl TitleResult {
    fn written(title: &str, record: &PodcastRecord) -> Self {
        Self {
            title: title.to_string(),
            action: "written".to_string(),
            stage: None,
            feed_id: Some(record.feed_id.as_u64()),
            reason: None,
        }
    }

    fn skipped(title: &str, skip: StageSkip) -> Self {
        Self {
            title: title.to_string(),
            action: "skipped".to_string(),
            stage: Some(skip.stage),
            feed_id: None,
            reason: Some(skip.reason),
        }
    }

    pub fn is_written(&self) -> bool {
        self.action == "written"
    }

    fn failed_search(&self) -> bool {
        self.stage == Some(Stage::Search)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub titles: usize,
    pub written: usize,
    pub skipped: usize,
    pub items: Vec<TitleResult>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Drives the per-title pipeline: search, detail, episode stats, write.
pub struct App<D: DirectoryClient> {
    client: D,
    settings: Settings,
}

impl<D: DirectoryClient> App<D> {
    pub fn new(client: D, settings: Settings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &D {
        &self.client
    }

    /// Pause after a title: shorter when the search itself failed.
    pub fn delay_for(&self, result: &TitleResult) -> Duration {
        if result.failed_search() {
            self.settings.search_failure_delay
        } else {
            self.settings.title_delay
        }
    }

    /// Processes every chart title once, strictly in sequence.
    ///
    /// Only failing to prepare the output table aborts the run. The store is closed on
    /// every path: explicitly on success, by drop otherwise.
    pub fn run(&self, store: Store, sink: &dyn ProgressSink) -> Result<RunSummary, EnricherError> {
        store.recreate_podcasts_table()?;

        let titles = match store.distinct_titles() {
            Ok(titles) => titles,
            Err(err) => {
                error!(error = %err, "cannot read chart titles; is the chart table populated?");
                Vec::new()
            }
        };
        info!(count = titles.len(), "found unique chart titles");

        let total = titles.len();
        let mut items = Vec::with_capacity(total);
        for (index, title) in titles.iter().enumerate() {
            info!(title = %title, "processing {}/{}", index + 1, total);
            let start = Instant::now();
            let result = self.process_title(&store, title);

            sink.event(ProgressEvent {
                message: format!(
                    "[{}/{}] {} -> {}",
                    index + 1,
                    total,
                    title,
                    result
                        .stage
                        .map(|stage| format!("skipped at {stage}"))
                        .unwrap_or_else(|| result.action.clone())
                ),
                elapsed: Some(start.elapsed()),
            });

            let delay = self.delay_for(&result);
            items.push(result);
            pause(delay);
        }

        store.close()?;

        let written = items.iter().filter(|item| item.is_written()).count();
        info!(titles = total, written, "podcast details update complete");
        Ok(RunSummary {
            titles: total,
            written,
            skipped: total - written,
            items,
        })
    }

    pub fn process_title(&self, store: &Store, title: &str) -> TitleResult {
        let enrichment = match self.enrich(title) {
            Ok(enrichment) => enrichment,
            Err(skip) => {
                warn!(title, stage = %skip.stage, reason = %skip.reason, "skipping title");
                return TitleResult::skipped(title, skip);
            }
        };

        let record = enrichment.record;
        match store.upsert(&record) {
            Ok(()) => {
                info!(title, feed_id = %record.feed_id, "stored podcast details");
                TitleResult::written(title, &record)
            }
            Err(err) => {
                error!(title, feed_id = %record.feed_id, error = %err, "database write failed");
                TitleResult::skipped(
                    title,
                    StageSkip {
                        stage: Stage::Write,
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    /// Resolve, fetch detail and episode stats for one title without touching storage.
    pub fn enrich(&self, title: &str) -> Result<Enrichment, StageSkip> {
        let resolver = QueryResolver::new(&self.client, &self.settings);
        let candidate = match resolver.resolve_candidate(title) {
            StageOutcome::Found(candidate) => candidate,
            outcome => return Err(StageSkip::from_outcome(Stage::Search, &outcome)),
        };

        let detail = match DetailFetcher::new(&self.client).fetch_detail(&candidate) {
            StageOutcome::Found(detail) => detail,
            outcome => return Err(StageSkip::from_outcome(Stage::Detail, &outcome)),
        };

        let stats = EpisodeAggregator::new(&self.client, self.settings.episode_max)
            .compute_episode_stats(detail.feed_id);

        let record = PodcastRecord::assemble(detail, &candidate, stats);
        Ok(Enrichment {
            title: title.to_string(),
            candidate,
            record,
        })
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
