//! Title to directory candidate, via term search with a title-search fallback.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::directory::DirectoryClient;
use crate::domain::{SearchCandidate, StageOutcome, text_field};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Term,
    Title,
}

impl SearchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            SearchStrategy::Term => "byterm",
            SearchStrategy::Title => "bytitle",
        }
    }

    /// Result list of a search response. Term search has used both keys over time.
    fn results<'a>(&self, payload: &'a Value) -> &'a [Value] {
        let list = match self {
            SearchStrategy::Term => non_empty_array(payload, "feeds")
                .or_else(|| non_empty_array(payload, "results")),
            SearchStrategy::Title => non_empty_array(payload, "feeds"),
        };
        list.map(Vec::as_slice).unwrap_or(&[])
    }

    fn candidate_title(&self, result: &Value) -> Option<String> {
        match self {
            SearchStrategy::Term => {
                text_field(result, "title_original").or_else(|| text_field(result, "title"))
            }
            SearchStrategy::Title => text_field(result, "title"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: SearchCandidate,
    pub score: f64,
}

/// Case-insensitive similarity in [0, 1].
pub fn similarity(query: &str, candidate: &str) -> f64 {
    strsim::normalized_levenshtein(&query.to_lowercase(), &candidate.to_lowercase())
}

/// Highest-scoring result; on equal scores the earliest result is kept.
pub fn select_best(
    strategy: SearchStrategy,
    query: &str,
    results: &[Value],
) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;
    for result in results {
        let Some(title) = strategy.candidate_title(result) else {
            continue;
        };
        let score = similarity(query, &title);
        debug!(strategy = strategy.label(), query, candidate = %title, score, "scored candidate");
        if best.as_ref().is_none_or(|current| score > current.score) {
            best = Some(ScoredCandidate {
                candidate: SearchCandidate::from_json(result, title),
                score,
            });
        }
    }
    best
}

pub struct QueryResolver<'a, D: DirectoryClient> {
    client: &'a D,
    settings: &'a Settings,
}

impl<'a, D: DirectoryClient> QueryResolver<'a, D> {
    pub fn new(client: &'a D, settings: &'a Settings) -> Self {
        Self { client, settings }
    }

    pub fn resolve_candidate(&self, title: &str) -> StageOutcome<SearchCandidate> {
        let outcome = self.search(SearchStrategy::Term, title);
        if outcome.is_found() {
            return outcome;
        }
        info!(title, "falling back to title search");
        self.search(SearchStrategy::Title, title)
    }

    /// Runs one strategy. Misses and errors are logged and never escape.
    pub fn search(&self, strategy: SearchStrategy, title: &str) -> StageOutcome<SearchCandidate> {
        let response = match strategy {
            SearchStrategy::Term => self.client.search_by_term(title, self.settings.search_max),
            SearchStrategy::Title => self.client.search_by_title(title, self.settings.search_max),
        };
        let payload = match response {
            Ok(payload) => payload,
            Err(err) => {
                warn!(strategy = strategy.label(), title, error = %err, "search failed");
                return StageOutcome::failed(&err);
            }
        };

        let results = strategy.results(&payload);
        if results.is_empty() {
            info!(strategy = strategy.label(), title, "no results");
            return StageOutcome::NotFound;
        }

        match select_best(strategy, title, results) {
            Some(best) if best.score >= self.settings.score_threshold => {
                info!(
                    strategy = strategy.label(),
                    title,
                    matched = %best.candidate.title,
                    score = format_args!("{:.2}", best.score),
                    "accepted candidate"
                );
                StageOutcome::Found(best.candidate)
            }
            Some(best) => {
                info!(
                    strategy = strategy.label(),
                    title,
                    matched = %best.candidate.title,
                    score = format_args!("{:.2}", best.score),
                    threshold = self.settings.score_threshold,
                    "best candidate below threshold"
                );
                StageOutcome::NotFound
            }
            None => {
                info!(strategy = strategy.label(), title, "no titled results");
                StageOutcome::NotFound
            }
        }
    }
}

fn non_empty_array<'a>(payload: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}
