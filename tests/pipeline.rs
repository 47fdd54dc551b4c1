use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8PathBuf;
use rusqlite::{Connection, params};
use serde_json::{Value, json};

use podcast_enricher::app::{App, ProgressEvent, ProgressSink, Stage};
use podcast_enricher::config::Settings;
use podcast_enricher::directory::DirectoryClient;
use podcast_enricher::domain::FeedId;
use podcast_enricher::error::EnricherError;
use podcast_enricher::store::Store;

enum Reply {
    Json(Value),
    Status(u16),
}

#[derive(Default)]
struct MockDirectory {
    term: HashMap<String, Reply>,
    title: HashMap<String, Reply>,
    by_id: HashMap<u64, Reply>,
    by_url: HashMap<String, Reply>,
    episodes: HashMap<u64, Reply>,
    calls: Mutex<Vec<String>>,
}

impl MockDirectory {
    fn term(mut self, query: &str, reply: Reply) -> Self {
        self.term.insert(query.to_string(), reply);
        self
    }

    fn title(mut self, query: &str, reply: Reply) -> Self {
        self.title.insert(query.to_string(), reply);
        self
    }

    fn by_id(mut self, id: u64, reply: Reply) -> Self {
        self.by_id.insert(id, reply);
        self
    }

    fn by_url(mut self, url: &str, reply: Reply) -> Self {
        self.by_url.insert(url.to_string(), reply);
        self
    }

    fn episodes(mut self, id: u64, reply: Reply) -> Self {
        self.episodes.insert(id, reply);
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn answer(reply: Option<&Reply>) -> Result<Value, EnricherError> {
    match reply {
        Some(Reply::Json(value)) => Ok(value.clone()),
        Some(Reply::Status(status)) => Err(EnricherError::DirectoryStatus {
            status: *status,
            message: "mock".to_string(),
        }),
        None => Err(EnricherError::DirectoryHttp("no route".to_string())),
    }
}

impl DirectoryClient for MockDirectory {
    fn search_by_term(&self, query: &str, _max: u32) -> Result<Value, EnricherError> {
        self.record(format!("byterm:{query}"));
        answer(self.term.get(query))
    }

    fn search_by_title(&self, query: &str, _max: u32) -> Result<Value, EnricherError> {
        self.record(format!("bytitle:{query}"));
        answer(self.title.get(query))
    }

    fn podcast_by_feed_id(&self, id: FeedId) -> Result<Value, EnricherError> {
        self.record(format!("byfeedid:{id}"));
        answer(self.by_id.get(&id.as_u64()))
    }

    fn podcast_by_feed_url(&self, url: &str) -> Result<Value, EnricherError> {
        self.record(format!("byfeedurl:{url}"));
        answer(self.by_url.get(url))
    }

    fn episodes_by_feed_id(&self, id: FeedId, _max: u32) -> Result<Value, EnricherError> {
        self.record(format!("episodes:{id}"));
        answer(self.episodes.get(&id.as_u64()))
    }
}

struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event.message);
    }
}

fn fast_settings() -> Settings {
    Settings {
        title_delay: Duration::ZERO,
        search_failure_delay: Duration::ZERO,
        ..Settings::default()
    }
}

fn seeded_database(dir: &tempfile::TempDir, titles: &[&str]) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("podcasts.db")).unwrap();
    let conn = Connection::open(path.as_std_path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE Top100Lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            platform TEXT NOT NULL,
            rank INTEGER NOT NULL,
            title TEXT,
            podcast_id TEXT,
            date TEXT NOT NULL
        )",
    )
    .unwrap();
    for (rank, title) in titles.iter().enumerate() {
        conn.execute(
            "INSERT INTO Top100Lists (platform, rank, title, date) VALUES ('Apple', ?1, ?2, '2026-10-19')",
            params![rank as i64 + 1, title],
        )
        .unwrap();
    }
    path
}

fn feeds(items: Value) -> Reply {
    Reply::Json(json!({ "status": "true", "feeds": items }))
}

fn feed(id: u64, title: &str) -> Reply {
    Reply::Json(json!({
        "status": "true",
        "feed": {
            "id": id,
            "title": title,
            "url": format!("https://feeds.example.com/{id}.xml"),
            "image": format!("https://img.example.com/{id}.jpg"),
            "episodeCount": 120,
            "lastUpdateTime": 1760000000,
            "categories": {"55": "News", "59": "Politics"},
            "podcastGuid": format!("guid-{id}")
        }
    }))
}

fn episodes(items: Value) -> Reply {
    Reply::Json(json!({ "status": "true", "items": items }))
}

#[test]
fn the_daily_resolves_to_exact_title_without_title_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_database(&dir, &["The Daily", "The Daily"]);
    let client = MockDirectory::default()
        .term(
            "The Daily",
            feeds(json!([
                {"id": 2, "title": "Daily Wire"},
                {"id": 1, "title": "The Daily"}
            ])),
        )
        .by_id(1, feed(1, "The Daily"))
        .episodes(
            1,
            episodes(json!([
                {"title": "Monday", "duration": 600},
                {"title": "Tuesday", "duration": 0},
                {"title": "Wednesday", "duration": 900}
            ])),
        );

    let app = App::new(client, fast_settings());
    let sink = RecordingSink {
        events: Mutex::new(Vec::new()),
    };
    let summary = app.run(Store::open(&path).unwrap(), &sink).unwrap();
    assert_eq!(summary.titles, 1);
    assert_eq!(summary.written, 1);
    assert_eq!(sink.events.lock().unwrap().len(), 1);

    let store = Store::open(&path).unwrap();
    let record = store.get(FeedId::new(1)).unwrap().unwrap();
    assert_eq!(record.title.as_deref(), Some("The Daily"));
    assert_eq!(record.average_duration_last_10, Some(750));
    assert_eq!(record.latest_episode_title.as_deref(), Some("Monday"));
    assert_eq!(record.episode_count, Some(120));
    assert_eq!(
        record.categories.as_deref(),
        Some(r#"{"55":"News","59":"Politics"}"#)
    );
    assert_eq!(store.count().unwrap(), 1);
    assert!(
        !app.client()
            .calls()
            .iter()
            .any(|call| call.starts_with("bytitle:"))
    );
}

#[test]
fn term_search_hit_skips_title_search() {
    let client = MockDirectory::default()
        .term("Serial", feeds(json!([{"id": 7, "title": "Serial"}])))
        .by_id(7, feed(7, "Serial"))
        .episodes(7, episodes(json!([])));
    let app = App::new(client, fast_settings());

    let enrichment = app.enrich("Serial").unwrap();
    assert_eq!(enrichment.record.feed_id, FeedId::new(7));
    assert_eq!(enrichment.record.average_duration_last_10, None);
    assert_eq!(enrichment.record.latest_episode_title, None);
    assert_eq!(
        app.client().calls(),
        vec!["byterm:Serial", "byfeedid:7", "episodes:7"]
    );
}

#[test]
fn title_search_runs_after_term_search_miss() {
    let client = MockDirectory::default()
        .term(
            "Huberman Lab",
            feeds(json!([{"id": 3, "title": "Completely Unrelated Show"}])),
        )
        .title("Huberman Lab", feeds(json!([{"id": 4, "title": "Huberman Lab"}])))
        .by_id(4, feed(4, "Huberman Lab"))
        .episodes(4, episodes(json!([{"title": "Sleep", "duration": 7200}])));
    let app = App::new(client, fast_settings());

    let enrichment = app.enrich("Huberman Lab").unwrap();
    assert_eq!(enrichment.record.feed_id, FeedId::new(4));
    assert_eq!(
        &app.client().calls()[..2],
        ["byterm:Huberman Lab", "bytitle:Huberman Lab"]
    );
}

#[test]
fn title_search_called_once_per_unresolved_title() {
    let client = MockDirectory::default()
        .term("Serial", feeds(json!([{"id": 7, "title": "Serial"}])))
        .by_id(7, feed(7, "Serial"))
        .episodes(7, episodes(json!([])));
    let app = App::new(client, fast_settings());
    app.enrich("Serial").unwrap();
    let skip = app.enrich("Unknown Title").unwrap_err();
    assert_eq!(skip.stage, Stage::Search);

    let title_calls: Vec<String> = app
        .client()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("bytitle:"))
        .collect();
    assert_eq!(title_calls, vec!["bytitle:Unknown Title"]);
}

#[test]
fn sub_threshold_candidates_are_rejected() {
    let client = MockDirectory::default()
        .term(
            "The Daily",
            feeds(json!([{"id": 3, "title": "Completely Unrelated Show"}])),
        )
        .title("The Daily", feeds(json!([])));
    let app = App::new(client, fast_settings());

    let skip = app.enrich("The Daily").unwrap_err();
    assert_eq!(skip.stage, Stage::Search);
    assert!(
        !app.client()
            .calls()
            .iter()
            .any(|call| call.starts_with("byfeedid:"))
    );
}

#[test]
fn detail_falls_back_to_original_url_after_server_error() {
    let client = MockDirectory::default()
        .term(
            "Crime Junkie",
            feeds(json!([{
                "id": 11,
                "title": "Crime Junkie",
                "originalUrl": "https://orig.example.com/crime.xml"
            }])),
        )
        .by_id(11, Reply::Status(500))
        .by_url("https://orig.example.com/crime.xml", feed(11, "Crime Junkie (URL)"))
        .episodes(11, episodes(json!([])));
    let app = App::new(client, fast_settings());

    let enrichment = app.enrich("Crime Junkie").unwrap();
    assert_eq!(enrichment.record.title.as_deref(), Some("Crime Junkie (URL)"));
    assert!(
        app.client()
            .calls()
            .contains(&"byfeedurl:https://orig.example.com/crime.xml".to_string())
    );
    assert_eq!(
        enrichment.record.original_url.as_deref(),
        Some("https://orig.example.com/crime.xml")
    );
}

#[test]
fn successful_id_lookup_skips_url_lookup() {
    let client = MockDirectory::default()
        .term(
            "Crime Junkie",
            feeds(json!([{
                "id": 11,
                "title": "Crime Junkie",
                "url": "https://feeds.example.com/11.xml"
            }])),
        )
        .by_id(11, feed(11, "Crime Junkie"))
        .episodes(11, episodes(json!([])));
    let app = App::new(client, fast_settings());
    app.enrich("Crime Junkie").unwrap();
    assert!(
        !app.client()
            .calls()
            .iter()
            .any(|call| call.starts_with("byfeedurl:"))
    );
}

#[test]
fn candidate_without_id_or_url_is_skipped_at_detail() {
    let client = MockDirectory::default().term("Mystery", feeds(json!([{"title": "Mystery"}])));
    let app = App::new(client, fast_settings());

    let skip = app.enrich("Mystery").unwrap_err();
    assert_eq!(skip.stage, Stage::Detail);
}

#[test]
fn episode_failure_still_writes_record() {
    let client = MockDirectory::default()
        .term("Radiolab", feeds(json!([{"id": 21, "title": "Radiolab"}])))
        .by_id(21, feed(21, "Radiolab"))
        .episodes(21, Reply::Status(502));
    let app = App::new(client, fast_settings());

    let enrichment = app.enrich("Radiolab").unwrap();
    assert_eq!(enrichment.record.average_duration_last_10, None);
    assert_eq!(enrichment.record.latest_episode_title, None);
}

#[test]
fn failing_title_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_database(&dir, &["Nothing Matches", "Serial"]);
    let client = MockDirectory::default()
        .term("Serial", feeds(json!([{"id": 7, "title": "Serial"}])))
        .by_id(7, feed(7, "Serial"))
        .episodes(7, episodes(json!([{"title": "S1E1", "duration": 3000}])));
    let app = App::new(client, fast_settings());
    let sink = RecordingSink {
        events: Mutex::new(Vec::new()),
    };

    let summary = app.run(Store::open(&path).unwrap(), &sink).unwrap();
    assert_eq!(summary.titles, 2);
    assert_eq!(summary.written, 1);
    assert_eq!(summary.skipped, 1);
    let skipped = summary
        .items
        .iter()
        .find(|item| item.title == "Nothing Matches")
        .unwrap();
    assert_eq!(skipped.stage, Some(Stage::Search));

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn later_title_wins_when_two_titles_share_a_feed() {
    let client = MockDirectory::default()
        .term(
            "Morning Show",
            feeds(json!([{"id": 30, "title": "Morning Show", "url": "https://a.example.com/feed"}])),
        )
        .term(
            "The Morning Show",
            feeds(json!([{"id": 30, "title": "The Morning Show", "url": "https://b.example.com/feed"}])),
        )
        .by_id(
            30,
            Reply::Json(json!({"feed": {"id": 30, "title": "Morning Show"}})),
        )
        .episodes(30, episodes(json!([])));
    let app = App::new(client, fast_settings());
    let store = Store::open_in_memory().unwrap();
    store.recreate_podcasts_table().unwrap();

    assert!(app.process_title(&store, "Morning Show").is_written());
    assert!(app.process_title(&store, "The Morning Show").is_written());

    assert_eq!(store.count().unwrap(), 1);
    let record = store.get(FeedId::new(30)).unwrap().unwrap();
    assert_eq!(record.feed_url.as_deref(), Some("https://b.example.com/feed"));
}

#[test]
fn write_failure_is_reported_per_title() {
    let client = MockDirectory::default()
        .term("Serial", feeds(json!([{"id": 7, "title": "Serial"}])))
        .by_id(7, feed(7, "Serial"))
        .episodes(7, episodes(json!([])));
    let app = App::new(client, fast_settings());
    // no Podcasts table, so the insert fails
    let store = Store::open_in_memory().unwrap();

    let result = app.process_title(&store, "Serial");
    assert!(!result.is_written());
    assert_eq!(result.stage, Some(Stage::Write));
}

#[test]
fn missing_chart_table_yields_empty_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("empty.db")).unwrap();
    let app = App::new(MockDirectory::default(), fast_settings());
    let sink = RecordingSink {
        events: Mutex::new(Vec::new()),
    };

    let summary = app.run(Store::open(&path).unwrap(), &sink).unwrap();
    assert_eq!(summary.titles, 0);
    assert_eq!(summary.written, 0);
}

#[test]
fn pacing_is_shorter_only_after_a_failed_search() {
    let settings = Settings {
        title_delay: Duration::from_millis(1500),
        search_failure_delay: Duration::from_millis(1000),
        ..Settings::default()
    };
    let client = MockDirectory::default()
        .term("Serial", feeds(json!([{"id": 7, "title": "Serial"}])))
        .by_id(7, feed(7, "Serial"))
        .episodes(7, episodes(json!([])))
        .term("Orphan", feeds(json!([{"title": "Orphan"}])));
    let app = App::new(client, settings);
    let store = Store::open_in_memory().unwrap();

    // no Podcasts table yet, so Serial fails at write
    let write_failure = app.process_title(&store, "Serial");
    assert_eq!(write_failure.stage, Some(Stage::Write));
    assert_eq!(app.delay_for(&write_failure), Duration::from_millis(1500));

    store.recreate_podcasts_table().unwrap();
    let written = app.process_title(&store, "Serial");
    assert!(written.is_written());
    assert_eq!(app.delay_for(&written), Duration::from_millis(1500));

    let detail_failure = app.process_title(&store, "Orphan");
    assert_eq!(detail_failure.stage, Some(Stage::Detail));
    assert_eq!(app.delay_for(&detail_failure), Duration::from_millis(1500));

    let search_failure = app.process_title(&store, "Nothing Matches");
    assert_eq!(search_failure.stage, Some(Stage::Search));
    assert_eq!(app.delay_for(&search_failure), Duration::from_millis(1000));
}
