use camino::Utf8Path;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::domain::{FeedId, PodcastRecord};
use crate::error::EnricherError;

pub const CHART_TABLE: &str = "Top100Lists";
pub const PODCASTS_TABLE: &str = "Podcasts";

const CREATE_PODCASTS: &str = "
    CREATE TABLE Podcasts (
        podcast_id           INTEGER PRIMARY KEY,
        title                TEXT,
        description          TEXT,
        feed_url             TEXT,
        image_url            TEXT,
        episode_count        INTEGER,
        avg_duration_last_10 INTEGER,
        latest_episode_title TEXT,
        last_update_time     INTEGER,
        categories           TEXT,
        podcast_guid         TEXT,
        original_url         TEXT
    )";

/// SQLite database shared with the chart scrapers.
///
/// Holds the single connection of a run. Every statement runs in autocommit mode, so
/// each upsert is durable on its own.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Utf8Path) -> Result<Self, EnricherError> {
        let conn = Connection::open(path.as_std_path())
            .map_err(|err| EnricherError::Database(format!("open {path}: {err}")))?;
        info!(database = %path, "opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, EnricherError> {
        let conn =
            Connection::open_in_memory().map_err(|err| EnricherError::Database(err.to_string()))?;
        Ok(Self { conn })
    }

    /// Drops and recreates the output table; each run is a full snapshot.
    pub fn recreate_podcasts_table(&self) -> Result<(), EnricherError> {
        self.conn
            .execute_batch(&format!(
                "DROP TABLE IF EXISTS {PODCASTS_TABLE}; {CREATE_PODCASTS};"
            ))
            .map_err(|err| EnricherError::Database(format!("recreate {PODCASTS_TABLE}: {err}")))
    }

    pub fn distinct_titles(&self) -> Result<Vec<String>, EnricherError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT DISTINCT title FROM {CHART_TABLE} WHERE title IS NOT NULL"
            ))
            .map_err(|err| EnricherError::Database(format!("read {CHART_TABLE}: {err}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| EnricherError::Database(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| EnricherError::Database(err.to_string()))
    }

    /// Insert, or replace the whole row when the feed id already exists.
    pub fn upsert(&self, record: &PodcastRecord) -> Result<(), EnricherError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO Podcasts
                 (podcast_id, title, description, feed_url, image_url, episode_count,
                  avg_duration_last_10, latest_episode_title, last_update_time, categories,
                  podcast_guid, original_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    feed_id_param(record.feed_id)?,
                    record.title,
                    record.description,
                    record.feed_url,
                    record.image_url,
                    record.episode_count,
                    record.average_duration_last_10,
                    record.latest_episode_title,
                    record.last_update_time,
                    record.categories,
                    record.guid,
                    record.original_url,
                ],
            )
            .map(|_| ())
            .map_err(|err| EnricherError::Database(format!("upsert feed {}: {err}", record.feed_id)))
    }

    pub fn get(&self, feed_id: FeedId) -> Result<Option<PodcastRecord>, EnricherError> {
        self.conn
            .query_row(
                "SELECT podcast_id, title, description, feed_url, image_url, episode_count,
                        avg_duration_last_10, latest_episode_title, last_update_time,
                        categories, podcast_guid, original_url
                 FROM Podcasts WHERE podcast_id = ?1",
                params![feed_id_param(feed_id)?],
                |row| {
                    Ok(PodcastRecord {
                        feed_id: FeedId::new(row.get::<_, i64>(0)? as u64),
                        title: row.get(1)?,
                        description: row.get(2)?,
                        feed_url: row.get(3)?,
                        image_url: row.get(4)?,
                        episode_count: row.get(5)?,
                        average_duration_last_10: row.get(6)?,
                        latest_episode_title: row.get(7)?,
                        last_update_time: row.get(8)?,
                        categories: row.get(9)?,
                        guid: row.get(10)?,
                        original_url: row.get(11)?,
                    })
                },
            )
            .optional()
            .map_err(|err| EnricherError::Database(err.to_string()))
    }

    pub fn count(&self) -> Result<usize, EnricherError> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {PODCASTS_TABLE}"),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count as usize)
            .map_err(|err| EnricherError::Database(err.to_string()))
    }

    pub fn close(self) -> Result<(), EnricherError> {
        self.conn
            .close()
            .map_err(|(_, err)| EnricherError::Database(format!("close: {err}")))?;
        info!("database connection closed");
        Ok(())
    }
}

// SQLite integers are signed.
fn feed_id_param(feed_id: FeedId) -> Result<i64, EnricherError> {
    i64::try_from(feed_id.as_u64())
        .map_err(|_| EnricherError::InvalidFeedId(feed_id.to_string()))
}
