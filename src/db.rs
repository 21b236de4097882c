//! SQLite-backed collaborator.
//!
//! [`SqliteStore`] implements every [`crate::store`] trait over a single
//! `rusqlite` connection. Catalog filters are compiled to a parameterized
//! `WHERE` clause; playlist creation and dataset import each run in one
//! transaction.

use crate::filter::{TrackFilter, TrackQuery};
use crate::models::{
    Dataset, ListenedTrack, ListeningRecord, NewPlaylist, Playlist, PlaylistId, PlaylistTrack,
    RatedTrack, RatingRecord, Track, TrackId, UserId,
};
use crate::store::{CatalogStore, HistoryStore, PlaylistStore};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, trace};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id      INTEGER PRIMARY KEY,
    name    TEXT    NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS tracks (
    id              INTEGER PRIMARY KEY,
    title           TEXT    NOT NULL DEFAULT '',
    genre           TEXT,
    mood            TEXT,
    bpm             INTEGER CHECK (bpm IS NULL OR bpm > 0),
    average_rating  REAL    NOT NULL DEFAULT 0,
    like_count      INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    uploaded_at     INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS track_artists (
    track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    artist_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    PRIMARY KEY (track_id, artist_id)
);
CREATE TABLE IF NOT EXISTS ratings (
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    liked       INTEGER NOT NULL,
    UNIQUE (user_id, track_id)
);
CREATE TABLE IF NOT EXISTS listening_stats (
    user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    track_id            INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    listen_count        INTEGER NOT NULL DEFAULT 0 CHECK (listen_count >= 0),
    last_listened_at    INTEGER NOT NULL,
    UNIQUE (user_id, track_id)
);
CREATE TABLE IF NOT EXISTS follows (
    follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    followed_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    CHECK (follower_id <> followed_id),
    UNIQUE (follower_id, followed_id)
);
CREATE TABLE IF NOT EXISTS playlists (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    description TEXT,
    creator_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS playlist_tracks (
    playlist_id INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
    track_id    INTEGER NOT NULL REFERENCES tracks(id),
    position    INTEGER NOT NULL CHECK (position >= 1),
    PRIMARY KEY (playlist_id, position)
);
CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks(genre);
CREATE INDEX IF NOT EXISTS idx_tracks_mood ON tracks(mood);
CREATE INDEX IF NOT EXISTS idx_tracks_bpm ON tracks(bpm);
CREATE INDEX IF NOT EXISTS idx_track_artists_artist ON track_artists(artist_id);
CREATE INDEX IF NOT EXISTS idx_listening_recent ON listening_stats(user_id, last_listened_at);
";

/// Track columns, in the order [`track_from_row`] reads them.
const TRACK_COLUMNS: &str =
    "t.id, t.title, t.genre, t.mood, t.bpm, t.average_rating, t.like_count, t.uploaded_at";
const TRACK_COLUMN_COUNT: usize = 8;

const CATALOG_ORDER: &str =
    "ORDER BY t.average_rating DESC, t.like_count DESC, t.uploaded_at DESC, t.id ASC";

/// Counts of rows written by [`SqliteStore::import_dataset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub tracks: usize,
    pub ratings: usize,
    pub listens: usize,
    pub follows: usize,
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path` and makes sure the schema exists.
    ///
    /// `busy_timeout` bounds how long any statement waits on a locked database.
    pub fn open<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        Self::from_connection(conn, busy_timeout)
    }

    /// A private, throwaway database. Used by tests and benchmarks.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, Duration::from_secs(5))
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)
            .context("Failed to set database busy timeout")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("Invalid SQL when creating the schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// Writes a dataset snapshot. Existing users and tracks with the same id
    /// are updated; ratings and listening records are upserted per (user, track).
    pub fn import_dataset(&self, dataset: &Dataset) -> Result<ImportSummary> {
        if let Some(edge) = dataset
            .follows
            .iter()
            .find(|edge| edge.follower_id == edge.followed_id)
        {
            bail!("User {} cannot follow themselves", edge.follower_id);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut user_stmt = tx.prepare(
                "INSERT INTO users (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            for user in &dataset.users {
                user_stmt
                    .execute(params![user.id, user.name])
                    .with_context(|| format!("Failed to import user {}", user.id))?;
            }

            let mut track_stmt = tx.prepare(
                "INSERT INTO tracks (id, title, genre, mood, bpm, average_rating, like_count, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title, genre = excluded.genre, mood = excluded.mood,
                    bpm = excluded.bpm, average_rating = excluded.average_rating,
                    like_count = excluded.like_count, uploaded_at = excluded.uploaded_at",
            )?;
            let mut clear_artists_stmt = tx.prepare("DELETE FROM track_artists WHERE track_id = ?1")?;
            let mut artist_stmt =
                tx.prepare("INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?1, ?2)")?;
            for track in &dataset.tracks {
                track_stmt
                    .execute(params![
                        track.id,
                        track.title,
                        track.genre,
                        track.mood,
                        track.bpm,
                        track.average_rating,
                        track.like_count,
                        track.uploaded_at,
                    ])
                    .with_context(|| format!("Failed to import track {}", track.id))?;
                clear_artists_stmt.execute([track.id])?;
                for artist_id in &track.artist_ids {
                    artist_stmt.execute([track.id, *artist_id]).with_context(|| {
                        format!("Track {} credits unknown artist {artist_id}", track.id)
                    })?;
                }
            }

            let mut rating_stmt = tx.prepare(
                "INSERT INTO ratings (user_id, track_id, liked) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, track_id) DO UPDATE SET liked = excluded.liked",
            )?;
            for rating in &dataset.ratings {
                rating_stmt
                    .execute(params![rating.user_id, rating.track_id, rating.liked])
                    .with_context(|| format!("Failed to import rating {rating:?}"))?;
            }

            let mut listen_stmt = tx.prepare(
                "INSERT INTO listening_stats (user_id, track_id, listen_count, last_listened_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, track_id) DO UPDATE SET
                    listen_count = excluded.listen_count,
                    last_listened_at = excluded.last_listened_at",
            )?;
            for listen in &dataset.listens {
                listen_stmt
                    .execute(params![
                        listen.user_id,
                        listen.track_id,
                        listen.listen_count,
                        listen.last_listened_at
                    ])
                    .with_context(|| format!("Failed to import listening record {listen:?}"))?;
            }

            let mut follow_stmt = tx.prepare(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
            )?;
            for edge in &dataset.follows {
                follow_stmt
                    .execute([edge.follower_id, edge.followed_id])
                    .with_context(|| format!("Failed to import follow {edge:?}"))?;
            }
        }

        tx.commit().context("Committing dataset import failed")?;

        let summary = ImportSummary {
            users: dataset.users.len(),
            tracks: dataset.tracks.len(),
            ratings: dataset.ratings.len(),
            listens: dataset.listens.len(),
            follows: dataset.follows.len(),
        };
        info!("Imported {summary:?}");
        Ok(summary)
    }

    fn distinct_tags(&self, column: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT {column} FROM tracks WHERE {column} IS NOT NULL ORDER BY {column}"
            ))
            .with_context(|| format!("Invalid SQL when listing distinct {column}"))?;
        let tags = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }
}

/// Creates the database at `db_path`. Refuses to touch an existing file
/// unless `force` is set, in which case the old file is removed first.
pub fn init_database(db_path: &Path, force: bool, busy_timeout: Duration) -> Result<SqliteStore> {
    if db_path.exists() {
        if !force {
            bail!(
                "Database already exists at {}. Use --force to recreate it.",
                db_path.display()
            );
        }
        fs::remove_file(db_path)
            .with_context(|| format!("Failed to remove old database {}", db_path.display()))?;
    }
    create_parent_dir(db_path)?;

    info!("Creating database at {}", db_path.display());
    SqliteStore::open(db_path, busy_timeout)
}

/// Creates the directory that will hold `db_path`.
pub fn create_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        genre: row.get(2)?,
        mood: row.get(3)?,
        bpm: row.get(4)?,
        average_rating: row.get(5)?,
        like_count: row.get(6)?,
        uploaded_at: row.get(7)?,
        artist_ids: Vec::new(),
    })
}

/// Fills in `artist_ids` for every track.
fn attach_artists(conn: &Connection, tracks: &mut [Track]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT artist_id FROM track_artists WHERE track_id = ?1 ORDER BY artist_id",
    )?;
    for track in tracks.iter_mut() {
        track.artist_ids = stmt
            .query_map([track.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<UserId>>>()
            .with_context(|| format!("Failed to read artists of track {}", track.id))?;
    }
    Ok(())
}

fn listened_from_row(row: &Row) -> rusqlite::Result<ListenedTrack> {
    let track = track_from_row(row)?;
    Ok(ListenedTrack {
        record: ListeningRecord {
            user_id: row.get(TRACK_COLUMN_COUNT)?,
            track_id: track.id,
            listen_count: row.get(TRACK_COLUMN_COUNT + 1)?,
            last_listened_at: row.get(TRACK_COLUMN_COUNT + 2)?,
        },
        track,
    })
}

fn rated_from_row(row: &Row) -> rusqlite::Result<RatedTrack> {
    let track = track_from_row(row)?;
    Ok(RatedTrack {
        rating: RatingRecord {
            user_id: row.get(TRACK_COLUMN_COUNT)?,
            track_id: track.id,
            liked: row.get(TRACK_COLUMN_COUNT + 1)?,
        },
        track,
    })
}

/// Compiles `filter` into SQL over the `tracks t` alias, pushing bound values
/// onto `values` in placeholder order.
///
/// `Not` coalesces its operand so a clause on a NULL column counts as false,
/// matching [`TrackFilter::matches`].
fn push_filter_sql(filter: &TrackFilter, sql: &mut String, values: &mut Vec<Value>) {
    match filter {
        TrackFilter::Genre(tags) => {
            push_in_list(sql, values, "t.genre", tags.iter().map(|tag| tag.as_str().into()));
        }
        TrackFilter::Mood(tags) => {
            push_in_list(sql, values, "t.mood", tags.iter().map(|tag| tag.as_str().into()));
        }
        TrackFilter::BpmRange { min, max } => {
            sql.push_str("(t.bpm BETWEEN ? AND ?)");
            values.push(Value::Integer(i64::from(*min)));
            values.push(Value::Integer(i64::from(*max)));
        }
        TrackFilter::MinRating(floor) => {
            sql.push_str("t.average_rating >= ?");
            values.push(Value::Real(*floor));
        }
        TrackFilter::ByArtists(artists) if artists.is_empty() => sql.push('0'),
        TrackFilter::ByArtists(artists) => {
            sql.push_str("EXISTS (SELECT 1 FROM track_artists ta WHERE ta.track_id = t.id AND ");
            push_in_list(sql, values, "ta.artist_id", artists.iter().map(|id| (*id).into()));
            sql.push(')');
        }
        TrackFilter::Ids(ids) => {
            push_in_list(sql, values, "t.id", ids.iter().map(|id| (*id).into()));
        }
        TrackFilter::Any(filters) => push_group(sql, values, filters, " OR ", '0'),
        TrackFilter::All(filters) => push_group(sql, values, filters, " AND ", '1'),
        TrackFilter::Not(inner) => {
            sql.push_str("NOT COALESCE(");
            push_filter_sql(inner, sql, values);
            sql.push_str(", 0)");
        }
    }
}

/// `column IN (...)` over a single bound JSON array, expanded by `json_each`,
/// so the statement's parameter count does not grow with the list.
fn push_in_list(
    sql: &mut String,
    values: &mut Vec<Value>,
    column: &str,
    items: impl ExactSizeIterator<Item = serde_json::Value>,
) {
    if items.len() == 0 {
        sql.push('0');
        return;
    }
    sql.push_str(column);
    sql.push_str(" IN (SELECT value FROM json_each(?))");
    values.push(Value::Text(serde_json::Value::Array(items.collect()).to_string()));
}

fn push_group(
    sql: &mut String,
    values: &mut Vec<Value>,
    filters: &[TrackFilter],
    joiner: &str,
    empty: char,
) {
    if filters.is_empty() {
        sql.push(empty);
        return;
    }
    sql.push('(');
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        push_filter_sql(filter, sql, values);
    }
    sql.push(')');
}

impl HistoryStore for SqliteStore {
    fn rated_tracks(&self, user_id: UserId) -> Result<Vec<RatedTrack>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}, r.user_id, r.liked
             FROM ratings r JOIN tracks t ON t.id = r.track_id
             WHERE r.user_id = ?1
             ORDER BY t.id"
        ))?;
        let mut rated = stmt
            .query_map([user_id], rated_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Cannot query ratings of user {user_id}"))?;

        for entry in &mut rated {
            attach_artists(&conn, std::slice::from_mut(&mut entry.track))?;
        }
        debug!("User {user_id} has {} ratings", rated.len());
        Ok(rated)
    }

    fn listened_tracks(&self, user_id: UserId) -> Result<Vec<ListenedTrack>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}, ls.user_id, ls.listen_count, ls.last_listened_at
             FROM listening_stats ls JOIN tracks t ON t.id = ls.track_id
             WHERE ls.user_id = ?1
             ORDER BY t.id"
        ))?;
        let mut listened = stmt
            .query_map([user_id], listened_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Cannot query listening statistics of user {user_id}"))?;

        for entry in &mut listened {
            attach_artists(&conn, std::slice::from_mut(&mut entry.track))?;
        }
        debug!("User {user_id} has {} listening records", listened.len());
        Ok(listened)
    }

    fn recent_listens(&self, user_id: UserId, limit: usize) -> Result<Vec<ListenedTrack>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}, ls.user_id, ls.listen_count, ls.last_listened_at
             FROM listening_stats ls JOIN tracks t ON t.id = ls.track_id
             WHERE ls.user_id = ?1
             ORDER BY ls.last_listened_at DESC, ls.track_id ASC
             LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut recent = stmt
            .query_map(params![user_id, limit], listened_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Cannot query recent listens of user {user_id}"))?;

        for entry in &mut recent {
            attach_artists(&conn, std::slice::from_mut(&mut entry.track))?;
        }
        Ok(recent)
    }

    fn followed_artists(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT followed_id FROM follows WHERE follower_id = ?1 ORDER BY followed_id",
        )?;
        let followed = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<UserId>>>()
            .with_context(|| format!("Cannot query follows of user {user_id}"))?;
        Ok(followed)
    }
}

impl CatalogStore for SqliteStore {
    fn query_tracks(&self, query: &TrackQuery) -> Result<Vec<Track>> {
        let mut predicate = String::new();
        let mut values = Vec::new();
        push_filter_sql(&query.filter, &mut predicate, &mut values);
        values.push(Value::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));

        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks t WHERE {predicate} {CATALOG_ORDER} LIMIT ?");
        trace!("Catalog query: {sql}");

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .context("Invalid SQL generated for catalog query")?;
        let mut tracks = stmt
            .query_map(params_from_iter(values.iter()), track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Cannot query catalog tracks")?;

        attach_artists(&conn, &mut tracks)?;
        debug!("Catalog query returned {} tracks", tracks.len());
        Ok(tracks)
    }

    fn catalog_genres(&self) -> Result<Vec<String>> {
        self.distinct_tags("genre")
    }

    fn catalog_moods(&self) -> Result<Vec<String>> {
        self.distinct_tags("mood")
    }
}

impl PlaylistStore for SqliteStore {
    fn create_playlist(&self, playlist: &NewPlaylist, track_ids: &[TrackId]) -> Result<Playlist> {
        let created_at = chrono::Utc::now().timestamp();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO playlists (name, description, creator_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![playlist.name, playlist.description, playlist.creator_id, created_at],
        )
        .with_context(|| format!("Could not create playlist for user {}", playlist.creator_id))?;
        let playlist_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO playlist_tracks (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, track_id) in (1_i64..).zip(track_ids) {
                stmt.execute(params![playlist_id, track_id, position])
                    .with_context(|| {
                        format!("Could not add track {track_id} to playlist {playlist_id}")
                    })?;
            }
        }

        tx.commit().context("Committing playlist transaction failed")?;
        debug!("Created playlist {playlist_id} with {} tracks", track_ids.len());

        Ok(Playlist {
            id: playlist_id,
            name: playlist.name.clone(),
            description: playlist.description.clone(),
            creator_id: playlist.creator_id,
            created_at,
        })
    }

    fn playlist(&self, playlist_id: PlaylistId) -> Result<Option<Playlist>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, description, creator_id, created_at FROM playlists WHERE id = ?1",
            [playlist_id],
            |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    creator_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to query playlist {playlist_id}"))
    }

    fn playlist_tracks(&self, playlist_id: PlaylistId) -> Result<Vec<PlaylistTrack>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT playlist_id, track_id, position FROM playlist_tracks
             WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map([playlist_id], |row| {
                Ok(PlaylistTrack {
                    playlist_id: row.get(0)?,
                    track_id: row.get(1)?,
                    position: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Cannot query tracks of playlist {playlist_id}"))?;
        Ok(rows)
    }
}
