//! # Cadenza
//!
//! Command-line front end of the recommendation engine: loads a snapshot of
//! users, tracks, ratings, listening statistics and follows into SQLite and
//! builds mood, discovery and smart playlists from it.
//!
//! ## Usage
//!
//! ```bash
//! cadenza init-db
//! cadenza import snapshot.json
//! cadenza mood --user 2
//! cadenza discover --user 2 --save --name "Sunday finds"
//! cadenza smart --user 2 --genre Jazz --min-rating 3.5 --exclude-heard
//! cadenza --json show-playlist 1
//! ```

use anyhow::{bail, Context, Result};
use cadenza::cli::{self, Command};
use cadenza::completion::{self, TagKind};
use cadenza::config::RuntimeConfig;
use cadenza::criteria::SmartCriteria;
use cadenza::db::{self, SqliteStore};
use cadenza::engine::{DiscoveryPlaylist, MoodPlaylist, Recommendation, Recommender, SmartPlaylist};
use cadenza::filter::{TrackFilter, TrackQuery};
use cadenza::models::{Dataset, PlaylistId, Track};
use cadenza::playlist::SavedPlaylist;
use cadenza::profile::PreferenceProfile;
use cadenza::store::{CatalogStore, PlaylistStore};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;

const LEARNING_MESSAGE: &str = "Still learning your taste";

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug cadenza discover --user 2` - Enable debug logging
/// - `RUST_LOG=cadenza::algorithm=trace cadenza discover --user 2` - Per-candidate scores
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    if let Some(db_path) = args.db {
        config = config.with_db_path(db_path);
    }
    debug!("Using database {}", config.db_path.display());

    match args.command {
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(shell),
                &mut cmd,
                &mut io::stdout(),
            );
        }
        Command::CompletionEnhanced { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_enhanced_completions(shell, &mut cmd, &mut io::stdout())?;
        }
        Command::CompleteGenres => completion::print_tag_completions(&config.db_path, TagKind::Genre)?,
        Command::CompleteMoods => completion::print_tag_completions(&config.db_path, TagKind::Mood)?,
        Command::InitDb { force } => {
            db::init_database(&config.db_path, force, config.busy_timeout())?;
            println!("Database initialized at {}", config.db_path.display());
        }
        Command::Import { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read dataset {}", file.display()))?;
            let dataset: Dataset = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid dataset file {}", file.display()))?;
            db::create_parent_dir(&config.db_path)?;
            let store = SqliteStore::open(&config.db_path, config.busy_timeout())?;
            let summary = store.import_dataset(&dataset)?;
            println!(
                "Imported {} users, {} tracks, {} ratings, {} listening records, {} follows",
                summary.users, summary.tracks, summary.ratings, summary.listens, summary.follows
            );
        }
        Command::Profile { user } => {
            let store = open_existing(&config)?;
            let profile = Recommender::new(&store, config.tuning).profile(user.user)?;
            output(args.json, &profile, print_profile)?;
        }
        Command::Mood { user } => {
            let store = open_existing(&config)?;
            let result = Recommender::new(&store, config.tuning).mood_playlist(user.user)?;
            output_recommendation(args.json, &result, print_mood_playlist)?;
        }
        Command::Discover { user, save, name } => {
            let store = open_existing(&config)?;
            let engine = Recommender::new(&store, config.tuning);
            let playlist = engine.discovery_playlist(user.user)?;

            let saved = if save && !playlist.is_empty() {
                Some(engine.save_discovery_playlist(user.user, name.as_deref(), &playlist.track_ids())?)
            } else {
                None
            };

            if args.json {
                print_json(&DiscoverOutput { playlist: &playlist, saved: saved.as_ref() })?;
            } else {
                print_discovery_playlist(&playlist);
                if let Some(saved) = &saved {
                    print_saved(saved);
                } else if save {
                    println!("Nothing to save.");
                }
            }
        }
        Command::Smart { user, name, criteria } => {
            let store = open_existing(&config)?;
            let criteria = SmartCriteria::from(criteria);
            let result = Recommender::new(&store, config.tuning).create_smart_playlist(
                user.user,
                name.as_deref(),
                &criteria,
            )?;
            output_recommendation(args.json, &result, print_smart_playlist)?;
        }
        Command::Save { user, name, track_ids } => {
            let store = open_existing(&config)?;
            let saved = Recommender::new(&store, config.tuning).save_discovery_playlist(
                user.user,
                name.as_deref(),
                &track_ids,
            )?;
            output(args.json, &saved, print_saved)?;
        }
        Command::ShowPlaylist { id } => {
            let store = open_existing(&config)?;
            let shown = load_playlist(&store, id)?;
            output(args.json, &shown, print_shown_playlist)?;
        }
    }

    Ok(())
}

/// Opens the configured database, refusing to create an empty one.
fn open_existing(config: &RuntimeConfig) -> Result<SqliteStore> {
    if !config.db_path.exists() {
        bail!(
            "No database at {}. Run `cadenza init-db` and `cadenza import <file>` first.",
            config.db_path.display()
        );
    }
    SqliteStore::open(&config.db_path, config.busy_timeout())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverOutput<'a> {
    #[serde(flatten)]
    playlist: &'a DiscoveryPlaylist,
    saved: Option<&'a SavedPlaylist>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShownPlaylist {
    #[serde(flatten)]
    saved: SavedPlaylist,
    tracks: Vec<Track>,
}

fn load_playlist(store: &SqliteStore, id: PlaylistId) -> Result<ShownPlaylist> {
    let Some(playlist) = store.playlist(id)? else {
        bail!("Playlist {id} not found");
    };
    let rows = store.playlist_tracks(id)?;
    let ids: Vec<_> = rows.iter().map(|row| row.track_id).collect();

    let by_id: HashMap<_, _> = store
        .query_tracks(&TrackQuery::new(TrackFilter::Ids(ids.clone()), ids.len()))?
        .into_iter()
        .map(|track| (track.id, track))
        .collect();
    let tracks = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();

    info!("Loaded playlist {id} with {} tracks", rows.len());
    Ok(ShownPlaylist {
        saved: SavedPlaylist { playlist, track_count: rows.len() },
        tracks,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn output<T: Serialize>(json: bool, value: &T, print_text: fn(&T)) -> Result<()> {
    if json {
        print_json(value)
    } else {
        print_text(value);
        Ok(())
    }
}

fn output_recommendation<T: Serialize>(
    json: bool,
    result: &Recommendation<T>,
    print_text: fn(&T),
) -> Result<()> {
    if json {
        return print_json(result);
    }
    match result {
        Recommendation::Ready(value) => print_text(value),
        Recommendation::Unavailable(reason) => println!("{LEARNING_MESSAGE} ({reason})."),
    }
    Ok(())
}

fn describe_track(track: &Track) -> String {
    let mut tags = Vec::new();
    if let Some(genre) = &track.genre {
        tags.push(genre.clone());
    }
    if let Some(mood) = &track.mood {
        tags.push(mood.clone());
    }
    if let Some(bpm) = track.bpm {
        tags.push(format!("{bpm} bpm"));
    }
    format!("[{}] {} ({})", track.id, track.title, tags.join(", "))
}

fn print_profile(profile: &PreferenceProfile) {
    println!("Average bpm: {}", profile.average_bpm);
    println!("Genres:");
    for genre in profile.top_genres(usize::MAX) {
        println!("  {genre}: {}", profile.genre_weights[&genre]);
    }
    println!("Moods:");
    for mood in profile.top_moods(usize::MAX) {
        println!("  {mood}: {}", profile.mood_weights[&mood]);
    }
    let followed: Vec<_> = profile.followed_artist_ids.iter().map(ToString::to_string).collect();
    println!("Following: {}", if followed.is_empty() { "nobody".to_string() } else { followed.join(", ") });
}

fn print_mood_playlist(playlist: &MoodPlaylist) {
    println!("You seem to be in a {} mood. Up next:", playlist.dominant_mood);
    for (position, track) in (1..).zip(&playlist.tracks) {
        println!("{position:>3}. {}", describe_track(track));
    }
}

fn print_discovery_playlist(playlist: &DiscoveryPlaylist) {
    if playlist.is_empty() {
        println!("{LEARNING_MESSAGE}: no new tracks to suggest yet.");
        return;
    }
    for (position, candidate) in (1..).zip(&playlist.tracks) {
        println!(
            "{position:>3}. {:>6.1}  {}",
            candidate.discovery_score,
            describe_track(&candidate.track)
        );
    }
}

fn print_smart_playlist(smart: &SmartPlaylist) {
    print_saved(&smart.saved);
    for (position, track) in (1..).zip(&smart.tracks) {
        println!("{position:>3}. {}", describe_track(track));
    }
}

fn print_saved(saved: &SavedPlaylist) {
    println!(
        "Saved playlist {} \"{}\" with {} tracks",
        saved.playlist.id, saved.playlist.name, saved.track_count
    );
}

fn print_shown_playlist(shown: &ShownPlaylist) {
    let playlist = &shown.saved.playlist;
    println!("Playlist {} \"{}\" by user {}", playlist.id, playlist.name, playlist.creator_id);
    if let Some(description) = &playlist.description {
        println!("{description}");
    }
    for (position, track) in (1..).zip(&shown.tracks) {
        println!("{position:>3}. {}", describe_track(track));
    }
}
