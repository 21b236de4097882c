//! Mood session analysis.
//!
//! The dominant mood comes from the last few *distinct* tracks the listener
//! played, not from all-time history, so the mood playlist follows what they
//! are in the middle of right now.

use crate::filter::{TrackFilter, TrackQuery};
use crate::models::{ListenedTrack, Track, TrackId, UserId};
use crate::store::{CatalogStore, HistoryStore};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The analyzed listening session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSession {
    /// `None` when none of the session tracks carries a mood.
    pub dominant_mood: Option<String>,
    /// The distinct records the mood was read from, most recent first.
    pub tracks: Vec<ListenedTrack>,
}

impl MoodSession {
    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.iter().map(|entry| entry.track.id)
    }
}

/// Keeps the first occurrence of each track, in order, until `size` distinct
/// tracks are collected. Returns fewer when `recent` runs out.
#[must_use]
pub fn select_session(recent: &[ListenedTrack], size: usize) -> Vec<ListenedTrack> {
    let mut seen = HashSet::new();
    recent
        .iter()
        .filter(|entry| seen.insert(entry.track.id))
        .take(size)
        .cloned()
        .collect()
}

/// Most frequent mood among `tracks`. Ties go to the mood seen first.
#[must_use]
pub fn dominant_mood<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Option<String> {
    // Insertion-ordered tally; the session is tiny so a linear scan is fine.
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for mood in tracks.into_iter().filter_map(|track| track.mood.as_deref()) {
        match tally.iter_mut().find(|(seen, _)| *seen == mood) {
            Some((_, count)) => *count += 1,
            None => tally.push((mood, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (mood, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((mood, count));
        }
    }
    best.map(|(mood, _)| mood.to_string())
}

/// Reads the user's latest listens and derives the session mood.
///
/// `pool` records are fetched so that repeats can be skipped while still
/// collecting `size` distinct tracks.
pub fn analyze_session<S: HistoryStore + ?Sized>(
    store: &S,
    user_id: UserId,
    size: usize,
    pool: usize,
) -> Result<MoodSession> {
    let recent = store
        .recent_listens(user_id, pool.max(size))
        .context("Failed to read recent listens for mood session")?;
    let tracks = select_session(&recent, size);
    let dominant_mood = dominant_mood(tracks.iter().map(|entry| &entry.track));

    debug!(
        "Mood session for user {user_id}: {} of {} recent records used, dominant mood {:?}",
        tracks.len(),
        recent.len(),
        dominant_mood
    );
    Ok(MoodSession { dominant_mood, tracks })
}

/// Catalog tracks in `mood`, leaving out the ones the session already played.
pub fn tracks_for_mood<S: CatalogStore + ?Sized>(
    store: &S,
    mood: &str,
    session: &MoodSession,
    limit: usize,
) -> Result<Vec<Track>> {
    let filter = TrackFilter::All(vec![
        TrackFilter::Mood(vec![mood.to_string()]),
        TrackFilter::exclude_ids(session.track_ids()),
    ]);
    store
        .query_tracks(&TrackQuery::new(filter, limit))
        .with_context(|| format!("Failed to query catalog for mood {mood}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListeningRecord;

    fn listened(id: TrackId, mood: Option<&str>, at: i64) -> ListenedTrack {
        ListenedTrack {
            record: ListeningRecord {
                user_id: 1,
                track_id: id,
                listen_count: 1,
                last_listened_at: at,
            },
            track: Track {
                id,
                title: format!("Track {id}"),
                genre: None,
                mood: mood.map(str::to_string),
                bpm: None,
                average_rating: 0.0,
                like_count: 0,
                uploaded_at: 0,
                artist_ids: vec![],
            },
        }
    }

    #[test]
    fn test_majority_mood_wins() {
        let recent = [
            listened(1, Some("happy"), 30),
            listened(2, Some("sad"), 20),
            listened(3, Some("happy"), 10),
        ];
        let session = select_session(&recent, 3);
        assert_eq!(
            dominant_mood(session.iter().map(|e| &e.track)),
            Some("happy".to_string())
        );
    }

    #[test]
    fn test_tie_goes_to_most_recent_mood() {
        let recent = [
            listened(1, Some("sad"), 30),
            listened(2, Some("happy"), 20),
            listened(3, None, 10),
        ];
        let session = select_session(&recent, 3);
        assert_eq!(
            dominant_mood(session.iter().map(|e| &e.track)),
            Some("sad".to_string())
        );
    }

    #[test]
    fn test_no_mood_is_not_an_error() {
        let recent = [listened(1, None, 30), listened(2, None, 20)];
        assert_eq!(dominant_mood(recent.iter().map(|e| &e.track)), None);
        assert_eq!(dominant_mood(std::iter::empty()), None);
    }

    #[test]
    fn test_session_skips_repeats() {
        let recent = [
            listened(1, Some("calm"), 50),
            listened(1, Some("calm"), 40),
            listened(2, Some("calm"), 30),
            listened(2, Some("calm"), 20),
            listened(3, Some("dark"), 10),
            listened(4, Some("dark"), 5),
        ];
        let ids: Vec<_> = select_session(&recent, 3).iter().map(|e| e.track.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_short_history_gives_short_session() {
        let recent = [listened(1, Some("calm"), 50), listened(1, Some("calm"), 40)];
        assert_eq!(select_session(&recent, 3).len(), 1);
    }
}
