//! Smart playlist criteria.
//!
//! Numeric floors are conjunctive, categorical filters are alternatives:
//! a track must sit in the bpm range and reach the minimum rating, and then
//! match at least one of the requested genres, moods or followed artists.
//! With no categorical filter at all only the floors apply.

use crate::error::{RecommendError, Result};
use crate::filter::{TrackFilter, TrackQuery};
use crate::models::{ListenedTrack, Track, TrackId, UserId};
use crate::store::{CatalogStore, HistoryStore};
use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};

/// Highest average rating a track can have.
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartCriteria {
    /// Empty means no genre filter.
    pub genres: Vec<String>,
    /// Empty means no mood filter.
    pub moods: Vec<String>,
    pub bpm_range: Option<BpmRange>,
    pub min_rating: Option<f64>,
    /// Leave out tracks the user already played often.
    pub exclude_heard: bool,
    /// Also accept tracks by artists the user follows.
    pub include_followed_artists: bool,
    pub max_tracks: Option<usize>,
}

impl SmartCriteria {
    /// Rejects criteria that are contradictory or out of range.
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.bpm_range {
            if range.min > range.max {
                return Err(RecommendError::InvalidCriteria(format!(
                    "bpm range minimum {} is above maximum {}",
                    range.min, range.max
                )));
            }
        }
        if let Some(min_rating) = self.min_rating {
            if !min_rating.is_finite() || min_rating < 0.0 {
                return Err(RecommendError::InvalidCriteria(format!(
                    "minimum rating must be a non-negative number, got {min_rating}"
                )));
            }
            if min_rating > MAX_RATING {
                return Err(RecommendError::InvalidCriteria(format!(
                    "minimum rating {min_rating} is above the maximum rating {MAX_RATING}"
                )));
            }
        }
        if self.max_tracks == Some(0) {
            return Err(RecommendError::InvalidCriteria(
                "max tracks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn has_categorical_filter(&self) -> bool {
        !self.genres.is_empty() || !self.moods.is_empty() || self.include_followed_artists
    }

    /// The catalog filter for these criteria.
    ///
    /// `followed` is only consulted with `include_followed_artists`, `heard`
    /// only with `exclude_heard`.
    pub fn build_filter(&self, followed: &[UserId], heard: &[TrackId]) -> TrackFilter {
        let mut clauses = Vec::new();

        if let Some(BpmRange { min, max }) = self.bpm_range {
            clauses.push(TrackFilter::BpmRange { min, max });
        }
        clauses.push(TrackFilter::MinRating(self.min_rating.unwrap_or(0.0)));

        if self.has_categorical_filter() {
            let mut alternatives = Vec::new();
            if !self.genres.is_empty() {
                alternatives.push(TrackFilter::Genre(self.genres.clone()));
            }
            if !self.moods.is_empty() {
                alternatives.push(TrackFilter::Mood(self.moods.clone()));
            }
            if self.include_followed_artists {
                alternatives.push(TrackFilter::ByArtists(followed.to_vec()));
            }
            clauses.push(TrackFilter::Any(alternatives));
        }

        if self.exclude_heard {
            clauses.push(TrackFilter::exclude_ids(heard.iter().copied()));
        }

        TrackFilter::All(clauses)
    }
}

/// Tracks the user played more than `threshold` times.
#[must_use]
pub fn heard_track_ids(listened: &[ListenedTrack], threshold: u32) -> Vec<TrackId> {
    listened
        .iter()
        .filter(|entry| entry.record.listen_count > threshold)
        .map(|entry| entry.record.track_id)
        .collect()
}

/// Validates `criteria` and returns the matching catalog tracks in catalog
/// order, at most `max_tracks` (or `default_max_tracks`) of them.
///
/// History is only read when the criteria need it.
pub fn find_matching_tracks<S: HistoryStore + CatalogStore + ?Sized>(
    store: &S,
    user_id: UserId,
    criteria: &SmartCriteria,
    heard_listen_threshold: u32,
    default_max_tracks: usize,
) -> Result<Vec<Track>> {
    criteria.validate()?;

    let followed = if criteria.include_followed_artists {
        store
            .followed_artists(user_id)
            .context("Failed to read follows for smart playlist")?
    } else {
        Vec::new()
    };
    let heard = if criteria.exclude_heard {
        let listened = store
            .listened_tracks(user_id)
            .context("Failed to read listening statistics for smart playlist")?;
        heard_track_ids(&listened, heard_listen_threshold)
    } else {
        Vec::new()
    };

    let limit = criteria.max_tracks.unwrap_or(default_max_tracks);
    let query = TrackQuery::new(criteria.build_filter(&followed, &heard), limit);
    let tracks = store
        .query_tracks(&query)
        .context("Failed to query catalog for smart playlist")?;

    debug!(
        "Smart criteria for user {user_id}: {} followed, {} heard excluded, {} of at most {limit} tracks matched",
        followed.len(),
        heard.len(),
        tracks.len()
    );
    Ok(tracks)
}
