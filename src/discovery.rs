//! Discovery candidates: unseen tracks that fit a listener's profile.
//!
//! Two phases. Retrieval casts a wide, cheap net over the catalog (any of the
//! profile's signals is enough) and caps the pool; scoring then re-ranks only
//! that pool with [`crate::algorithm`].

use crate::algorithm::{rank_candidates, DiscoveryCandidate, ScoringContext};
use crate::filter::{TrackFilter, TrackQuery};
use crate::models::{ListenedTrack, RatedTrack, TrackId, UserId};
use crate::profile::PreferenceProfile;
use crate::store::{CatalogStore, HistoryStore};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Limits and thresholds of candidate retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryLimits {
    /// Tracks listened to more than this many times count as already known.
    pub known_listen_threshold: u32,
    /// How many of the heaviest genres and moods to retrieve by.
    pub top_n: usize,
    /// Retrieval bpm window around the profile's average bpm.
    pub bpm_window: u32,
    /// Tracks rated at least this are retrieved for anyone.
    pub high_rating_threshold: f64,
    /// Pool size handed to scoring.
    pub candidate_pool: usize,
    /// Ranked tracks returned.
    pub result_limit: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            known_listen_threshold: 3,
            top_n: 3,
            bpm_window: 20,
            high_rating_threshold: 4.0,
            candidate_pool: 25,
            result_limit: 20,
        }
    }
}

/// Tracks the listener already has an opinion on or knows well: everything
/// they rated, plus everything they played more than `known_listen_threshold`
/// times.
#[must_use]
pub fn exclusion_set(
    rated: &[RatedTrack],
    listened: &[ListenedTrack],
    known_listen_threshold: u32,
) -> BTreeSet<TrackId> {
    rated
        .iter()
        .map(|entry| entry.rating.track_id)
        .chain(
            listened
                .iter()
                .filter(|entry| entry.record.listen_count > known_listen_threshold)
                .map(|entry| entry.record.track_id),
        )
        .collect()
}

/// The retrieval filter: not excluded, and matching any profile signal.
#[must_use]
pub fn candidate_filter(
    profile: &PreferenceProfile,
    excluded: &BTreeSet<TrackId>,
    limits: &DiscoveryLimits,
) -> TrackFilter {
    let mut signals = Vec::new();

    let genres = profile.top_genres(limits.top_n);
    if !genres.is_empty() {
        signals.push(TrackFilter::Genre(genres));
    }
    let moods = profile.top_moods(limits.top_n);
    if !moods.is_empty() {
        signals.push(TrackFilter::Mood(moods));
    }
    signals.push(TrackFilter::bpm_around(profile.average_bpm, limits.bpm_window));
    if !profile.followed_artist_ids.is_empty() {
        signals.push(TrackFilter::ByArtists(
            profile.followed_artist_ids.iter().copied().collect(),
        ));
    }
    signals.push(TrackFilter::MinRating(limits.high_rating_threshold));

    TrackFilter::All(vec![
        TrackFilter::exclude_ids(excluded.iter().copied()),
        TrackFilter::Any(signals),
    ])
}

/// Retrieves, scores and ranks discovery candidates for `user_id`.
///
/// An empty result means there is nothing to suggest yet; it is not an error.
pub fn discover<S: HistoryStore + CatalogStore + ?Sized>(
    store: &S,
    user_id: UserId,
    profile: &PreferenceProfile,
    limits: &DiscoveryLimits,
    context: &ScoringContext,
) -> Result<Vec<DiscoveryCandidate>> {
    let rated = store
        .rated_tracks(user_id)
        .context("Failed to read ratings for discovery exclusions")?;
    let listened = store
        .listened_tracks(user_id)
        .context("Failed to read listening statistics for discovery exclusions")?;
    let excluded = exclusion_set(&rated, &listened, limits.known_listen_threshold);

    let query = TrackQuery::new(
        candidate_filter(profile, &excluded, limits),
        limits.candidate_pool,
    );
    let pool = store
        .query_tracks(&query)
        .context("Failed to retrieve discovery candidates")?;
    let pool_size = pool.len();

    let ranked = rank_candidates(pool, profile, context, limits.result_limit);
    debug!(
        "Discovery for user {user_id}: {} excluded, {pool_size} retrieved, {} ranked",
        excluded.len(),
        ranked.len()
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListeningRecord, RatingRecord, Track};
    use crate::profile::ProfileWeights;

    fn track(id: TrackId) -> Track {
        Track {
            id,
            title: String::new(),
            genre: None,
            mood: None,
            bpm: None,
            average_rating: 0.0,
            like_count: 0,
            uploaded_at: 0,
            artist_ids: vec![],
        }
    }

    fn rated(id: TrackId, liked: bool) -> RatedTrack {
        RatedTrack {
            rating: RatingRecord { user_id: 1, track_id: id, liked },
            track: track(id),
        }
    }

    fn listened(id: TrackId, listen_count: u32) -> ListenedTrack {
        ListenedTrack {
            record: ListeningRecord { user_id: 1, track_id: id, listen_count, last_listened_at: 0 },
            track: track(id),
        }
    }

    #[test]
    fn test_exclusion_set() {
        let excluded = exclusion_set(
            &[rated(1, true), rated(2, false)],
            &[listened(3, 3), listened(4, 4), listened(1, 9)],
            3,
        );
        assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn test_cold_start_filter_keeps_generic_signals() {
        let profile = PreferenceProfile::empty(&ProfileWeights::default());
        let filter = candidate_filter(&profile, &BTreeSet::new(), &DiscoveryLimits::default());

        assert_eq!(
            filter,
            TrackFilter::All(vec![
                TrackFilter::Not(Box::new(TrackFilter::Ids(vec![]))),
                TrackFilter::Any(vec![
                    TrackFilter::BpmRange { min: 100, max: 140 },
                    TrackFilter::MinRating(4.0),
                ]),
            ])
        );
    }

    #[test]
    fn test_filter_admits_any_signal_but_never_excluded() {
        let mut profile = PreferenceProfile::empty(&ProfileWeights::default());
        profile.genre_weights.insert("Jazz".to_string(), 6);
        profile.followed_artist_ids.insert(9);
        profile.average_bpm = 90;
        let excluded: BTreeSet<_> = [5].into_iter().collect();
        let filter = candidate_filter(&profile, &excluded, &DiscoveryLimits::default());

        let jazz = Track { genre: Some("Jazz".to_string()), ..track(1) };
        let by_followed = Track { artist_ids: vec![9], ..track(2) };
        let near_tempo = Track { bpm: Some(105), ..track(3) };
        let popular = Track { average_rating: 4.2, ..track(4) };
        let excluded_jazz = Track { genre: Some("Jazz".to_string()), ..track(5) };
        let unrelated = Track { genre: Some("Metal".to_string()), bpm: Some(180), ..track(6) };

        assert!(filter.matches(&jazz));
        assert!(filter.matches(&by_followed));
        assert!(filter.matches(&near_tempo));
        assert!(filter.matches(&popular));
        assert!(!filter.matches(&excluded_jazz));
        assert!(!filter.matches(&unrelated));
    }
}
