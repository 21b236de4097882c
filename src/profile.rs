//! Preference profile: what a listener gravitates to, learned from likes and
//! listening counts.
//!
//! The profile is rebuilt from history on every request and never stored.

use crate::models::{ListenedTrack, RatedTrack, Track, UserId};
use crate::store::HistoryStore;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weights applied while accumulating a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileWeights {
    /// Weight of one liked rating.
    pub liked_weight: u32,
    /// Listen counts above this add no extra weight.
    pub listen_cap: u32,
    /// Average bpm reported when no weighted track has a bpm.
    pub default_bpm: u32,
}

impl Default for ProfileWeights {
    fn default() -> Self {
        Self {
            liked_weight: 2,
            listen_cap: 5,
            default_bpm: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceProfile {
    pub genre_weights: BTreeMap<String, u32>,
    pub mood_weights: BTreeMap<String, u32>,
    pub average_bpm: u32,
    pub followed_artist_ids: BTreeSet<UserId>,
}

impl PreferenceProfile {
    /// The profile of a listener with no history.
    pub fn empty(weights: &ProfileWeights) -> Self {
        Self {
            genre_weights: BTreeMap::new(),
            mood_weights: BTreeMap::new(),
            average_bpm: weights.default_bpm,
            followed_artist_ids: BTreeSet::new(),
        }
    }

    /// The `n` heaviest genres, heaviest first. Equal weights sort by name.
    pub fn top_genres(&self, n: usize) -> Vec<String> {
        heaviest(&self.genre_weights, n)
    }

    /// The `n` heaviest moods, heaviest first. Equal weights sort by name.
    pub fn top_moods(&self, n: usize) -> Vec<String> {
        heaviest(&self.mood_weights, n)
    }

    pub fn genre_weight(&self, genre: &str) -> Option<u32> {
        self.genre_weights.get(genre).copied()
    }

    pub fn mood_weight(&self, mood: &str) -> Option<u32> {
        self.mood_weights.get(mood).copied()
    }

    pub fn follows_any_artist_of(&self, track: &Track) -> bool {
        track.is_by_any(self.followed_artist_ids.iter())
    }
}

fn heaviest(weights: &BTreeMap<String, u32>, n: usize) -> Vec<String> {
    let mut entries: Vec<_> = weights.iter().collect();
    // BTreeMap iteration is already name-ordered, stable sort keeps it for ties.
    entries.sort_by(|(_, a), (_, b)| b.cmp(a));
    entries.into_iter().take(n).map(|(key, _)| key.clone()).collect()
}

/// Running sums while a profile is being built.
#[derive(Debug, Default)]
struct Accumulator {
    genres: BTreeMap<String, u32>,
    moods: BTreeMap<String, u32>,
    bpm_sum: u64,
    bpm_weight: u64,
}

impl Accumulator {
    fn add(&mut self, track: &Track, weight: u32) {
        if weight == 0 {
            return;
        }
        if let Some(genre) = &track.genre {
            *self.genres.entry(genre.clone()).or_insert(0) += weight;
        }
        if let Some(mood) = &track.mood {
            *self.moods.entry(mood.clone()).or_insert(0) += weight;
        }
        if let Some(bpm) = track.bpm {
            self.bpm_sum += u64::from(bpm) * u64::from(weight);
            self.bpm_weight += u64::from(weight);
        }
    }

    fn average_bpm(&self, default_bpm: u32) -> u32 {
        if self.bpm_weight == 0 {
            return default_bpm;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let average = (self.bpm_sum as f64 / self.bpm_weight as f64).round() as u32;
        average
    }
}

/// Builds a profile from already-fetched history.
///
/// Only liked ratings count; dislikes are ignored here (they still exclude
/// tracks from discovery). Listening records with a zero count are skipped.
#[must_use]
pub fn build_profile(
    rated: &[RatedTrack],
    listened: &[ListenedTrack],
    followed: impl IntoIterator<Item = UserId>,
    weights: &ProfileWeights,
) -> PreferenceProfile {
    let mut acc = Accumulator::default();

    for entry in rated.iter().filter(|entry| entry.rating.liked) {
        acc.add(&entry.track, weights.liked_weight);
    }
    for entry in listened.iter().filter(|entry| entry.record.listen_count > 0) {
        acc.add(&entry.track, entry.record.listen_count.min(weights.listen_cap));
    }

    PreferenceProfile {
        average_bpm: acc.average_bpm(weights.default_bpm),
        genre_weights: acc.genres,
        mood_weights: acc.moods,
        followed_artist_ids: followed.into_iter().collect(),
    }
}

/// Reads the user's history from `store` and builds their profile.
pub fn load_profile<S: HistoryStore + ?Sized>(
    store: &S,
    user_id: UserId,
    weights: &ProfileWeights,
) -> Result<PreferenceProfile> {
    let rated = store
        .rated_tracks(user_id)
        .context("Failed to read ratings for preference profile")?;
    let listened = store
        .listened_tracks(user_id)
        .context("Failed to read listening statistics for preference profile")?;
    let followed = store
        .followed_artists(user_id)
        .context("Failed to read follows for preference profile")?;

    let profile = build_profile(&rated, &listened, followed, weights);
    debug!(
        "Profile for user {user_id}: {} genres, {} moods, average bpm {}, {} followed artists",
        profile.genre_weights.len(),
        profile.mood_weights.len(),
        profile.average_bpm,
        profile.followed_artist_ids.len()
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListeningRecord, RatingRecord};

    fn track(id: i64, genre: Option<&str>, mood: Option<&str>, bpm: Option<u32>) -> Track {
        Track {
            id,
            title: format!("Track {id}"),
            genre: genre.map(str::to_string),
            mood: mood.map(str::to_string),
            bpm,
            average_rating: 0.0,
            like_count: 0,
            uploaded_at: 0,
            artist_ids: vec![],
        }
    }

    fn liked(track: Track, liked: bool) -> RatedTrack {
        RatedTrack {
            rating: RatingRecord { user_id: 1, track_id: track.id, liked },
            track,
        }
    }

    fn listened(track: Track, listen_count: u32) -> ListenedTrack {
        ListenedTrack {
            record: ListeningRecord {
                user_id: 1,
                track_id: track.id,
                listen_count,
                last_listened_at: 0,
            },
            track,
        }
    }

    #[test]
    fn test_empty_history_gives_default_profile() {
        let weights = ProfileWeights::default();
        let profile = build_profile(&[], &[], [], &weights);

        assert_eq!(profile, PreferenceProfile::empty(&weights));
        assert_eq!(profile.average_bpm, 120);
    }

    #[test]
    fn test_jazz_listener() {
        let rated = [liked(track(1, Some("Jazz"), None, Some(90)), true)];
        let heard = [listened(track(2, Some("Jazz"), Some("calm"), Some(95)), 4)];

        let profile = build_profile(&rated, &heard, [7], &ProfileWeights::default());

        assert_eq!(profile.genre_weight("Jazz"), Some(6));
        assert_eq!(profile.mood_weight("calm"), Some(4));
        // round((90 * 2 + 95 * 4) / 6) = round(93.33)
        assert_eq!(profile.average_bpm, 93);
        assert!(profile.followed_artist_ids.contains(&7));
    }

    #[test]
    fn test_listen_weight_is_capped() {
        let heard = [
            listened(track(1, Some("Rock"), None, None), 50),
            listened(track(2, Some("Pop"), None, None), 3),
        ];
        let profile = build_profile(&[], &heard, [], &ProfileWeights::default());

        assert_eq!(profile.genre_weight("Rock"), Some(5));
        assert_eq!(profile.genre_weight("Pop"), Some(3));
    }

    #[test]
    fn test_dislikes_and_silent_records_are_ignored() {
        let rated = [liked(track(1, Some("Metal"), Some("angry"), Some(180)), false)];
        let heard = [listened(track(2, Some("Folk"), None, Some(70)), 0)];

        let profile = build_profile(&rated, &heard, [], &ProfileWeights::default());

        assert!(profile.genre_weights.is_empty());
        assert!(profile.mood_weights.is_empty());
        assert_eq!(profile.average_bpm, 120);
    }

    #[test]
    fn test_top_keys_break_ties_by_name() {
        let heard = [
            listened(track(1, Some("Soul"), None, None), 2),
            listened(track(2, Some("Blues"), None, None), 2),
            listened(track(3, Some("Jazz"), None, None), 5),
            listened(track(4, Some("Funk"), None, None), 1),
        ];
        let profile = build_profile(&[], &heard, [], &ProfileWeights::default());

        assert_eq!(profile.top_genres(3), vec!["Jazz", "Blues", "Soul"]);
        assert!(profile.top_moods(3).is_empty());
    }

    #[test]
    fn test_bpm_round_half_up() {
        let heard = [
            listened(track(1, None, None, Some(100)), 1),
            listened(track(2, None, None, Some(101)), 1),
        ];
        let profile = build_profile(&[], &heard, [], &ProfileWeights::default());
        assert_eq!(profile.average_bpm, 101);
    }
}
