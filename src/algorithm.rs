//! Discovery scoring.
//!
//! Scores a candidate track against a listener's [`PreferenceProfile`]. The
//! score is a plain sum of independent terms, so each one can be reasoned
//! about (and tuned) on its own:
//!
//! ```text
//! score = genre_weight * genre_multiplier          (genre in profile)
//!       + mood_weight  * mood_multiplier           (mood in profile)
//!       + max(0, bpm_window - |bpm - average_bpm|) (bpm known)
//!       + followed_artist_bonus                    (any credited artist followed)
//!       + average_rating * rating_multiplier       (average_rating >= threshold)
//!       + min(like_count / like_divisor, popularity_cap)
//! ```

use crate::models::Track;
use crate::profile::PreferenceProfile;
use log::trace;
use serde::{Deserialize, Serialize};

/// Multipliers and bonuses of the discovery score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringContext {
    pub genre_multiplier: f64,
    pub mood_multiplier: f64,
    /// Bpm distance at which the tempo term reaches zero.
    pub bpm_window: u32,
    pub followed_artist_bonus: f64,
    /// Ratings below this earn nothing.
    pub high_rating_threshold: f64,
    pub rating_multiplier: f64,
    pub like_divisor: f64,
    pub popularity_cap: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            genre_multiplier: 3.0,
            mood_multiplier: 3.0,
            bpm_window: 20,
            followed_artist_bonus: 15.0,
            high_rating_threshold: 4.0,
            rating_multiplier: 2.0,
            like_divisor: 10.0,
            popularity_cap: 5.0,
        }
    }
}

/// A track with its discovery score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryCandidate {
    #[serde(flatten)]
    pub track: Track,
    pub discovery_score: f64,
}

#[must_use]
pub fn calculate_discovery_score(
    track: &Track,
    profile: &PreferenceProfile,
    context: &ScoringContext,
) -> f64 {
    let genre = track
        .genre
        .as_deref()
        .and_then(|genre| profile.genre_weight(genre))
        .map_or(0.0, |weight| f64::from(weight) * context.genre_multiplier);

    let mood = track
        .mood
        .as_deref()
        .and_then(|mood| profile.mood_weight(mood))
        .map_or(0.0, |weight| f64::from(weight) * context.mood_multiplier);

    let tempo = track
        .bpm
        .map_or(0.0, |bpm| tempo_score(bpm, profile.average_bpm, context.bpm_window));

    let followed = if profile.follows_any_artist_of(track) {
        context.followed_artist_bonus
    } else {
        0.0
    };

    let rating = if track.average_rating >= context.high_rating_threshold {
        track.average_rating * context.rating_multiplier
    } else {
        0.0
    };

    let popularity = popularity_score(track.like_count, context);

    let score = genre + mood + tempo + followed + rating + popularity;
    trace!(
        "Track {} scored {score:.2} (genre {genre}, mood {mood}, tempo {tempo}, followed {followed}, rating {rating}, popularity {popularity})",
        track.id
    );
    score
}

/// Closeness to the listener's average tempo. Never negative, and never
/// larger for a track further away.
#[must_use]
pub fn tempo_score(bpm: u32, average_bpm: u32, window: u32) -> f64 {
    f64::from(window.saturating_sub(bpm.abs_diff(average_bpm)))
}

/// Likes help, with diminishing returns past the cap.
#[inline]
fn popularity_score(like_count: u32, context: &ScoringContext) -> f64 {
    if context.like_divisor <= 0.0 {
        return 0.0;
    }
    (f64::from(like_count) / context.like_divisor).min(context.popularity_cap)
}

/// Lazily scores each track.
#[must_use = "Iterator should be consumed to calculate scores"]
pub fn batch_calculate_scores<'a>(
    tracks: &'a [Track],
    profile: &'a PreferenceProfile,
    context: &'a ScoringContext,
) -> impl Iterator<Item = (&'a Track, f64)> + 'a {
    tracks
        .iter()
        .map(move |track| (track, calculate_discovery_score(track, profile, context)))
}

/// Scores `tracks`, sorts by score descending and keeps the best `limit`.
///
/// The sort is stable: equal scores keep the order `tracks` came in.
#[must_use]
pub fn rank_candidates(
    tracks: Vec<Track>,
    profile: &PreferenceProfile,
    context: &ScoringContext,
    limit: usize,
) -> Vec<DiscoveryCandidate> {
    let mut ranked: Vec<DiscoveryCandidate> = tracks
        .into_iter()
        .map(|track| {
            let discovery_score = calculate_discovery_score(&track, profile, context);
            DiscoveryCandidate { track, discovery_score }
        })
        .collect();

    ranked.sort_by(|a, b| b.discovery_score.total_cmp(&a.discovery_score));
    ranked.truncate(limit);
    ranked
}
