//! Composable catalog filters.
//!
//! Components describe which tracks they want as a [`TrackFilter`] tree and
//! hand it to a [`crate::store::CatalogStore`] inside a [`TrackQuery`]. The
//! store decides how to evaluate it; [`TrackFilter::matches`] is the reference
//! semantics every store must agree with.
//!
//! A track whose genre, mood or bpm is missing never satisfies a clause on
//! that field, and `Not` of such a clause is satisfied.

use crate::models::{Track, TrackId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackFilter {
    /// Genre is one of the values.
    Genre(Vec<String>),
    /// Mood is one of the values.
    Mood(Vec<String>),
    /// Bpm within `min..=max`.
    BpmRange { min: u32, max: u32 },
    /// Average rating at least this.
    MinRating(f64),
    /// Any credited artist is one of these users.
    ByArtists(Vec<UserId>),
    /// Track id is one of these.
    Ids(Vec<TrackId>),
    /// At least one child matches. Empty is false.
    Any(Vec<TrackFilter>),
    /// Every child matches. Empty is true.
    All(Vec<TrackFilter>),
    Not(Box<TrackFilter>),
}

impl TrackFilter {
    /// Excludes every id in `ids`.
    pub fn exclude_ids(ids: impl IntoIterator<Item = TrackId>) -> Self {
        Self::Not(Box::new(Self::Ids(ids.into_iter().collect())))
    }

    /// Bpm range centred on `center`, clamped at zero.
    pub fn bpm_around(center: u32, window: u32) -> Self {
        Self::BpmRange {
            min: center.saturating_sub(window),
            max: center.saturating_add(window),
        }
    }

    #[must_use]
    pub fn matches(&self, track: &Track) -> bool {
        match self {
            Self::Genre(values) => contains_tag(values, track.genre.as_deref()),
            Self::Mood(values) => contains_tag(values, track.mood.as_deref()),
            Self::BpmRange { min, max } => track.bpm.is_some_and(|bpm| (*min..=*max).contains(&bpm)),
            Self::MinRating(floor) => track.average_rating >= *floor,
            Self::ByArtists(artists) => track.is_by_any(artists.iter()),
            Self::Ids(ids) => ids.contains(&track.id),
            Self::Any(filters) => filters.iter().any(|filter| filter.matches(track)),
            Self::All(filters) => filters.iter().all(|filter| filter.matches(track)),
            Self::Not(filter) => !filter.matches(track),
        }
    }
}

fn contains_tag(values: &[String], tag: Option<&str>) -> bool {
    tag.is_some_and(|tag| values.iter().any(|value| value == tag))
}

/// A catalog read: every track matching `filter`, ordered by average rating,
/// like count and upload date (all descending, then id ascending), truncated
/// to `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackQuery {
    pub filter: TrackFilter,
    pub limit: usize,
}

impl TrackQuery {
    pub fn new(filter: TrackFilter, limit: usize) -> Self {
        Self { filter, limit }
    }
}
