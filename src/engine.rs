//! The recommendation operations, wired over a [`RecommendationStore`].
//!
//! Each call is an independent request: the profile and session are rebuilt
//! from history every time and nothing is cached between calls.

use crate::algorithm::DiscoveryCandidate;
use crate::config::Tuning;
use crate::criteria::{find_matching_tracks, SmartCriteria};
use crate::discovery::discover;
use crate::error::Result;
use crate::models::{ListenedTrack, Track, TrackId, UserId};
use crate::mood::{analyze_session, tracks_for_mood};
use crate::playlist::{materialize, PlaylistKind, SavedPlaylist};
use crate::profile::{load_profile, PreferenceProfile};
use crate::store::RecommendationStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why there is nothing to recommend yet. Not an error: the listener simply
/// has not given the engine enough to work with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "mood", rename_all = "camelCase")]
pub enum InsufficientData {
    NoListeningHistory,
    NoDominantMood,
    NoTracksForMood(String),
    NoMatchingTracks,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoListeningHistory => write!(f, "no listening history yet"),
            Self::NoDominantMood => write!(f, "recent tracks carry no mood"),
            Self::NoTracksForMood(mood) => write!(f, "no other tracks found for mood {mood}"),
            Self::NoMatchingTracks => write!(f, "no tracks match the criteria"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "camelCase")]
pub enum Recommendation<T> {
    Ready(T),
    Unavailable(InsufficientData),
}

impl<T> Recommendation<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The result, if there is one.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodPlaylist {
    pub dominant_mood: String,
    /// The recent listens the mood was read from.
    pub session: Vec<ListenedTrack>,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryPlaylist {
    /// Best first.
    pub tracks: Vec<DiscoveryCandidate>,
    pub profile: PreferenceProfile,
}

impl DiscoveryPlaylist {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|candidate| candidate.track.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartPlaylist {
    #[serde(flatten)]
    pub saved: SavedPlaylist,
    pub tracks: Vec<Track>,
}

/// Runs recommendation operations against `store` with fixed tuning.
pub struct Recommender<'a, S: RecommendationStore + ?Sized> {
    store: &'a S,
    tuning: Tuning,
}

impl<'a, S: RecommendationStore + ?Sized> Recommender<'a, S> {
    pub fn new(store: &'a S, tuning: Tuning) -> Self {
        Self { store, tuning }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// The user's current preference profile.
    pub fn profile(&self, user_id: UserId) -> Result<PreferenceProfile> {
        Ok(load_profile(self.store, user_id, &self.tuning.profile)?)
    }

    /// Tracks in the mood of the user's latest listening session, leaving out
    /// the session's own tracks.
    pub fn mood_playlist(&self, user_id: UserId) -> Result<Recommendation<MoodPlaylist>> {
        let session = analyze_session(
            self.store,
            user_id,
            self.tuning.session_size,
            self.tuning.session_pool,
        )?;

        if session.tracks.is_empty() {
            return Ok(unavailable(user_id, InsufficientData::NoListeningHistory));
        }
        let Some(mood) = session.dominant_mood.clone() else {
            return Ok(unavailable(user_id, InsufficientData::NoDominantMood));
        };

        let tracks = tracks_for_mood(self.store, &mood, &session, self.tuning.mood_playlist_limit)?;
        if tracks.is_empty() {
            return Ok(unavailable(user_id, InsufficientData::NoTracksForMood(mood)));
        }

        Ok(Recommendation::Ready(MoodPlaylist {
            dominant_mood: mood,
            session: session.tracks,
            tracks,
        }))
    }

    /// Unseen tracks ranked against the user's profile. May be empty.
    pub fn discovery_playlist(&self, user_id: UserId) -> Result<DiscoveryPlaylist> {
        let profile = self.profile(user_id)?;
        let tracks = discover(
            self.store,
            user_id,
            &profile,
            &self.tuning.discovery_limits(),
            &self.tuning.scoring,
        )?;
        Ok(DiscoveryPlaylist { tracks, profile })
    }

    /// Finds the tracks matching `criteria` and saves them as a playlist.
    ///
    /// Nothing is written when no track matches.
    pub fn create_smart_playlist(
        &self,
        user_id: UserId,
        name: Option<&str>,
        criteria: &SmartCriteria,
    ) -> Result<Recommendation<SmartPlaylist>> {
        let tracks = find_matching_tracks(
            self.store,
            user_id,
            criteria,
            self.tuning.heard_listen_threshold,
            self.tuning.smart_default_max_tracks,
        )?;
        if tracks.is_empty() {
            return Ok(unavailable(user_id, InsufficientData::NoMatchingTracks));
        }

        let track_ids: Vec<TrackId> = tracks.iter().map(|track| track.id).collect();
        let saved = materialize(self.store, user_id, name, PlaylistKind::Smart, &track_ids)?;
        Ok(Recommendation::Ready(SmartPlaylist { saved, tracks }))
    }

    /// Saves an already chosen list of tracks, in order, as a discovery playlist.
    pub fn save_discovery_playlist(
        &self,
        user_id: UserId,
        name: Option<&str>,
        track_ids: &[TrackId],
    ) -> Result<SavedPlaylist> {
        materialize(self.store, user_id, name, PlaylistKind::Discovery, track_ids)
    }
}

fn unavailable<T>(user_id: UserId, reason: InsufficientData) -> Recommendation<T> {
    info!("Nothing to recommend for user {user_id}: {reason}");
    Recommendation::Unavailable(reason)
}
