//! Writes ranked track lists out as playlists.

use crate::error::{RecommendError, Result};
use crate::models::{NewPlaylist, Playlist, TrackId, UserId};
use crate::store::PlaylistStore;
use chrono::{Local, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};

/// Which operation produced the playlist. Decides the default name and
/// description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaylistKind {
    Discovery,
    Smart,
}

impl PlaylistKind {
    fn name_prefix(self) -> &'static str {
        match self {
            Self::Discovery => "Discovery Mix",
            Self::Smart => "Smart Playlist",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Discovery => "New tracks picked for your taste",
            Self::Smart => "Tracks matching your criteria",
        }
    }
}

/// `"Discovery Mix 2026-10-18"` style name for `date`.
#[must_use]
pub fn default_name(kind: PlaylistKind, date: NaiveDate) -> String {
    format!("{} {}", kind.name_prefix(), date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlaylist {
    pub playlist: Playlist,
    pub track_count: usize,
}

/// Creates a playlist holding `track_ids` in order.
///
/// A blank `name` falls back to [`default_name`] with today's local date.
/// An empty track list is rejected before the store is touched.
pub fn materialize<S: PlaylistStore + ?Sized>(
    store: &S,
    creator_id: UserId,
    name: Option<&str>,
    kind: PlaylistKind,
    track_ids: &[TrackId],
) -> Result<SavedPlaylist> {
    if track_ids.is_empty() {
        return Err(RecommendError::InvalidInput(
            "a playlist needs at least one track".to_string(),
        ));
    }

    let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => {
            let name = default_name(kind, Local::now().date_naive());
            info!("No playlist name given, using {name:?}");
            name
        }
    };

    let new_playlist = NewPlaylist {
        name,
        description: Some(kind.description().to_string()),
        creator_id,
    };
    let playlist = store.create_playlist(&new_playlist, track_ids)?;

    info!(
        "Created playlist {} {:?} for user {creator_id} with {} tracks",
        playlist.id,
        playlist.name,
        track_ids.len()
    );
    Ok(SavedPlaylist {
        playlist,
        track_count: track_ids.len(),
    })
}
