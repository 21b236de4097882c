//! Records the engine reads from its collaborators and the playlist rows it
//! writes back.
//!
//! Timestamps are unix seconds. Aggregates are plain integers and floats at
//! this boundary; nothing downstream converts numeric types.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type TrackId = i64;
pub type PlaylistId = i64;

/// A catalog track, with only the fields scoring and filtering look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub bpm: Option<u32>,
    /// 0.0 when nobody rated the track yet.
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub uploaded_at: i64,
    /// Credited artists, sorted ascending.
    #[serde(default)]
    pub artist_ids: Vec<UserId>,
}

impl Track {
    /// True when any credited artist is in `artists`.
    pub fn is_by_any<'a>(&self, mut artists: impl Iterator<Item = &'a UserId>) -> bool {
        artists.any(|artist| self.artist_ids.contains(artist))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningRecord {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub listen_count: u32,
    pub last_listened_at: i64,
}

/// A like or a dislike. No record at all means no opinion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followed_id: UserId,
}

/// A listening record joined with its track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenedTrack {
    pub record: ListeningRecord,
    pub track: Track,
}

/// A rating joined with its track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedTrack {
    pub rating: RatingRecord,
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: UserId,
    pub created_at: i64,
}

/// `position` is 1-based and dense within a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrack {
    pub playlist_id: PlaylistId,
    pub track_id: TrackId,
    pub position: u32,
}

/// Playlist row to insert; the store assigns id and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylist {
    pub name: String,
    pub description: Option<String>,
    pub creator_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
}

/// A full snapshot of the collaborator data, as read by `cadenza import`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub ratings: Vec<RatingRecord>,
    #[serde(default)]
    pub listens: Vec<ListeningRecord>,
    #[serde(default)]
    pub follows: Vec<FollowEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_defaults_from_sparse_json() {
        let track: Track = serde_json::from_str(r#"{"id": 7, "genre": "Jazz"}"#).unwrap();

        assert_eq!(track.id, 7);
        assert_eq!(track.genre.as_deref(), Some("Jazz"));
        assert_eq!(track.mood, None);
        assert_eq!(track.bpm, None);
        assert_eq!(track.average_rating, 0.0);
        assert!(track.artist_ids.is_empty());
    }

    #[test]
    fn test_is_by_any() {
        let track = Track {
            id: 1,
            title: "t".to_string(),
            genre: None,
            mood: None,
            bpm: None,
            average_rating: 0.0,
            like_count: 0,
            uploaded_at: 0,
            artist_ids: vec![3, 9],
        };

        assert!(track.is_by_any([1, 9].iter()));
        assert!(!track.is_by_any([1, 2].iter()));
        assert!(!track.is_by_any(std::iter::empty()));
    }

    #[test]
    fn test_dataset_uses_camel_case() {
        let json = r#"{
            "listens": [{"userId": 1, "trackId": 2, "listenCount": 4, "lastListenedAt": 10}],
            "follows": [{"followerId": 1, "followedId": 3}]
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();

        assert_eq!(dataset.listens[0].listen_count, 4);
        assert_eq!(dataset.follows[0].followed_id, 3);
        assert!(dataset.tracks.is_empty());
    }
}
