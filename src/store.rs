use crate::filter::TrackQuery;
use crate::models::{
    ListenedTrack, NewPlaylist, Playlist, PlaylistId, PlaylistTrack, RatedTrack, Track, TrackId, UserId,
};
use anyhow::Result;

/// Read access to one user's ratings, listening statistics and follows.
pub trait HistoryStore: Send + Sync {
    /// Returns every rating the user made, likes and dislikes, joined with the track.
    fn rated_tracks(&self, user_id: UserId) -> Result<Vec<RatedTrack>>;

    /// Returns every listening record of the user, joined with the track.
    fn listened_tracks(&self, user_id: UserId) -> Result<Vec<ListenedTrack>>;

    /// Returns the user's listening records, most recently listened first
    /// (ties by track id ascending), at most `limit` of them.
    fn recent_listens(&self, user_id: UserId, limit: usize) -> Result<Vec<ListenedTrack>>;

    /// Returns the ids of the users this user follows, ascending.
    fn followed_artists(&self, user_id: UserId) -> Result<Vec<UserId>>;
}

/// Read access to the global track catalog.
pub trait CatalogStore: Send + Sync {
    /// Evaluates `query` against the catalog.
    fn query_tracks(&self, query: &TrackQuery) -> Result<Vec<Track>>;

    /// Distinct non-null genres in the catalog, sorted.
    fn catalog_genres(&self) -> Result<Vec<String>>;

    /// Distinct non-null moods in the catalog, sorted.
    fn catalog_moods(&self) -> Result<Vec<String>>;
}

pub trait PlaylistStore: Send + Sync {
    /// Creates the playlist and one row per track id, positions starting at 1.
    /// Either every row is written or none is.
    fn create_playlist(&self, playlist: &NewPlaylist, track_ids: &[TrackId]) -> Result<Playlist>;

    /// Returns the playlist, or `None` if it does not exist.
    fn playlist(&self, playlist_id: PlaylistId) -> Result<Option<Playlist>>;

    /// Returns the playlist's rows ordered by position.
    fn playlist_tracks(&self, playlist_id: PlaylistId) -> Result<Vec<PlaylistTrack>>;
}

/// Everything the recommendation engine needs from persistence.
pub trait RecommendationStore: HistoryStore + CatalogStore + PlaylistStore {}

impl<T: HistoryStore + CatalogStore + PlaylistStore> RecommendationStore for T {}
