//! # Configuration Module
//!
//! Data directory setup and runtime configuration for Cadenza.
//!
//! ## Data Storage
//!
//! Cadenza stores its database in the platform-standard data directory:
//! - Linux: `~/.local/share/cadenza/`
//! - macOS: `~/Library/Application Support/cadenza/`
//! - Windows: `%APPDATA%\cadenza\`
//!
//! ## Config File
//!
//! An optional JSON file at `<config dir>/cadenza/config.json` overrides the
//! database location, the busy timeout and any recommendation tuning value.
//! Every field is optional:
//!
//! ```json
//! { "busyTimeoutMs": 2000,
//!   "tuning": { "sessionSize": 5, "scoring": { "followedArtistBonus": 10.0 } } }
//! ```

use crate::algorithm::ScoringContext;
use crate::discovery::DiscoveryLimits;
use crate::profile::ProfileWeights;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "cadenza";
const DB_FILE: &str = "cadenza.db";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-appropriate data directory for Cadenza.
///
/// The directory is not created here; [`crate::db::init_database`] and
/// `import` create it when they first write the database.
///
/// # Errors
///
/// Fails when the system data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;
    Ok(data_dir.join(APP_DIR))
}

/// Returns the platform-appropriate database file path.
///
/// ```no_run
/// use cadenza::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Where the optional config file is looked up. The file may not exist.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory"))?;
    Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Every threshold and limit of the recommendation operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tuning {
    /// Distinct tracks read for the mood session.
    pub session_size: usize,
    /// Recent listening records fetched to find them.
    pub session_pool: usize,
    pub mood_playlist_limit: usize,
    pub known_listen_threshold: u32,
    /// Smart playlists with `exclude_heard` drop tracks played more than this.
    pub heard_listen_threshold: u32,
    pub top_n: usize,
    pub high_rating_threshold: f64,
    pub candidate_pool: usize,
    pub discovery_limit: usize,
    pub smart_default_max_tracks: usize,
    pub profile: ProfileWeights,
    /// Also sets the retrieval bpm window, so a track that can earn tempo
    /// points is always retrieved by tempo.
    pub scoring: ScoringContext,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            session_size: 3,
            session_pool: 20,
            mood_playlist_limit: 15,
            known_listen_threshold: 3,
            heard_listen_threshold: 2,
            top_n: 3,
            high_rating_threshold: 4.0,
            candidate_pool: 25,
            discovery_limit: 20,
            smart_default_max_tracks: 50,
            profile: ProfileWeights::default(),
            scoring: ScoringContext::default(),
        }
    }
}

impl Tuning {
    /// Rejects sizes and limits that would make an operation return nothing.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("sessionSize", self.session_size),
            ("sessionPool", self.session_pool),
            ("moodPlaylistLimit", self.mood_playlist_limit),
            ("topN", self.top_n),
            ("candidatePool", self.candidate_pool),
            ("discoveryLimit", self.discovery_limit),
            ("smartDefaultMaxTracks", self.smart_default_max_tracks),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            bail!("tuning.{name} must be at least 1");
        }
        if self.session_pool < self.session_size {
            bail!(
                "tuning.sessionPool ({}) must not be smaller than tuning.sessionSize ({})",
                self.session_pool,
                self.session_size
            );
        }
        Ok(())
    }

    pub fn discovery_limits(&self) -> DiscoveryLimits {
        DiscoveryLimits {
            known_listen_threshold: self.known_listen_threshold,
            top_n: self.top_n,
            bpm_window: self.scoring.bpm_window,
            high_rating_threshold: self.high_rating_threshold,
            candidate_pool: self.candidate_pool,
            result_limit: self.discovery_limit,
        }
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub tuning: Tuning,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: get_db_path().unwrap_or_else(|_| PathBuf::from(DB_FILE)),
            busy_timeout_ms: 5000,
            tuning: Tuning::default(),
        }
    }
}

impl RuntimeConfig {
    /// Loads the configuration.
    ///
    /// With an explicit `config_path` the file must exist. Otherwise the
    /// default location is tried and a missing file means defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                let path = get_config_path()?;
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parses a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config
            .tuning
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replaces the database path, keeping everything else.
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_db_path_returns_valid_path() {
        let path = get_db_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "cadenza.db");

        let parent = path.parent().expect("Database path should have parent");
        assert_eq!(parent.file_name().unwrap(), "cadenza");
    }

    #[test]
    fn test_get_db_path_consistent_results() {
        let path1 = get_db_path().expect("First call should succeed");
        let path2 = get_db_path().expect("Second call should succeed");
        assert_eq!(path1, path2);
    }

    #[test]
    fn test_config_path_structure() {
        let path = get_config_path().unwrap();
        assert!(path.ends_with("cadenza/config.json"));
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"dbPath": "/tmp/other.db", "tuning": {"sessionSize": 5, "scoring": {"followedArtistBonus": 10.0}}}"#,
        )
        .unwrap();

        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.tuning.session_size, 5);
        assert_eq!(config.tuning.session_pool, 20);
        assert_eq!(config.tuning.scoring.followed_artist_bonus, 10.0);
        assert_eq!(config.tuning.scoring.genre_multiplier, 3.0);
        assert_eq!(config.tuning.profile, ProfileWeights::default());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(RuntimeConfig::load(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = RuntimeConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid config file"));
    }

    #[test]
    fn test_discovery_limits_follow_tuning() {
        let tuning = Tuning {
            candidate_pool: 40,
            discovery_limit: 10,
            ..Tuning::default()
        };
        let limits = tuning.discovery_limits();
        assert_eq!(limits.candidate_pool, 40);
        assert_eq!(limits.result_limit, 10);
        assert_eq!(limits.known_listen_threshold, 3);
    }

    #[test]
    fn test_retrieval_window_follows_scoring_window() {
        let mut tuning = Tuning::default();
        assert_eq!(tuning.discovery_limits().bpm_window, tuning.scoring.bpm_window);

        tuning.scoring.bpm_window = 35;
        assert_eq!(tuning.discovery_limits().bpm_window, 35);
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        for tuning in [r#"{"sessionSize": 0}"#, r#"{"discoveryLimit": 0}"#, r#"{"candidatePool": 0}"#] {
            fs::write(&path, format!(r#"{{"tuning": {tuning}}}"#)).unwrap();
            let err = RuntimeConfig::load(Some(&path)).unwrap_err();
            assert!(format!("{err:#}").contains("must be at least 1"), "{tuning}: {err:#}");
        }

        fs::write(&path, r#"{"tuning": {"sessionSize": 30}}"#).unwrap();
        assert!(RuntimeConfig::load(Some(&path)).is_err());

        assert!(Tuning::default().validate().is_ok());
    }
}
