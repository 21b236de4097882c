//! Music recommendations from a listener's own history.
//!
//! Cadenza reads one user's ratings, listening statistics and follows, and
//! turns them into three kinds of playlist:
//!
//! - a **mood playlist** following the affect of the latest listening session,
//! - a **discovery playlist** of unseen tracks scored against a learned
//!   preference profile,
//! - a **smart playlist** built from declarative criteria.
//!
//! Everything is deterministic, rule-based scoring over a single user's data.
//!
//! ## Modules
//!
//! - [`models`] - Records read from and written to the store
//! - [`filter`] - Composable catalog filters
//! - [`store`] - Collaborator traits; [`db`] implements them over SQLite
//! - [`profile`] - Preference profile builder
//! - [`mood`] - Mood session analyzer
//! - [`algorithm`] / [`discovery`] - Discovery scoring and candidate retrieval
//! - [`criteria`] - Smart playlist criteria
//! - [`playlist`] - Playlist materializer
//! - [`engine`] - The operations, wired together
//!
//! ### Supporting Modules
//!
//! - [`config`] - Data directory, config file and tuning
//! - [`error`] - Error taxonomy
//! - [`cli`] / [`completion`] - Command-line interface and shell completion
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use cadenza::config::RuntimeConfig;
//! use cadenza::db::SqliteStore;
//! use cadenza::engine::{Recommendation, Recommender};
//!
//! let config = RuntimeConfig::load(None)?;
//! let store = SqliteStore::open(&config.db_path, config.busy_timeout())?;
//! let engine = Recommender::new(&store, config.tuning);
//!
//! match engine.mood_playlist(2)? {
//!     Recommendation::Ready(playlist) => println!("{} tracks", playlist.tracks.len()),
//!     Recommendation::Unavailable(reason) => println!("Not yet: {reason}"),
//! }
//!
//! let discovery = engine.discovery_playlist(2)?;
//! if !discovery.is_empty() {
//!     engine.save_discovery_playlist(2, None, &discovery.track_ids())?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithm;
pub mod cli;
pub mod completion;
pub mod config;
pub mod criteria;
pub mod db;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod filter;
pub mod models;
pub mod mood;
pub mod playlist;
pub mod profile;
pub mod store;
