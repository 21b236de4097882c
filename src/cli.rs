//! # Command-Line Interface Module
//!
//! Defines the `cadenza` command line with Clap derive macros.
//!
//! ## Commands
//!
//! - `init-db`: Create the database schema
//! - `import`: Load a JSON dataset snapshot
//! - `profile`: Show what a listener's history says about their taste
//! - `mood`: Tracks in the mood of the latest listening session
//! - `discover`: Ranked unseen tracks, optionally saved as a playlist
//! - `smart`: Build and save a playlist from criteria
//! - `save`: Save an explicit track list as a discovery playlist
//! - `show-playlist`: Print a stored playlist
//!
//! ## Examples
//!
//! ```bash
//! cadenza import snapshot.json
//! cadenza discover --user 2 --save
//! cadenza smart --user 2 --genre Rock --mood happy --bpm-min 100 --bpm-max 140
//! ```

use crate::criteria::{BpmRange, SmartCriteria};
use crate::models::{PlaylistId, TrackId, UserId};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Shells with enhanced completion, which offers catalog genres and moods.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum EnhancedShell {
    Bash,
    Fish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "cadenza")]
#[command(about = "Cadenza: mood, discovery and smart playlists from a listener's own history")]
#[command(version)]
pub struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "CADENZA_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// JSON config file with tuning overrides
    #[arg(long, global = true, env = "CADENZA_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// The listener a command works for.
#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct UserArg {
    /// Id of the listener
    #[arg(short, long)]
    pub user: UserId,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    ///
    /// Fails if the database file already exists, unless --force is given.
    InitDb {
        /// Delete and recreate an existing database
        #[arg(long)]
        force: bool,
    },

    /// Load a dataset snapshot into the database
    ///
    /// The file is a JSON object with `users`, `tracks`, `ratings`, `listens`
    /// and `follows` arrays. Existing rows with the same keys are replaced.
    /// The whole file is imported in one transaction.
    Import {
        /// Path to the JSON snapshot
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Show a listener's preference profile
    Profile {
        #[command(flatten)]
        user: UserArg,
    },

    /// Tracks matching the mood of the latest listening session
    Mood {
        #[command(flatten)]
        user: UserArg,
    },

    /// Unheard tracks ranked against the listener's taste
    Discover {
        #[command(flatten)]
        user: UserArg,

        /// Save the result as a playlist
        #[arg(long)]
        save: bool,

        /// Playlist name when saving (defaults to "Discovery Mix <date>")
        #[arg(long, requires = "save")]
        name: Option<String>,
    },

    /// Build and save a playlist from criteria
    ///
    /// Bpm range and minimum rating must all hold. Genres, moods and
    /// followed artists are alternatives: matching any one of them is enough.
    Smart {
        #[command(flatten)]
        user: UserArg,

        /// Playlist name (defaults to "Smart Playlist <date>")
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    /// Save an explicit list of tracks as a discovery playlist
    Save {
        #[command(flatten)]
        user: UserArg,

        /// Playlist name (defaults to "Discovery Mix <date>")
        #[arg(long)]
        name: Option<String>,

        /// Track ids, in playlist order
        #[arg(required = true)]
        track_ids: Vec<TrackId>,
    },

    /// Print a stored playlist and its tracks
    ShowPlaylist {
        /// Playlist id
        id: PlaylistId,
    },

    /// Generate shell completions
    ///
    /// Usage: cadenza completion bash > ~/.local/share/bash-completion/completions/cadenza
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate shell completions that also complete catalog genres and moods
    ///
    /// Usage: cadenza completion-enhanced fish > ~/.config/fish/completions/cadenza.fish
    CompletionEnhanced {
        /// Shell to generate completions for
        shell: EnhancedShell,
    },

    /// List catalog genres for completion (hidden command)
    #[command(hide = true)]
    CompleteGenres,

    /// List catalog moods for completion (hidden command)
    #[command(hide = true)]
    CompleteMoods,
}

/// Smart playlist criteria as command-line flags.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CriteriaArgs {
    /// Accept tracks of this genre (repeatable)
    #[arg(long = "genre", value_name = "GENRE")]
    pub genres: Vec<String>,

    /// Accept tracks with this mood (repeatable)
    #[arg(long = "mood", value_name = "MOOD")]
    pub moods: Vec<String>,

    /// Lowest bpm, inclusive
    #[arg(long, requires = "bpm_max")]
    pub bpm_min: Option<u32>,

    /// Highest bpm, inclusive
    #[arg(long, requires = "bpm_min")]
    pub bpm_max: Option<u32>,

    /// Lowest average rating (0 to 5)
    #[arg(long)]
    pub min_rating: Option<f64>,

    /// Leave out tracks already played more than a couple of times
    #[arg(long)]
    pub exclude_heard: bool,

    /// Also accept tracks by artists the listener follows
    #[arg(long)]
    pub followed: bool,

    /// Most tracks to include
    #[arg(long)]
    pub max_tracks: Option<usize>,
}

impl From<CriteriaArgs> for SmartCriteria {
    fn from(args: CriteriaArgs) -> Self {
        let bpm_range = match (args.bpm_min, args.bpm_max) {
            (Some(min), Some(max)) => Some(BpmRange { min, max }),
            _ => None,
        };
        Self {
            genres: args.genres,
            moods: args.moods,
            bpm_range,
            min_rating: args.min_rating,
            exclude_heard: args.exclude_heard,
            include_followed_artists: args.followed,
            max_tracks: args.max_tracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_smart_flags_become_criteria() {
        let args = Args::try_parse_from([
            "cadenza", "smart", "--user", "2", "--genre", "Rock", "--genre", "Pop", "--mood", "happy",
            "--bpm-min", "100", "--bpm-max", "140", "--exclude-heard",
        ])
        .unwrap();

        let Command::Smart { user, name, criteria } = args.command else {
            panic!("expected smart command");
        };
        assert_eq!(user.user, 2);
        assert_eq!(name, None);

        let criteria = SmartCriteria::from(criteria);
        assert_eq!(criteria.genres, vec!["Rock", "Pop"]);
        assert_eq!(criteria.moods, vec!["happy"]);
        assert_eq!(criteria.bpm_range, Some(BpmRange { min: 100, max: 140 }));
        assert!(criteria.exclude_heard);
        assert!(!criteria.include_followed_artists);
    }

    #[test]
    fn test_half_bpm_range_is_rejected() {
        let result = Args::try_parse_from(["cadenza", "smart", "--user", "2", "--bpm-min", "100"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_requires_track_ids() {
        assert!(Args::try_parse_from(["cadenza", "save", "--user", "2"]).is_err());

        let args = Args::try_parse_from(["cadenza", "--json", "save", "--user", "2", "3", "1"]).unwrap();
        assert!(args.json);
        match args.command {
            Command::Save { track_ids, .. } => assert_eq!(track_ids, vec![3, 1]),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
