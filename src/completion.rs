//! # Shell Completion Module
//!
//! Static completion scripts come from clap's completion system. The
//! enhanced bash and fish scripts add dynamic genre and mood values for
//! `smart --genre` / `--mood`: they call the hidden `complete-genres` /
//! `complete-moods` commands, which read them from the catalog.
//!
//! ```bash
//! cadenza completion zsh > ~/.config/zsh/completions/_cadenza
//! cadenza completion-enhanced bash > ~/.local/share/bash-completion/completions/cadenza
//! cadenza completion-enhanced fish > ~/.config/fish/completions/cadenza.fish
//! ```

use crate::cli::{EnhancedShell, Shell};
use crate::db::SqliteStore;
use crate::store::CatalogStore;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use log::debug;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Generate the static clap script for `shell` followed by hooks that
/// complete `--genre` and `--mood` from the catalog.
pub fn generate_enhanced_completions(
    shell: EnhancedShell,
    cmd: &mut Command,
    out: &mut dyn Write,
) -> Result<()> {
    let name = cmd.get_name().to_string();
    match shell {
        EnhancedShell::Bash => {
            generate_completions(CompletionShell::Bash, cmd, out);
            write_bash_catalog_hook(&name, out)
        }
        EnhancedShell::Fish => {
            generate_completions(CompletionShell::Fish, cmd, out);
            write_fish_catalog_hook(&name, out)
        }
    }
}

fn write_bash_catalog_hook(name: &str, out: &mut dyn Write) -> Result<()> {
    write!(
        out,
        r#"
# Catalog values for --genre and --mood
_{name}_catalog() {{
    local cur="${{COMP_WORDS[COMP_CWORD]}}"
    local prev="${{COMP_WORDS[COMP_CWORD-1]}}"
    case "${{prev}}" in
        --genre)
            COMPREPLY=($(compgen -W "$({name} complete-genres 2>/dev/null)" -- "${{cur}}"))
            return 0
            ;;
        --mood)
            COMPREPLY=($(compgen -W "$({name} complete-moods 2>/dev/null)" -- "${{cur}}"))
            return 0
            ;;
    esac
    _{name} "$@"
}}
complete -F _{name}_catalog -o bashdefault -o default {name}
"#
    )?;
    Ok(())
}

fn write_fish_catalog_hook(name: &str, out: &mut dyn Write) -> Result<()> {
    write!(
        out,
        r#"
# Catalog values for --genre and --mood
complete -c {name} -n '__fish_seen_subcommand_from smart' -l genre -f -a '({name} complete-genres 2>/dev/null)'
complete -c {name} -n '__fish_seen_subcommand_from smart' -l mood -f -a '({name} complete-moods 2>/dev/null)'
"#
    )?;
    Ok(())
}

/// Which catalog tag to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Genre,
    Mood,
}

/// Distinct catalog values of `kind`.
///
/// A missing or unreadable database yields no completions rather than an
/// error, so a broken database never breaks the shell.
pub fn get_tag_completions(db_path: &Path, kind: TagKind) -> Vec<String> {
    if !db_path.exists() {
        return Vec::new();
    }
    let tags = SqliteStore::open(db_path, Duration::from_millis(500)).and_then(|store| match kind {
        TagKind::Genre => store.catalog_genres(),
        TagKind::Mood => store.catalog_moods(),
    });
    match tags {
        Ok(tags) => tags,
        Err(err) => {
            debug!("No {kind:?} completions: {err:#}");
            Vec::new()
        }
    }
}

/// Writes one completion per line, quoting values that contain whitespace.
pub fn write_completions(completions: &[String], out: &mut dyn Write) -> Result<()> {
    for completion in completions {
        if completion.contains(char::is_whitespace) {
            writeln!(out, "\"{}\"", completion.replace('"', "\\\""))?;
        } else {
            writeln!(out, "{completion}")?;
        }
    }
    Ok(())
}

/// Prints the catalog values of `kind` to stdout.
pub fn print_tag_completions(db_path: &Path, kind: TagKind) -> Result<()> {
    let completions = get_tag_completions(db_path, kind);
    write_completions(&completions, &mut io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use crate::models::{Dataset, Track};
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(shell_to_completion_shell(Shell::Bash), CompletionShell::Bash);
        assert_eq!(shell_to_completion_shell(Shell::Zsh), CompletionShell::Zsh);
        assert_eq!(shell_to_completion_shell(Shell::PowerShell), CompletionShell::PowerShell);
    }

    #[test]
    fn test_bash_script_mentions_commands() {
        let mut out = Vec::new();
        generate_completions(CompletionShell::Bash, &mut Args::command(), &mut out);
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("cadenza"));
        assert!(script.contains("discover"));
        assert!(script.contains("--exclude-heard"));
    }

    #[test]
    fn test_enhanced_scripts_call_catalog_commands() {
        for shell in [EnhancedShell::Bash, EnhancedShell::Fish] {
            let mut out = Vec::new();
            generate_enhanced_completions(shell, &mut Args::command(), &mut out).unwrap();
            let script = String::from_utf8(out).unwrap();

            assert!(script.contains("--exclude-heard"), "{shell:?} keeps the static script");
            assert!(script.contains("cadenza complete-genres"), "{shell:?} completes genres");
            assert!(script.contains("cadenza complete-moods"), "{shell:?} completes moods");
        }
    }

    #[test]
    fn test_enhanced_bash_wraps_static_function() {
        let mut out = Vec::new();
        generate_enhanced_completions(EnhancedShell::Bash, &mut Args::command(), &mut out).unwrap();
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("_cadenza \"$@\""));
        assert!(script.trim_end().ends_with("complete -F _cadenza_catalog -o bashdefault -o default cadenza"));
    }

    #[test]
    fn test_missing_database_gives_no_completions() {
        let dir = TempDir::new().unwrap();
        assert!(get_tag_completions(&dir.path().join("missing.db"), TagKind::Genre).is_empty());
    }

    #[test]
    fn test_tags_from_catalog() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("cadenza.db");
        let store = SqliteStore::open(&db_path, Duration::from_secs(1)).unwrap();
        let track = |id, genre: &str, mood: Option<&str>| Track {
            id,
            title: String::new(),
            genre: Some(genre.to_string()),
            mood: mood.map(str::to_string),
            bpm: None,
            average_rating: 0.0,
            like_count: 0,
            uploaded_at: 0,
            artist_ids: vec![],
        };
        store
            .import_dataset(&Dataset {
                tracks: vec![
                    track(1, "Rock", Some("happy")),
                    track(2, "Hip Hop", None),
                    track(3, "Rock", Some("calm")),
                ],
                ..Dataset::default()
            })
            .unwrap();

        assert_eq!(get_tag_completions(&db_path, TagKind::Genre), vec!["Hip Hop", "Rock"]);
        assert_eq!(get_tag_completions(&db_path, TagKind::Mood), vec!["calm", "happy"]);

        let mut out = Vec::new();
        write_completions(&get_tag_completions(&db_path, TagKind::Genre), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\"Hip Hop\"\nRock\n");
    }
}
