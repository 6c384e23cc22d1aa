mod config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::{Playlist, Song};
use library::{
    compute_missing, compute_orphans, delete_songs, is_playlist_file, merge_playlist,
    move_songs, read_playlist_file, read_playlists, save_playlist, scan_installed, suggest_local_match,
    CatalogScan, FileOpReport, LibraryError, PlaylistScan,
};
use remote::{
    download_missing, download_song, fetch_pp_playlist, fetch_song_info, fetch_stars_playlist,
};
use reqwest::Client;
use tracing::{info, warn};

use config::{config_path_from_env, load_or_create_config, GamePaths};

const PLAYLIST_AUTHOR: &str = "beatlist";

#[derive(Parser)]
#[command(name = "beatlist", version, about = "Keeps Beat Saber playlists and custom songs in sync")]
struct Cli {
    /// Config file; `BEATLIST_CONFIG` or `config.yaml` next to the executable
    /// when not given.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every playlist with its songs.
    Playlists {
        #[arg(long)]
        debug: bool,
    },
    /// Print the installed songs.
    Installed {
        #[arg(long)]
        debug: bool,
    },
    /// Installed songs that no playlist references.
    Orphans {
        /// Append the orphans to this playlist file.
        #[arg(long)]
        merge_into: Option<PathBuf>,
        /// Move orphaned song folders to the deleted songs folder.
        #[arg(long = "move", conflicts_with = "delete")]
        move_songs: bool,
        /// Delete orphaned song folders.
        #[arg(long)]
        delete: bool,
        /// Apply changes; without it only a dry run is printed.
        #[arg(long)]
        yes: bool,
    },
    /// Playlist songs that are not installed.
    Missing {
        #[arg(long)]
        download: bool,
    },
    /// Playlist of the ranked songs with the most stars.
    Stars {
        count: usize,
        #[arg(long)]
        name: Option<String>,
    },
    /// Playlist of the ranked songs worth the most PP.
    Pp {
        count: usize,
        #[arg(long)]
        name: Option<String>,
    },
    /// Look a song up by hash or key.
    Song { id: String },
    /// Download and verify a song by hash or key.
    Download { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config_path_from_env);
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let paths = config.game_paths();
    paths.ensure_dirs()?;
    let remote = config.remote();
    let client = Client::builder().user_agent(remote.user_agent.clone()).build()?;

    match cli.command {
        Command::Playlists { debug } => {
            let (_, playlists) = load_library(&paths).await?;
            for playlist in &playlists.playlists {
                print_playlist(playlist, debug);
            }
        }
        Command::Installed { debug } => {
            let (installed, _) = load_library(&paths).await?;
            print_playlist(&installed.catalog, debug);
            for failure in &installed.failures {
                println!("Skipped {:?}: {}", failure.path, failure.error);
            }
            for failure in &installed.unverified {
                println!("Unverified {:?}: {}", failure.path, failure.error);
            }
        }
        Command::Orphans {
            merge_into,
            move_songs: relocate,
            delete,
            yes,
        } => {
            let (installed, playlists) = load_library(&paths).await?;
            let orphans = compute_orphans(&installed.catalog, &playlists.playlists);
            print_playlist(&orphans, false);
            if orphans.is_empty() {
                return Ok(());
            }
            if let Some(target) = merge_into {
                merge_orphans(&orphans, &playlist_path(&paths, &target), yes)?;
            }
            if relocate {
                if yes {
                    let dest = paths.deleted.clone();
                    let report =
                        tokio::task::spawn_blocking(move || move_songs(&orphans, &dest))
                            .await?;
                    print_report("Moved", &report);
                } else {
                    println!("Would move {} songs to {:?}", orphans.len(), paths.deleted);
                }
            } else if delete {
                if yes {
                    let report = tokio::task::spawn_blocking(move || delete_songs(&orphans)).await?;
                    print_report("Deleted", &report);
                } else {
                    println!("Would delete {} songs", orphans.len());
                }
            }
        }
        Command::Missing { download } => {
            let (installed, playlists) = load_library(&paths).await?;
            let missing = compute_missing(&playlists.playlists);
            print_missing(&missing, &installed.catalog);
            if download && !missing.is_empty() {
                let all = missing
                    .values()
                    .fold(Playlist::new("Missing", Vec::new()), |acc, playlist| {
                        merge_playlist(&acc, playlist)
                    });
                let report = download_missing(&client, &remote, &all, &paths.songs).await;
                println!(
                    "Installed {} songs, {} failed",
                    report.installed.len(),
                    report.failures.len()
                );
                for (song, err) in &report.failures {
                    println!("  {}: {}", song.render_summary(), err);
                }
            }
        }
        Command::Stars { count, name } => {
            let playlist = fetch_stars_playlist(&client, &remote, count).await?;
            let title = name.unwrap_or_else(|| format!("Top {} Stars", count));
            write_generated(playlist, &title, &paths)?;
        }
        Command::Pp { count, name } => {
            let playlist = fetch_pp_playlist(&client, &remote, count).await?;
            let title = name.unwrap_or_else(|| format!("Top {} PP", count));
            write_generated(playlist, &title, &paths)?;
        }
        Command::Song { id } => {
            let song = fetch_song_info(&client, &remote, &song_from_id(&id)).await?;
            print!("{}", song.render_debug());
        }
        Command::Download { id } => {
            let song = download_song(&client, &remote, &song_from_id(&id), &paths.songs).await?;
            println!("Installed {} at {}", song.render_summary(), song.path);
        }
    }

    Ok(())
}

async fn load_library(
    paths: &GamePaths,
) -> Result<(CatalogScan, PlaylistScan), Box<dyn std::error::Error>> {
    let songs = paths.songs.clone();
    let playlists_dir = paths.playlists.clone();
    let (installed, playlists) = tokio::task::spawn_blocking(move || {
        let installed = scan_installed(&songs);
        let playlists = read_playlists(&playlists_dir, &installed.catalog)?;
        Ok::<_, LibraryError>((installed, playlists))
    })
    .await??;

    for failure in installed.failures.iter().chain(playlists.failures.iter()) {
        warn!("Skipped {:?}: {}", failure.path, failure.error);
    }
    info!(
        "{} installed songs, {} playlists",
        installed.catalog.len(),
        playlists.playlists.len()
    );
    Ok((installed, playlists))
}

fn print_playlist(playlist: &Playlist, debug: bool) {
    if debug {
        println!("{}", playlist.render_debug());
    } else {
        println!("{}", playlist.render_summary());
    }
}

fn print_missing(missing: &BTreeMap<String, Playlist>, catalog: &Playlist) {
    for playlist in missing.values() {
        println!("{}", playlist.render_summary());
        for song in &playlist.songs {
            if let Some(local) = suggest_local_match(catalog, song) {
                println!("  {} looks like installed {}", song.render_summary(), local.render_summary());
            }
        }
    }
}

fn print_report(action: &str, report: &FileOpReport) {
    println!("{} {} songs, {} failed", action, report.done.len(), report.failures.len());
    for failure in &report.failures {
        println!("  {:?}: {}", failure.path, failure.error);
    }
}

fn merge_orphans(orphans: &Playlist, target: &Path, apply: bool) -> Result<(), LibraryError> {
    let existing = if target.is_file() {
        read_playlist_file(target)?
    } else {
        let mut fresh = Playlist::new(file_title(target), Vec::new());
        fresh.author = PLAYLIST_AUTHOR.to_string();
        fresh
    };
    let merged = merge_playlist(&existing, orphans);
    let added = merged.len() - existing.len();
    if apply {
        save_playlist(&merged, target)?;
        println!("Added {} songs to {:?}", added, target);
    } else {
        println!("Would add {} songs to {:?}", added, target);
    }
    Ok(())
}

fn write_generated(mut playlist: Playlist, title: &str, paths: &GamePaths) -> Result<(), LibraryError> {
    playlist.title = title.to_string();
    playlist.author = PLAYLIST_AUTHOR.to_string();
    let path = playlist_path(paths, Path::new(title));
    save_playlist(&playlist, &path)?;
    println!("Wrote {} songs to {:?}", playlist.len(), path);
    Ok(())
}

/// Bare names land in the playlists folder; `.json` is appended unless the
/// name already carries a playlist extension.
fn playlist_path(paths: &GamePaths, target: &Path) -> PathBuf {
    let has_dir = target
        .parent()
        .map_or(false, |parent| !parent.as_os_str().is_empty());
    let path = if target.is_absolute() || has_dir {
        target.to_path_buf()
    } else {
        paths.playlists.join(target)
    };
    if is_playlist_file(&path) {
        return path;
    }
    let mut named = path.into_os_string();
    named.push(".json");
    PathBuf::from(named)
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 40 hex characters mean a content hash, anything else a catalog key.
fn song_from_id(id: &str) -> Song {
    let id = id.trim();
    if id.len() == 40 && id.chars().all(|ch| ch.is_ascii_hexdigit()) {
        Song::with_identity("", id, "")
    } else {
        Song::with_identity(id, "", "")
    }
}
