mod merge;
mod ops;
mod playlist_file;
mod reconcile;

use std::fs;
use std::path::{Path, PathBuf};

use common::{Playlist, INSTALLED_TITLE};
use metadata::{is_info_file, read_song, MetadataError};
use tracing::{info, warn};
use walkdir::WalkDir;

pub use merge::{merge_playlist, merge_song};
pub use ops::{delete_songs, move_songs, FileOpReport};
pub use playlist_file::{
    decode_key, parse_playlist_bytes, read_playlist_file, save_playlist, serialize_playlist,
};
pub use reconcile::{
    annotate_installed, compute_missing, compute_orphans, find_installed_path, playlist_contains,
    song_credit_matches, suggest_local_match,
};

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Json(serde_json::Error),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Parse { path, source } => {
                write!(f, "cannot parse {:?}: {}", path, source)
            }
            LibraryError::Json(err) => write!(f, "json error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LibraryError::Io(err) => Some(err),
            LibraryError::Metadata(err) => Some(err),
            LibraryError::Parse { source, .. } => Some(source),
            LibraryError::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Json(err)
    }
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: LibraryError,
}

#[derive(Debug)]
pub struct CatalogScan {
    pub catalog: Playlist,
    pub failures: Vec<ScanFailure>,
    pub unverified: Vec<ScanFailure>,
}

#[derive(Debug)]
pub struct PlaylistScan {
    pub playlists: Vec<Playlist>,
    pub failures: Vec<ScanFailure>,
}

/// Walks `songs_root` and builds the installed catalog.
pub fn scan_installed(songs_root: &Path) -> CatalogScan {
    let info_files = collect_info_files(songs_root);
    info!("Found {} song metadata files", info_files.len());
    build_catalog(&info_files)
}

/// Builds the installed catalog from already enumerated metadata files.
/// Unreadable or malformed entries are skipped and reported.
pub fn build_catalog(info_files: &[PathBuf]) -> CatalogScan {
    let mut songs = Vec::with_capacity(info_files.len());
    let mut failures = Vec::new();
    let mut unverified = Vec::new();

    for path in info_files {
        match read_song(path) {
            Ok(local) => {
                if let Some(err) = local.hash_error {
                    unverified.push(ScanFailure {
                        path: path.clone(),
                        error: err.into(),
                    });
                }
                songs.push(local.song);
            }
            Err(err) => {
                warn!("Cannot create song from {:?}: {}", path, err);
                failures.push(ScanFailure {
                    path: path.clone(),
                    error: err.into(),
                });
            }
        }
    }

    CatalogScan {
        catalog: Playlist::new(INSTALLED_TITLE, songs),
        failures,
        unverified,
    }
}

pub fn collect_info_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Error walking {:?}: {}", root, err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_info_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    files
}

/// Reads every playlist file in `dir` and annotates it against `catalog`.
/// A bad file is reported in `failures` and the scan continues.
pub fn read_playlists(dir: &Path, catalog: &Playlist) -> Result<PlaylistScan, LibraryError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut playlists = Vec::new();
    let mut failures = Vec::new();
    for path in paths {
        if !is_playlist_file(&path) {
            if !has_extension(&path, "bak") {
                info!("{:?} is not a valid playlist, skipping", path);
            }
            continue;
        }
        match read_playlist_file(&path) {
            Ok(playlist) => playlists.push(annotate_installed(&playlist, catalog)),
            Err(err) => {
                warn!("Failed to read playlist {:?}: {}", path, err);
                failures.push(ScanFailure { path, error: err });
            }
        }
    }

    Ok(PlaylistScan {
        playlists,
        failures,
    })
}

pub fn is_playlist_file(path: &Path) -> bool {
    has_extension(path, "json") || has_extension(path, "bplist")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|value| value.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
