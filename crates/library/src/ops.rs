use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use common::{Playlist, Song};
use metadata::find_info;
use tracing::{info, warn};

use crate::{LibraryError, ScanFailure};

#[derive(Debug, Default)]
pub struct FileOpReport {
    pub done: Vec<Song>,
    pub failures: Vec<ScanFailure>,
}

/// Moves every installed song directory of `songs` into `dest`.
pub fn move_songs(songs: &Playlist, dest: &Path) -> FileOpReport {
    let mut report = FileOpReport::default();
    if let Err(err) = fs::create_dir_all(dest) {
        warn!("Cannot create {:?}: {}", dest, err);
        report.failures.push(ScanFailure {
            path: dest.to_path_buf(),
            error: err.into(),
        });
        return report;
    }
    for song in &songs.songs {
        match move_song(song, dest) {
            Ok(target) => {
                info!("Moved {} to {:?}", song.render_summary(), target);
                let mut moved = song.clone();
                moved.path = target.to_string_lossy().to_string();
                report.done.push(moved);
            }
            Err(err) => {
                warn!("Cannot move {}: {}", song.render_summary(), err);
                report.failures.push(ScanFailure {
                    path: PathBuf::from(&song.path),
                    error: err,
                });
            }
        }
    }
    report
}

/// Removes every installed song directory of `songs`.
pub fn delete_songs(songs: &Playlist) -> FileOpReport {
    let mut report = FileOpReport::default();
    for song in &songs.songs {
        match song_dir(song).and_then(|dir| fs::remove_dir_all(&dir).map_err(LibraryError::from)) {
            Ok(()) => {
                info!("Deleted {}", song.render_summary());
                let mut deleted = song.clone();
                deleted.path.clear();
                report.done.push(deleted);
            }
            Err(err) => {
                warn!("Cannot delete {}: {}", song.render_summary(), err);
                report.failures.push(ScanFailure {
                    path: PathBuf::from(&song.path),
                    error: err,
                });
            }
        }
    }
    report
}

fn move_song(song: &Song, dest: &Path) -> Result<PathBuf, LibraryError> {
    let dir = song_dir(song)?;
    let name = dir
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "song path has no name"))?;
    let target = dest.join(name);
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{:?} already exists", target),
        )
        .into());
    }
    fs::rename(&dir, &target)?;
    Ok(target)
}

// Only directories that still hold song metadata are touched.
fn song_dir(song: &Song) -> Result<PathBuf, LibraryError> {
    if song.path.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "song is not installed").into());
    }
    let dir = PathBuf::from(&song.path);
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{:?} is not a directory", dir),
        )
        .into());
    }
    find_info(&dir)?;
    Ok(dir)
}
