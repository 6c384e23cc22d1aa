mod archive;
mod parse;

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use common::{Playlist, Song};
use library::merge_song;
use metadata::{find_info, read_song, MetadataError};
use reqwest::Client;
use tracing::{debug, info, warn};

pub use archive::extract_archive;
pub use parse::{
    parse_beatsaver_response, parse_beatsaver_song, parse_scoresaber_response,
    parse_songbrowser_response, BEATSAVER_TITLE, SCORESABER_TITLE, SONGBROWSER_TITLE,
};

#[derive(Debug)]
pub enum RemoteError {
    Http(reqwest::Error),
    Status { url: String, status: u16 },
    Parse(serde_json::Error),
    MissingIdentity(String),
    MissingDownload(String),
    HashMismatch { expected: String, actual: String },
    EmptyResponse(String),
    Archive(zip::result::ZipError),
    Io(std::io::Error),
    Metadata(MetadataError),
    Join(tokio::task::JoinError),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Http(err) => write!(f, "http error: {}", err),
            RemoteError::Status { url, status } => write!(f, "http {} from {}", status, url),
            RemoteError::Parse(err) => write!(f, "cannot parse response: {}", err),
            RemoteError::MissingIdentity(song) => write!(f, "{} has neither hash nor key", song),
            RemoteError::MissingDownload(song) => write!(f, "{} has no download url", song),
            RemoteError::HashMismatch { expected, actual } => {
                write!(f, "hash mismatch: expected {} got {}", expected, actual)
            }
            RemoteError::EmptyResponse(url) => write!(f, "no songs in response from {}", url),
            RemoteError::Archive(err) => write!(f, "archive error: {}", err),
            RemoteError::Io(err) => write!(f, "io error: {}", err),
            RemoteError::Metadata(err) => write!(f, "metadata error: {}", err),
            RemoteError::Join(err) => write!(f, "task failed: {}", err),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Http(err) => Some(err),
            RemoteError::Parse(err) => Some(err),
            RemoteError::Archive(err) => Some(err),
            RemoteError::Io(err) => Some(err),
            RemoteError::Metadata(err) => Some(err),
            RemoteError::Join(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Parse(err)
    }
}

impl From<zip::result::ZipError> for RemoteError {
    fn from(err: zip::result::ZipError) -> Self {
        RemoteError::Archive(err)
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Io(err)
    }
}

impl From<MetadataError> for RemoteError {
    fn from(err: MetadataError) -> Self {
        RemoteError::Metadata(err)
    }
}

impl From<tokio::task::JoinError> for RemoteError {
    fn from(err: tokio::task::JoinError) -> Self {
        RemoteError::Join(err)
    }
}

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub beatsaver_url: String,
    pub scoresaber_url: String,
    pub songbrowser_ranked_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn by_hash_url(&self, hash: &str) -> String {
        format!("{}/api/maps/by-hash/{}", trim_base(&self.beatsaver_url), hash)
    }

    pub fn detail_url(&self, key: &str) -> String {
        format!("{}/api/maps/detail/{}", trim_base(&self.beatsaver_url), key)
    }

    /// Download urls from the catalog are usually relative to its base.
    pub fn archive_url(&self, download: &str) -> String {
        if download.starts_with("http://") || download.starts_with("https://") {
            download.to_string()
        } else {
            format!("{}{}", trim_base(&self.beatsaver_url), download)
        }
    }

    pub fn leaderboard_url(&self, limit: usize) -> String {
        format!(
            "{}/api.php?function=get-leaderboards&cat=3&limit={}&page=1&ranked=1",
            trim_base(&self.scoresaber_url),
            limit
        )
    }
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

async fn get_bytes(client: &Client, config: &RemoteConfig, url: &str) -> Result<Bytes, RemoteError> {
    debug!("GET {}", url);
    let mut request = client.get(url).timeout(config.timeout);
    if !config.user_agent.trim().is_empty() {
        request = request.header("User-Agent", config.user_agent.trim());
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.bytes().await?)
}

/// Looks the song up in the catalog, by hash when it has one, else by key.
pub async fn fetch_song_info(
    client: &Client,
    config: &RemoteConfig,
    song: &Song,
) -> Result<Song, RemoteError> {
    let url = if !song.hash.is_empty() {
        config.by_hash_url(&song.hash)
    } else if !song.key.is_empty() {
        config.detail_url(&song.key)
    } else {
        return Err(RemoteError::MissingIdentity(song.render_summary()));
    };
    let data = get_bytes(client, config, &url).await?;
    Ok(parse_beatsaver_song(&data)?)
}

pub async fn fetch_song_archive(
    client: &Client,
    config: &RemoteConfig,
    song: &Song,
) -> Result<Bytes, RemoteError> {
    if song.url.is_empty() {
        return Err(RemoteError::MissingDownload(song.render_summary()));
    }
    let bytes = get_bytes(client, config, &config.archive_url(&song.url)).await?;
    info!("Fetched {} ({} bytes)", song.render_summary(), bytes.len());
    Ok(bytes)
}

/// Ranked songs from the leaderboard, hash taken from each entry id.
pub async fn fetch_stars_playlist(
    client: &Client,
    config: &RemoteConfig,
    limit: usize,
) -> Result<Playlist, RemoteError> {
    let url = config.leaderboard_url(limit);
    let data = get_bytes(client, config, &url).await?;
    let playlist = parse_scoresaber_response(&data)?;
    if playlist.is_empty() {
        return Err(RemoteError::EmptyResponse(url));
    }
    Ok(playlist)
}

/// The `limit` ranked songs with the highest PP, best first.
pub async fn fetch_pp_playlist(
    client: &Client,
    config: &RemoteConfig,
    limit: usize,
) -> Result<Playlist, RemoteError> {
    let data = get_bytes(client, config, &config.songbrowser_ranked_url).await?;
    let playlist = parse_songbrowser_response(&data)?;
    Ok(top_by_pp(playlist, limit))
}

fn top_by_pp(mut playlist: Playlist, limit: usize) -> Playlist {
    playlist.sort_by_pp();
    playlist.truncate(limit);
    playlist
}

/// Downloads and installs `song` under `songs_root`, then checks the
/// installed files against the hash the catalog declares.
pub async fn download_song(
    client: &Client,
    config: &RemoteConfig,
    song: &Song,
    songs_root: &Path,
) -> Result<Song, RemoteError> {
    let remote = if song.url.is_empty() {
        let mut fetched = fetch_song_info(client, config, song).await?;
        if fetched.hash.is_empty() {
            fetched.hash = song.hash.clone();
        }
        fetched
    } else {
        song.clone()
    };

    let dest = songs_root.join(remote.dir_name());
    let archive = if dest.exists() {
        debug!("{:?} already present, skipping download", dest);
        None
    } else {
        Some(fetch_song_archive(client, config, &remote).await?)
    };

    tokio::task::spawn_blocking(move || install_song(archive.as_deref(), &dest, &remote)).await?
}

/// Extracts `archive` into `dest` when given, reads the installed song and
/// merges it with `remote`. A directory created by this call is removed
/// again when extraction, reading or the hash check fails.
pub fn install_song(archive: Option<&[u8]>, dest: &Path, remote: &Song) -> Result<Song, RemoteError> {
    let fresh = archive.is_some() && !dest.exists();
    let result = match archive {
        Some(bytes) => extract_archive(bytes, dest).and_then(|_| read_installed(dest, remote)),
        None => read_installed(dest, remote),
    };
    if let Err(err) = &result {
        if fresh && dest.exists() {
            warn!("Removing {:?}: {}", dest, err);
            if let Err(cleanup) = std::fs::remove_dir_all(dest) {
                warn!("Cannot remove {:?}: {}", dest, cleanup);
            }
        }
    }
    result
}

fn read_installed(dest: &Path, remote: &Song) -> Result<Song, RemoteError> {
    let local = read_song(&find_info(dest)?)?;
    if let Some(err) = local.hash_error {
        return Err(err.into());
    }
    if remote.hash.is_empty() {
        warn!("{} has no declared hash to check against", remote.render_summary());
    } else if local.song.hash != remote.hash {
        return Err(RemoteError::HashMismatch {
            expected: remote.hash.clone(),
            actual: local.song.hash,
        });
    }
    Ok(merge_song(&local.song, remote))
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub installed: Vec<Song>,
    pub failures: Vec<(Song, RemoteError)>,
}

/// Downloads every song of `missing`, one after the other.
pub async fn download_missing(
    client: &Client,
    config: &RemoteConfig,
    missing: &Playlist,
    songs_root: &Path,
) -> DownloadReport {
    let mut report = DownloadReport::default();
    for song in &missing.songs {
        match download_song(client, config, song, songs_root).await {
            Ok(installed) => {
                info!("Installed {}", installed.render_summary());
                report.installed.push(installed);
            }
            Err(err) => {
                warn!("Download of {} failed: {}", song.render_summary(), err);
                report.failures.push((song.clone(), err));
            }
        }
    }
    report
}
