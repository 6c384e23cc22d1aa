use std::fs;
use std::path::{Path, PathBuf};

use common::{Beatmap, Song};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const INFO_FILE_NAME: &str = "info.dat";

#[derive(Debug)]
pub enum MetadataError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
}

impl MetadataError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        MetadataError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn parse(path: &Path, message: impl Into<String>) -> Self {
        MetadataError::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io { path, source } => write!(f, "io error at {:?}: {}", path, source),
            MetadataError::Parse { path, message } => {
                write!(f, "parse error in {:?}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io { source, .. } => Some(source),
            MetadataError::Parse { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(rename = "_songName", default)]
    song_name: Option<String>,
    #[serde(rename = "_songAuthorName", default)]
    song_author: String,
    #[serde(rename = "_levelAuthorName", default)]
    mapper: String,
    #[serde(rename = "_difficultyBeatmapSets", default)]
    beatmap_sets: Vec<BeatmapSetJson>,
}

#[derive(Debug, Deserialize)]
struct BeatmapSetJson {
    #[serde(rename = "_beatmapCharacteristicName", default)]
    kind: String,
    #[serde(rename = "_difficultyBeatmaps", default)]
    maps: Vec<BeatmapJson>,
}

#[derive(Debug, Deserialize)]
struct BeatmapJson {
    #[serde(rename = "_difficulty", default)]
    difficulty: String,
    #[serde(rename = "_beatmapFilename", default)]
    file: String,
}

/// A song read from disk. `hash_error` is set when the content hash could not
/// be computed; the song is then unverified (empty hash).
#[derive(Debug)]
pub struct LocalSong {
    pub song: Song,
    pub hash_error: Option<MetadataError>,
}

impl LocalSong {
    pub fn is_verified(&self) -> bool {
        self.hash_error.is_none() && self.song.is_verified()
    }
}

pub fn read_song(info_path: &Path) -> Result<LocalSong, MetadataError> {
    debug!("Reading song metadata {:?}", info_path);
    let data = fs::read(info_path).map_err(|err| MetadataError::io(info_path, err))?;
    let mut song = parse_info(info_path, &data)?;
    song.path = info_path
        .parent()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_default();

    let map_files: Vec<PathBuf> = song
        .maps
        .iter()
        .map(|map| Path::new(&song.path).join(&map.file))
        .collect();
    let hash_error = match compute_hash(info_path, &map_files) {
        Ok(hash) => {
            song.hash = hash;
            None
        }
        Err(err) => {
            warn!("{} hash failed: {}", song.name, err);
            Some(err)
        }
    };

    Ok(LocalSong { song, hash_error })
}

fn parse_info(info_path: &Path, data: &[u8]) -> Result<Song, MetadataError> {
    let info: InfoJson = serde_json::from_slice(data)
        .map_err(|err| MetadataError::parse(info_path, err.to_string()))?;
    let name = info
        .song_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| MetadataError::parse(info_path, "missing _songName"))?;

    let mut maps = Vec::new();
    for set in info.beatmap_sets {
        for map in set.maps {
            maps.push(Beatmap {
                difficulty: map.difficulty,
                kind: set.kind.clone(),
                file: map.file,
            });
        }
    }

    Ok(Song {
        name,
        author: info.song_author,
        mapper: info.mapper,
        maps,
        ..Song::default()
    })
}

/// SHA-1 over the metadata file followed by every map file, in the given
/// order, rendered as lowercase hex.
pub fn compute_hash(metadata_path: &Path, map_files: &[PathBuf]) -> Result<String, MetadataError> {
    let mut hasher = Sha1::new();
    let info = fs::read(metadata_path).map_err(|err| MetadataError::io(metadata_path, err))?;
    hasher.update(&info);
    for file in map_files {
        let bytes = fs::read(file).map_err(|err| MetadataError::io(file, err))?;
        hasher.update(&bytes);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Recomputes the hash of an installed song from its directory and map list.
pub fn hash_song(song: &Song) -> Result<String, MetadataError> {
    let dir = Path::new(&song.path);
    let info_path = find_info(dir)?;
    let map_files: Vec<PathBuf> = song.maps.iter().map(|map| dir.join(&map.file)).collect();
    compute_hash(&info_path, &map_files)
}

/// Case-insensitive lookup of the metadata file inside a song directory.
pub fn find_info(dir: &Path) -> Result<PathBuf, MetadataError> {
    let mut found: Option<(usize, PathBuf)> = None;
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk error"));
            MetadataError::Io { path, source }
        })?;
        if !entry.file_type().is_file() || !is_info_file(entry.path()) {
            continue;
        }
        let depth = entry.depth();
        if found.as_ref().map(|(d, _)| depth < *d).unwrap_or(true) {
            found = Some((depth, entry.into_path()));
        }
    }
    found.map(|(_, path)| path).ok_or_else(|| {
        MetadataError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "info.dat not found"),
        )
    })
}

pub fn is_info_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(INFO_FILE_NAME))
        .unwrap_or(false)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use sha1::{Digest, Sha1};

    use super::{compute_hash, find_info, hash_song, read_song, MetadataError};

    const INFO: &str = r#"{
        "_songName": "Night Raid",
        "_songAuthorName": "Kobaryo",
        "_levelAuthorName": "Hexagonial",
        "_difficultyBeatmapSets": [
            {
                "_beatmapCharacteristicName": "Standard",
                "_difficultyBeatmaps": [
                    { "_difficulty": "Hard", "_beatmapFilename": "Hard.dat" },
                    { "_difficulty": "Expert", "_beatmapFilename": "Expert.dat" }
                ]
            },
            {
                "_beatmapCharacteristicName": "Lightshow",
                "_difficultyBeatmaps": [
                    { "_difficulty": "Easy", "_beatmapFilename": "Lightshow.dat" }
                ]
            }
        ]
    }"#;

    fn write_song(dir: &Path) -> PathBuf {
        let info = dir.join("info.dat");
        fs::write(&info, INFO).unwrap();
        fs::write(dir.join("Hard.dat"), b"hard-notes").unwrap();
        fs::write(dir.join("Expert.dat"), b"expert-notes").unwrap();
        fs::write(dir.join("Lightshow.dat"), b"lights").unwrap();
        info
    }

    fn sha1_hex(data: &[u8]) -> String {
        Sha1::digest(data)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    #[test]
    fn reads_song_in_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_song(dir.path());
        let local = read_song(&info).unwrap();
        assert!(local.is_verified());
        let song = local.song;
        assert_eq!(song.name, "Night Raid");
        assert_eq!(song.author, "Kobaryo");
        assert_eq!(song.mapper, "Hexagonial");
        assert_eq!(song.path, dir.path().to_string_lossy());
        let files: Vec<&str> = song.maps.iter().map(|m| m.file.as_str()).collect();
        assert_eq!(files, vec!["Hard.dat", "Expert.dat", "Lightshow.dat"]);
        assert_eq!(song.maps[2].kind, "Lightshow");

        let mut expected = INFO.as_bytes().to_vec();
        expected.extend_from_slice(b"hard-notes");
        expected.extend_from_slice(b"expert-notes");
        expected.extend_from_slice(b"lights");
        assert_eq!(song.hash, sha1_hex(&expected));
    }

    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_song(dir.path());
        let maps = vec![dir.path().join("Hard.dat"), dir.path().join("Expert.dat")];
        let first = compute_hash(&info, &maps).unwrap();
        let second = compute_hash(&info, &maps).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
        assert_eq!(first, first.to_lowercase());

        fs::write(dir.path().join("Expert.dat"), b"expert-noteS").unwrap();
        assert_ne!(first, compute_hash(&info, &maps).unwrap());
    }

    #[test]
    fn hash_order_follows_map_list() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_song(dir.path());
        let forward = vec![dir.path().join("Hard.dat"), dir.path().join("Expert.dat")];
        let reverse = vec![dir.path().join("Expert.dat"), dir.path().join("Hard.dat")];
        assert_ne!(
            compute_hash(&info, &forward).unwrap(),
            compute_hash(&info, &reverse).unwrap()
        );
    }

    #[test]
    fn missing_map_file_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_song(dir.path());
        fs::remove_file(dir.path().join("Expert.dat")).unwrap();

        let err = compute_hash(&info, &[dir.path().join("Expert.dat")]).unwrap_err();
        assert!(matches!(err, MetadataError::Io { .. }));

        let local = read_song(&info).unwrap();
        assert!(!local.is_verified());
        assert!(local.song.hash.is_empty());
        assert!(local.hash_error.is_some());
        assert_eq!(local.song.name, "Night Raid");
    }

    #[test]
    fn missing_song_name_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let info = dir.path().join("info.dat");
        fs::write(&info, r#"{"_songAuthorName": "x"}"#).unwrap();
        assert!(matches!(read_song(&info), Err(MetadataError::Parse { .. })));

        fs::write(&info, "{ not json").unwrap();
        assert!(matches!(read_song(&info), Err(MetadataError::Parse { .. })));
    }

    #[test]
    fn finds_info_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Info.DAT"), INFO).unwrap();
        let found = find_info(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "Info.DAT");

        let empty = tempfile::tempdir().unwrap();
        assert!(find_info(empty.path()).is_err());
    }

    #[test]
    fn rehashing_an_installed_song_matches() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_song(dir.path());
        let song = read_song(&info).unwrap().song;
        assert_eq!(hash_song(&song).unwrap(), song.hash);
    }
}
