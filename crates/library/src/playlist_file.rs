use std::fs;
use std::path::Path;

use common::{Playlist, Song};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::LibraryError;

#[derive(Debug, Deserialize)]
struct PlaylistJson {
    #[serde(rename = "playlistTitle", default)]
    title: Option<String>,
    #[serde(rename = "playlistAuthor", default)]
    author: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    songs: Option<Vec<SongJson>>,
}

#[derive(Debug, Deserialize)]
struct SongJson {
    #[serde(default, deserialize_with = "deserialize_key")]
    key: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(rename = "songName", default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct PlaylistOut<'a> {
    #[serde(rename = "playlistTitle")]
    title: &'a str,
    #[serde(rename = "playlistAuthor")]
    author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(rename = "playlistSongCount", skip_serializing_if = "is_zero")]
    count: usize,
    songs: Vec<SongOut<'a>>,
}

#[derive(Serialize)]
struct SongOut<'a> {
    key: &'a str,
    hash: &'a str,
    #[serde(rename = "songName")]
    name: &'a str,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

fn deserialize_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(decode_key).unwrap_or_default())
}

/// Catalog keys show up as numbers in older playlists and as strings in
/// newer ones. Numbers are rendered without a fractional part.
pub fn decode_key(value: &Value) -> String {
    let raw = match value {
        Value::Number(number) => {
            if let Some(v) = number.as_u64() {
                v.to_string()
            } else if let Some(v) = number.as_i64() {
                v.to_string()
            } else {
                number
                    .as_f64()
                    .map(|v| format!("{:.0}", v))
                    .unwrap_or_default()
            }
        }
        Value::String(text) => text.clone(),
        _ => String::new(),
    };
    common::normalize_id(&raw)
}

pub fn read_playlist_file(path: &Path) -> Result<Playlist, LibraryError> {
    debug!("Reading playlist {:?}", path);
    let data = fs::read(path)?;
    let mut playlist = parse_playlist_bytes(&data).map_err(|source| LibraryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    playlist.file = path.to_string_lossy().to_string();
    Ok(playlist)
}

pub fn parse_playlist_bytes(data: &[u8]) -> Result<Playlist, serde_json::Error> {
    let parsed: PlaylistJson = serde_json::from_slice(data)?;
    let songs = parsed
        .songs
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            Song::with_identity(
                &entry.key,
                entry.hash.as_deref().unwrap_or(""),
                entry.name.unwrap_or_default(),
            )
        })
        .collect();
    Ok(Playlist {
        title: parsed.title.unwrap_or_default(),
        author: parsed.author.unwrap_or_default(),
        image: parsed.image.filter(|image| !image.is_empty()),
        file: String::new(),
        songs,
    })
}

/// Renders the playlist in the game's playlist file format.
pub fn serialize_playlist(playlist: &Playlist) -> Result<Vec<u8>, LibraryError> {
    let doc = PlaylistOut {
        title: &playlist.title,
        author: &playlist.author,
        image: playlist.image.as_deref().filter(|image| !image.is_empty()),
        count: playlist.songs.len(),
        songs: playlist
            .songs
            .iter()
            .map(|song| SongOut {
                key: &song.key,
                hash: &song.hash,
                name: &song.name,
            })
            .collect(),
    };

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    doc.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

/// Writes the playlist to `path`, keeping the previous file as `<path>.bak`.
pub fn save_playlist(playlist: &Playlist, path: &Path) -> Result<(), LibraryError> {
    let bytes = serialize_playlist(playlist)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.is_file() {
        let mut backup = path.as_os_str().to_os_string();
        backup.push(".bak");
        fs::copy(path, &backup)?;
    }
    fs::write(path, bytes)?;
    info!("Saved playlist {:?} ({} songs)", path, playlist.songs.len());
    Ok(())
}
