use std::collections::{BTreeMap, HashSet};
use std::fmt;

use common::{Beatmap, Playlist, Song};
use library::decode_key;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const BEATSAVER_TITLE: &str = "BeatSaver Response";
pub const SCORESABER_TITLE: &str = "ScoreSaber Response";
pub const SONGBROWSER_TITLE: &str = "SongBrowser Response";

#[derive(Deserialize)]
struct BeatSaverSong {
    #[serde(default, deserialize_with = "or_default")]
    metadata: BeatSaverMeta,
    #[serde(default, deserialize_with = "key_value")]
    key: String,
    #[serde(default, deserialize_with = "or_default")]
    hash: String,
    #[serde(rename = "downloadURL", default, deserialize_with = "or_default")]
    url: String,
}

#[derive(Deserialize, Default)]
struct BeatSaverMeta {
    #[serde(rename = "songName", default, deserialize_with = "or_default")]
    name: String,
    #[serde(rename = "songAuthorName", default, deserialize_with = "or_default")]
    author: String,
    #[serde(rename = "levelAuthorName", default, deserialize_with = "or_default")]
    mapper: String,
    #[serde(default, deserialize_with = "or_default")]
    characteristics: Vec<BeatSaverCharacteristic>,
}

#[derive(Deserialize)]
struct BeatSaverCharacteristic {
    #[serde(default, deserialize_with = "or_default")]
    name: String,
    #[serde(default, deserialize_with = "declared_difficulties")]
    difficulties: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BeatSaverPayload {
    Many(Vec<BeatSaverSong>),
    Docs { docs: Vec<BeatSaverSong> },
    One(BeatSaverSong),
}

#[derive(Deserialize)]
struct ScoreSaberResponse {
    #[serde(default, deserialize_with = "or_default")]
    songs: Vec<ScoreSaberSong>,
}

#[derive(Deserialize)]
struct ScoreSaberSong {
    #[serde(default, deserialize_with = "or_default")]
    id: String,
    #[serde(default, deserialize_with = "or_default")]
    name: String,
    #[serde(rename = "songAuthorName", default, deserialize_with = "or_default")]
    author: String,
    #[serde(rename = "levelAuthorName", default, deserialize_with = "or_default")]
    mapper: String,
    #[serde(default)]
    stars: Value,
}

#[derive(Deserialize)]
struct SongBrowserSong {
    #[serde(default, deserialize_with = "or_default")]
    diffs: Vec<SongBrowserDiff>,
    #[serde(default, deserialize_with = "key_value")]
    key: String,
    #[serde(default, deserialize_with = "or_default")]
    mapper: String,
    #[serde(rename = "song", default, deserialize_with = "or_default")]
    name: String,
}

#[derive(Deserialize)]
struct SongBrowserDiff {
    #[serde(default)]
    pp: Value,
    #[serde(default)]
    star: Value,
    #[serde(default, deserialize_with = "or_default")]
    diff: String,
}

/// `null` reads like a missing field.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn key_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(decode_key).unwrap_or_default())
}

// Difficulty labels with a non-null entry, in the order the response lists them.
fn declared_difficulties<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DifficultyVisitor;

    impl<'de> Visitor<'de> for DifficultyVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of difficulty labels")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut labels = Vec::new();
            while let Some((label, value)) = map.next_entry::<String, Value>()? {
                if !value.is_null() {
                    labels.push(label);
                }
            }
            Ok(labels)
        }
    }

    deserializer.deserialize_any(DifficultyVisitor)
}

/// Numbers arrive either as JSON numbers or as strings; anything unparsable
/// counts as zero.
fn lenient_number(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl BeatSaverSong {
    fn into_song(self) -> Song {
        let mut maps = Vec::new();
        for characteristic in &self.metadata.characteristics {
            for label in &characteristic.difficulties {
                maps.push(Beatmap::new(characteristic.name.clone(), label.clone()));
            }
        }
        let mut song = Song::with_identity(&self.key, &self.hash, self.metadata.name);
        song.author = self.metadata.author;
        song.mapper = self.metadata.mapper;
        song.url = self.url;
        song.maps = maps;
        song
    }
}

pub fn parse_beatsaver_song(data: &[u8]) -> Result<Song, serde_json::Error> {
    let parsed: BeatSaverSong = serde_json::from_slice(data)?;
    Ok(parsed.into_song())
}

/// Accepts a single map object, a bare array, or a `docs` page.
pub fn parse_beatsaver_response(data: &[u8]) -> Result<Playlist, serde_json::Error> {
    let parsed: BeatSaverPayload = serde_json::from_slice(data)?;
    let entries = match parsed {
        BeatSaverPayload::Many(entries) => entries,
        BeatSaverPayload::Docs { docs } => docs,
        BeatSaverPayload::One(entry) => vec![entry],
    };
    let songs = entries.into_iter().map(BeatSaverSong::into_song).collect();
    Ok(Playlist::new(BEATSAVER_TITLE, songs))
}

pub fn parse_scoresaber_response(data: &[u8]) -> Result<Playlist, serde_json::Error> {
    let parsed: ScoreSaberResponse = serde_json::from_slice(data)?;
    let mut seen = HashSet::new();
    let mut songs = Vec::new();
    for entry in parsed.songs {
        let id = common::normalize_id(&entry.id);
        if !seen.insert(id.clone()) {
            continue;
        }
        let mut song = Song::with_identity("", &id, entry.name);
        song.author = entry.author;
        song.mapper = entry.mapper;
        song.stars = lenient_number(&entry.stars);
        songs.push(song);
    }
    Ok(Playlist::new(SCORESABER_TITLE, songs))
}

/// Entries come out in ascending hash order; PP playlists re-sort afterwards.
pub fn parse_songbrowser_response(data: &[u8]) -> Result<Playlist, serde_json::Error> {
    let parsed: BTreeMap<String, SongBrowserSong> = serde_json::from_slice(data)?;
    let mut songs = Vec::with_capacity(parsed.len());
    for (hash, entry) in parsed {
        let (pp, stars) = entry
            .diffs
            .first()
            .map(|diff| (lenient_number(&diff.pp), lenient_number(&diff.star)))
            .unwrap_or((0.0, 0.0));
        let mut song = Song::with_identity(&entry.key, &hash, entry.name);
        song.mapper = entry.mapper;
        song.pp = pp;
        song.stars = stars;
        song.maps = entry
            .diffs
            .iter()
            .map(|diff| Beatmap::new("Standard", diff.diff.clone()))
            .collect();
        songs.push(song);
    }
    Ok(Playlist::new(SONGBROWSER_TITLE, songs))
}
