use serde::{Deserialize, Serialize};

pub const INSTALLED_TITLE: &str = "Installed Songs";
pub const ORPHANS_TITLE: &str = "Orphans";

// Characters NTFS refuses in file names, plus newline.
const INVALID_DIR_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\n'];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub difficulty: String,
    pub kind: String,
    pub file: String,
}

impl Beatmap {
    pub fn new(kind: impl Into<String>, difficulty: impl Into<String>) -> Self {
        Self {
            difficulty: difficulty.into(),
            kind: kind.into(),
            file: String::new(),
        }
    }

    pub fn render_debug(&self) -> String {
        if self.file.is_empty() {
            format!("{}, {}", self.kind, self.difficulty)
        } else {
            format!("{}, {} ({})", self.kind, self.difficulty, self.file)
        }
    }
}

/// A single playable chart.
///
/// `hash` and `key` are always stored lowercase; use [`Song::with_identity`]
/// or [`Song::set_hash`] / [`Song::set_key`] so the normalization happens once
/// at construction. Equality goes through [`Song::same_song`], never names.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Song {
    pub path: String,
    pub key: String,
    pub hash: String,
    pub name: String,
    pub author: String,
    pub mapper: String,
    pub pp: f64,
    pub stars: f64,
    pub maps: Vec<Beatmap>,
    pub url: String,
}

impl Song {
    pub fn with_identity(key: &str, hash: &str, name: impl Into<String>) -> Self {
        Self {
            key: normalize_id(key),
            hash: normalize_id(hash),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_hash(&mut self, hash: &str) {
        self.hash = normalize_id(hash);
    }

    pub fn set_key(&mut self, key: &str) {
        self.key = normalize_id(key);
    }

    pub fn has_identity(&self) -> bool {
        !self.hash.is_empty() || !self.key.is_empty()
    }

    pub fn is_installed(&self) -> bool {
        !self.path.is_empty()
    }

    /// A song is verified once its content hash has been computed or declared.
    pub fn is_verified(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn same_song(&self, other: &Song) -> bool {
        if !self.hash.is_empty() && self.hash == other.hash {
            return true;
        }
        !self.key.is_empty() && self.key == other.key
    }

    pub fn render_summary(&self) -> String {
        let mut out = if self.name.is_empty() {
            "MISSING".to_string()
        } else {
            self.name.clone()
        };
        if !self.key.is_empty() {
            out.push_str(&format!(" [{}]", self.key));
        } else if !self.hash.is_empty() {
            out.push_str(&format!(" [{}]", self.hash));
        }
        out
    }

    pub fn render_debug(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Path: {}, URL: {}\n", self.path, self.url));
        out.push_str(&format!(
            "Name: {}, Author: {}, Mapper: {}\n",
            self.name, self.author, self.mapper
        ));
        out.push_str(&format!(
            "Key: {}, Hash: {}, PP: {:.2}, Stars: {:.2}\n",
            self.key, self.hash, self.pp, self.stars
        ));
        out.push_str("Beatmaps:");
        for map in &self.maps {
            out.push_str(&format!(" [{}]", map.render_debug()));
        }
        out.push('\n');
        out
    }

    pub fn dir_name(&self) -> String {
        let credit = if !self.author.is_empty() {
            self.author.as_str()
        } else {
            self.mapper.as_str()
        };
        let mut out = if self.key.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({}", self.key, self.name)
        };
        if !credit.is_empty() {
            out.push_str(" - ");
            out.push_str(credit);
        }
        if !self.key.is_empty() {
            out.push(')');
        }
        let cleaned: String = out
            .chars()
            .filter(|ch| !INVALID_DIR_CHARS.contains(ch))
            .collect();
        cleaned.trim_end_matches(' ').to_string()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    pub author: String,
    pub image: Option<String>,
    pub file: String,
    pub songs: Vec<Song>,
}

impl Playlist {
    pub fn new(title: impl Into<String>, songs: Vec<Song>) -> Self {
        Self {
            title: title.into(),
            songs,
            ..Self::default()
        }
    }

    /// Copy of the playlist metadata with another song list.
    pub fn with_songs(&self, songs: Vec<Song>) -> Self {
        Self {
            title: self.title.clone(),
            author: self.author.clone(),
            image: self.image.clone(),
            file: self.file.clone(),
            songs,
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn sort_by_pp(&mut self) {
        self.songs
            .sort_by(|a, b| b.pp.partial_cmp(&a.pp).unwrap_or(std::cmp::Ordering::Equal));
    }

    pub fn truncate(&mut self, limit: usize) {
        self.songs.truncate(limit);
    }

    pub fn render_summary(&self) -> String {
        let mut out = format!("{}\n--- {} SONGS ---\n", self.title, self.songs.len());
        for song in &self.songs {
            out.push_str(&song.render_summary());
            out.push('\n');
        }
        out
    }

    pub fn render_debug(&self) -> String {
        let mut out = format!(
            "Title: {}, Author: {}\nFile: {}\n--- {} SONGS ---\n",
            self.title,
            self.author,
            self.file,
            self.songs.len()
        );
        for song in &self.songs {
            out.push_str(&song.render_debug());
        }
        out
    }
}

pub fn normalize_id(value: &str) -> String {
    value.trim().to_lowercase()
}
