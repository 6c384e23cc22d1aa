use common::{Playlist, Song};

use crate::reconcile::playlist_contains;

/// Field by field: `primary` wins when its value is non-empty (non-zero for
/// numbers), otherwise `secondary` fills the gap.
pub fn merge_song(primary: &Song, secondary: &Song) -> Song {
    Song {
        path: pick_text(&primary.path, &secondary.path),
        key: pick_text(&primary.key, &secondary.key),
        hash: pick_text(&primary.hash, &secondary.hash),
        name: pick_text(&primary.name, &secondary.name),
        author: pick_text(&primary.author, &secondary.author),
        mapper: pick_text(&primary.mapper, &secondary.mapper),
        pp: pick_number(primary.pp, secondary.pp),
        stars: pick_number(primary.stars, secondary.stars),
        maps: if primary.maps.is_empty() {
            secondary.maps.clone()
        } else {
            primary.maps.clone()
        },
        url: pick_text(&primary.url, &secondary.url),
    }
}

/// Primary's metadata and songs, then the songs only `secondary` has.
pub fn merge_playlist(primary: &Playlist, secondary: &Playlist) -> Playlist {
    let mut songs = primary.songs.clone();
    for song in &secondary.songs {
        if !playlist_contains(primary, song) {
            songs.push(song.clone());
        }
    }
    primary.with_songs(songs)
}

fn pick_text(primary: &str, secondary: &str) -> String {
    if primary.is_empty() {
        secondary.to_string()
    } else {
        primary.to_string()
    }
}

fn pick_number(primary: f64, secondary: f64) -> f64 {
    if primary == 0.0 {
        secondary
    } else {
        primary
    }
}
