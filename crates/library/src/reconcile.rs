use std::collections::BTreeMap;

use common::{Playlist, Song, ORPHANS_TITLE};

use crate::merge::merge_playlist;

pub fn playlist_contains(playlist: &Playlist, song: &Song) -> bool {
    playlist.songs.iter().any(|member| member.same_song(song))
}

/// Path of the first installed copy of `song`, skipping catalog entries that
/// have no path or no identity.
pub fn find_installed_path(catalog: &Playlist, song: &Song) -> Option<String> {
    catalog
        .songs
        .iter()
        .filter(|entry| entry.is_installed() && entry.has_identity())
        .find(|entry| entry.same_song(song))
        .map(|entry| entry.path.clone())
}

pub fn annotate_installed(playlist: &Playlist, catalog: &Playlist) -> Playlist {
    let songs = playlist
        .songs
        .iter()
        .map(|song| {
            let mut annotated = song.clone();
            annotated.path = find_installed_path(catalog, song).unwrap_or_default();
            annotated
        })
        .collect();
    playlist.with_songs(songs)
}

/// Installed songs that no playlist references.
pub fn compute_orphans(catalog: &Playlist, playlists: &[Playlist]) -> Playlist {
    let orphans = catalog
        .songs
        .iter()
        .filter(|song| {
            !playlists
                .iter()
                .any(|playlist| playlist_contains(playlist, song))
        })
        .cloned()
        .collect();
    Playlist::new(ORPHANS_TITLE, orphans)
}

/// Songs without an installed copy, grouped per playlist title. Playlists
/// sharing a title are folded into one entry, first playlist's metadata wins.
pub fn compute_missing(playlists: &[Playlist]) -> BTreeMap<String, Playlist> {
    let mut out: BTreeMap<String, Playlist> = BTreeMap::new();
    for playlist in playlists {
        let missing: Vec<Song> = playlist
            .songs
            .iter()
            .filter(|song| !song.is_installed())
            .cloned()
            .collect();
        if missing.is_empty() {
            continue;
        }
        let missing = playlist.with_songs(missing);
        match out.remove(&playlist.title) {
            Some(existing) => {
                out.insert(playlist.title.clone(), merge_playlist(&existing, &missing));
            }
            None => {
                out.insert(playlist.title.clone(), missing);
            }
        }
    }
    out
}

/// Name plus author-or-mapper match between two songs. Only a hint for
/// display; identity always goes through hash or key.
pub fn song_credit_matches(a: &Song, b: &Song) -> bool {
    if !same_text(&a.name, &b.name) {
        return false;
    }
    same_text(&a.author, &b.author) || same_text(&a.mapper, &b.mapper)
}

/// Installed song that looks like `song` by name and credits.
pub fn suggest_local_match<'a>(catalog: &'a Playlist, song: &Song) -> Option<&'a Song> {
    catalog
        .songs
        .iter()
        .find(|entry| song_credit_matches(entry, song))
}

fn same_text(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use common::{Playlist, Song};

    use super::{
        annotate_installed, compute_missing, compute_orphans, find_installed_path,
        playlist_contains, song_credit_matches, suggest_local_match,
    };

    fn installed(key: &str, hash: &str, name: &str, path: &str) -> Song {
        let mut song = Song::with_identity(key, hash, name);
        song.path = path.to_string();
        song
    }

    fn catalog() -> Playlist {
        Playlist::new(
            "Installed Songs",
            vec![
                installed("", "aaa", "Alpha", "/songs/alpha"),
                installed("b1", "bbb", "Beta", "/songs/beta"),
                installed("", "ccc", "Gamma", "/songs/gamma"),
                installed("", "", "Unknown", "/songs/unknown"),
            ],
        )
    }

    #[test]
    fn contains_by_hash_or_key() {
        let playlist = Playlist::new(
            "p",
            vec![Song::with_identity("", "AAA", "x"), Song::with_identity("b1", "", "y")],
        );
        assert!(playlist_contains(&playlist, &Song::with_identity("", "aaa", "")));
        assert!(playlist_contains(&playlist, &Song::with_identity("B1", "zzz", "")));
        assert!(!playlist_contains(&playlist, &Song::with_identity("", "", "x")));
    }

    #[test]
    fn finds_installed_path() {
        let catalog = catalog();
        assert_eq!(
            find_installed_path(&catalog, &Song::with_identity("b1", "", "")),
            Some("/songs/beta".to_string())
        );
        assert_eq!(find_installed_path(&catalog, &Song::with_identity("", "", "Unknown")), None);
        assert_eq!(find_installed_path(&catalog, &Song::with_identity("", "nope", "")), None);
    }

    #[test]
    fn skips_entries_without_path() {
        let catalog = Playlist::new(
            "Installed Songs",
            vec![
                installed("", "aaa", "Stale", ""),
                installed("", "aaa", "Real", "/songs/real"),
            ],
        );
        assert_eq!(
            find_installed_path(&catalog, &Song::with_identity("", "aaa", "")),
            Some("/songs/real".to_string())
        );
    }

    #[test]
    fn annotation_does_not_touch_input() {
        let catalog = catalog();
        let mut stale = Song::with_identity("", "zzz", "Zeta");
        stale.path = "/old/zeta".to_string();
        let mut playlist = Playlist::new("p", vec![Song::with_identity("", "ccc", "Gamma"), stale]);
        playlist.author = "me".to_string();
        playlist.file = "/lists/p.json".to_string();

        let annotated = annotate_installed(&playlist, &catalog);
        assert_eq!(annotated.songs[0].path, "/songs/gamma");
        assert_eq!(annotated.songs[1].path, "");
        assert_eq!(annotated.author, "me");
        assert_eq!(annotated.file, "/lists/p.json");
        assert_eq!(playlist.songs[0].path, "");
        assert_eq!(playlist.songs[1].path, "/old/zeta");
    }

    #[test]
    fn orphans_are_songs_in_no_playlist() {
        let catalog = catalog();
        let playlists = vec![
            Playlist::new("one", vec![Song::with_identity("", "aaa", "Alpha")]),
            Playlist::new("two", vec![Song::with_identity("B1", "", "Beta"), Song::with_identity("", "aaa", "Alpha")]),
        ];
        let orphans = compute_orphans(&catalog, &playlists);
        assert_eq!(orphans.title, "Orphans");
        let names: Vec<&str> = orphans.songs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Unknown"]);

        let all = compute_orphans(&catalog, &[]);
        assert_eq!(all.len(), catalog.len());
    }

    #[test]
    fn missing_omits_complete_playlists() {
        let catalog = catalog();
        let complete = annotate_installed(
            &Playlist::new("complete", vec![Song::with_identity("", "aaa", "Alpha")]),
            &catalog,
        );
        let mut partial = Playlist::new(
            "partial",
            vec![Song::with_identity("", "bbb", "Beta"), Song::with_identity("", "zzz", "Zeta")],
        );
        partial.author = "someone".to_string();
        partial.image = Some("data:x".to_string());
        partial.file = "/lists/partial.json".to_string();
        let partial = annotate_installed(&partial, &catalog);

        let missing = compute_missing(&[complete, partial]);
        assert_eq!(missing.len(), 1);
        let entry = &missing["partial"];
        assert_eq!(entry.songs.len(), 1);
        assert_eq!(entry.songs[0].hash, "zzz");
        assert_eq!(entry.author, "someone");
        assert_eq!(entry.image.as_deref(), Some("data:x"));
        assert_eq!(entry.file, "/lists/partial.json");
    }

    #[test]
    fn missing_folds_duplicate_titles() {
        let first = Playlist::new("dup", vec![Song::with_identity("", "x1", "X")]);
        let second = Playlist::new(
            "dup",
            vec![Song::with_identity("", "x1", "X"), Song::with_identity("", "y1", "Y")],
        );
        let missing = compute_missing(&[first, second]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["dup"].songs.len(), 2);
    }

    #[test]
    fn credit_match_uses_author_or_mapper() {
        let mut local = Song::with_identity("", "aaa", "Ghost");
        local.author = "Camellia".to_string();
        local.mapper = "Someone".to_string();

        let mut by_author = Song::with_identity("", "", " ghost ");
        by_author.author = "camellia".to_string();
        assert!(song_credit_matches(&local, &by_author));

        let mut by_mapper = Song::with_identity("", "", "Ghost");
        by_mapper.mapper = "someone".to_string();
        assert!(song_credit_matches(&local, &by_mapper));

        let name_only = Song::with_identity("", "", "Ghost");
        assert!(!song_credit_matches(&local, &name_only));

        let catalog = Playlist::new("Installed Songs", vec![local.clone()]);
        assert_eq!(suggest_local_match(&catalog, &by_author).map(|s| s.hash.as_str()), Some("aaa"));
        assert!(suggest_local_match(&catalog, &name_only).is_none());
    }
}
