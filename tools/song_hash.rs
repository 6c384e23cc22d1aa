use std::env;
use std::path::PathBuf;

use metadata::{find_info, read_song};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dirs: Vec<PathBuf> = match env::args().skip(1).map(PathBuf::from).collect::<Vec<_>>() {
        dirs if !dirs.is_empty() => dirs,
        _ => vec![env::var("SONG_DIR")
            .map(PathBuf::from)
            .map_err(|_| "SONG_DIR not set and no path argument")?],
    };

    for dir in dirs {
        let local = read_song(&find_info(&dir)?)?;
        match local.hash_error {
            Some(err) => println!("{}\t{:?}\tunverified: {}", local.song.name, dir, err),
            None => println!("{}\t{}\t{:?}", local.song.hash, local.song.name, dir),
        }
    }

    Ok(())
}
