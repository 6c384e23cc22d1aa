use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_VERSION: u32 = 1;
pub const GAME_EXECUTABLE: &str = "Beat Saber.exe";

const DEFAULT_GAME_PATH: &str = r"C:\Program Files (x86)\Steam\steamapps\common\Beat Saber";
const DEFAULT_BEATSAVER_URL: &str = "https://beatsaver.com";
const DEFAULT_SCORESABER_URL: &str = "https://scoresaber.com";
const DEFAULT_SONGBROWSER_RANKED_URL: &str = "https://cdn.wes.cloud/beatstar/bssb/v2-ranked.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatlistConfig {
    pub version: u32,
    pub game_path: String,
    pub playlists_dir: String,
    pub songs_dir: String,
    pub deleted_dir: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub beatsaver_url: String,
    pub scoresaber_url: String,
    pub songbrowser_ranked_url: String,
}

impl Default for BeatlistConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            game_path: DEFAULT_GAME_PATH.to_string(),
            playlists_dir: "Playlists".to_string(),
            songs_dir: "Beat Saber_Data/CustomLevels".to_string(),
            deleted_dir: "DeletedSongs".to_string(),
            user_agent: default_user_agent(),
            timeout_secs: 30,
            beatsaver_url: DEFAULT_BEATSAVER_URL.to_string(),
            scoresaber_url: DEFAULT_SCORESABER_URL.to_string(),
            songbrowser_ranked_url: DEFAULT_SONGBROWSER_RANKED_URL.to_string(),
        }
    }
}

fn default_user_agent() -> String {
    format!("beatlist/{}", env!("CARGO_PKG_VERSION"))
}

impl BeatlistConfig {
    pub fn remote(&self) -> RemoteConfig {
        RemoteConfig {
            beatsaver_url: self.beatsaver_url.clone(),
            scoresaber_url: self.scoresaber_url.clone(),
            songbrowser_ranked_url: self.songbrowser_ranked_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn game_paths(&self) -> GamePaths {
        let game = PathBuf::from(native_path(&self.game_path, cfg!(target_os = "linux")));
        GamePaths {
            playlists: resolve_dir(&game, &self.playlists_dir),
            songs: resolve_dir(&game, &self.songs_dir),
            deleted: resolve_dir(&game, &self.deleted_dir),
            game,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GamePaths {
    pub game: PathBuf,
    pub playlists: PathBuf,
    pub songs: PathBuf,
    pub deleted: PathBuf,
}

impl GamePaths {
    pub fn ensure_dirs(&self) -> io::Result<()> {
        if !self.game.join(GAME_EXECUTABLE).is_file() {
            warn!("{} not found in {:?}", GAME_EXECUTABLE, self.game);
        }
        for (label, dir) in [
            ("Playlists", &self.playlists),
            ("Custom songs", &self.songs),
            ("Deleted songs", &self.deleted),
        ] {
            if !dir.is_dir() {
                fs::create_dir_all(dir)?;
                info!("{} folder {:?} created", label, dir);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("BEATLIST_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(BeatlistConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: BeatlistConfig = serde_yaml::from_str(&contents)?;
        let defaults = BeatlistConfig::default();
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.game_path.trim().is_empty() {
            config.game_path = defaults.game_path;
        }
        if config.user_agent.trim().is_empty() {
            config.user_agent = defaults.user_agent;
        }
        if config.timeout_secs == 0 {
            config.timeout_secs = defaults.timeout_secs;
        }
        if config.beatsaver_url.trim().is_empty() {
            config.beatsaver_url = defaults.beatsaver_url;
        }
        if config.scoresaber_url.trim().is_empty() {
            config.scoresaber_url = defaults.scoresaber_url;
        }
        if config.songbrowser_ranked_url.trim().is_empty() {
            config.songbrowser_ranked_url = defaults.songbrowser_ranked_url;
        }
        return Ok((config, false));
    }

    let config = BeatlistConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &BeatlistConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// On Linux a Windows path such as `D:\Games\Beat Saber` becomes
/// `/mnt/d/Games/Beat Saber`. Elsewhere the value is kept as is.
pub fn native_path(value: &str, linux: bool) -> String {
    let value = value.trim();
    if !linux {
        return value.to_string();
    }
    let bytes = value.as_bytes();
    let drive = (0..bytes.len().saturating_sub(2)).find(|&i| {
        (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
            && bytes[i + 1] == b':'
            && bytes[i + 2] == b'\\'
    });
    let translated = match drive {
        Some(i) => format!(
            "/mnt/{}/{}",
            (bytes[i] as char).to_ascii_lowercase(),
            &value[i + 3..]
        ),
        None => value.to_string(),
    };
    translated.replace('\\', "/")
}

fn resolve_dir(game: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        raw
    } else {
        game.join(raw)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{
        config_path_from_env, default_config_path, load_or_create_config, native_path, save_config,
        BeatlistConfig,
    };

    #[test]
    fn creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.is_file());
        assert!(config.user_agent.starts_with("beatlist/"));

        let (again, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(again.game_path, config.game_path);
        assert_eq!(again.songbrowser_ranked_url, config.songbrowser_ranked_url);
    }

    #[test]
    fn partial_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\ngame_path: /games/bs\nbeatsaver_url: ''\ntimeout_secs: 5\n")
            .unwrap();
        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.version, super::CONFIG_VERSION);
        assert_eq!(config.game_path, "/games/bs");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.beatsaver_url, "https://beatsaver.com");
        assert_eq!(config.playlists_dir, "Playlists");
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = BeatlistConfig::default();
        config.deleted_dir = "/elsewhere/deleted".to_string();
        save_config(&path, &config).unwrap();
        let (loaded, _) = load_or_create_config(&path).unwrap();
        assert_eq!(loaded.deleted_dir, "/elsewhere/deleted");
    }

    #[test]
    fn config_path_follows_env() {
        std::env::set_var("BEATLIST_CONFIG", "/etc/beatlist/config.yaml");
        assert_eq!(config_path_from_env(), PathBuf::from("/etc/beatlist/config.yaml"));
        std::env::set_var("BEATLIST_CONFIG", "  ");
        assert_eq!(config_path_from_env(), default_config_path());
        std::env::remove_var("BEATLIST_CONFIG");
        assert!(default_config_path().ends_with("config.yaml"));
    }

    #[test]
    fn translates_windows_paths_on_linux() {
        assert_eq!(
            native_path(r"C:\Program Files (x86)\Steam\steamapps\common\Beat Saber", true),
            "/mnt/c/Program Files (x86)/Steam/steamapps/common/Beat Saber"
        );
        assert_eq!(native_path(r"D:\Games\BS", true), "/mnt/d/Games/BS");
        assert_eq!(native_path("/home/me/bs", true), "/home/me/bs");
        assert_eq!(native_path(r"C:\Games", false), r"C:\Games");
    }

    #[test]
    fn dirs_resolve_against_game_path() {
        let mut config = BeatlistConfig::default();
        config.game_path = "/games/bs".to_string();
        config.deleted_dir = "/trash/songs".to_string();
        let paths = config.game_paths();
        assert_eq!(paths.playlists, PathBuf::from("/games/bs/Playlists"));
        assert_eq!(paths.songs, PathBuf::from("/games/bs/Beat Saber_Data/CustomLevels"));
        assert_eq!(paths.deleted, PathBuf::from("/trash/songs"));
    }

    #[test]
    fn ensure_dirs_creates_missing_folders() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BeatlistConfig::default();
        config.game_path = dir.path().to_string_lossy().to_string();
        let paths = config.game_paths();
        paths.ensure_dirs().unwrap();
        assert!(paths.playlists.is_dir());
        assert!(paths.songs.is_dir());
        assert!(paths.deleted.is_dir());
    }
}
