use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::convert::Direction;

const APP_DIR: &str = "epub-zhconv";
pub const LOG_FILE: &str = "epub-zhconv.log";

/// Settings remembered between runs
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub last_direction: Option<Direction>,
    #[serde(default)]
    pub last_dictionary: Option<PathBuf>,
    #[serde(default)]
    pub last_emit_text: bool,
}

impl Config {
    /// Get the application data directory
    pub fn get_app_data_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);

        if !path.exists() {
            let _ = std::fs::create_dir_all(&path);
        }
        path
    }

    fn config_path() -> PathBuf {
        Self::get_app_data_dir().join("config.json")
    }

    pub fn get_log_path() -> PathBuf {
        Self::get_app_data_dir().join(LOG_FILE)
    }

    pub fn load() -> Config {
        Self::load_from(&Self::config_path())
    }

    /// Missing or unreadable files fall back to defaults
    pub fn load_from(path: &Path) -> Config {
        if path.exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                match serde_json::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring unreadable config {:?}: {}", path, e),
                }
            }
        }
        Config::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Remember the settings of a successful run
    pub fn save_last_run(direction: Direction, dictionary: Option<&Path>, emit_text: bool) -> Result<()> {
        let mut config = Config::load();
        config.record_run(direction, dictionary, emit_text);
        config.save()
    }

    pub fn record_run(&mut self, direction: Direction, dictionary: Option<&Path>, emit_text: bool) {
        self.last_direction = Some(direction);
        if let Some(d) = dictionary {
            self.last_dictionary = Some(d.to_path_buf());
        }
        self.last_emit_text = emit_text;
    }

    /// `--text` forces extraction on, `--no-text` forces it off, otherwise the
    /// last run's choice is reused
    pub fn emit_text(&self, text: bool, no_text: bool) -> bool {
        text || (!no_text && self.last_emit_text)
    }

    pub fn direction(&self) -> Direction {
        self.last_direction.unwrap_or_default()
    }

    /// Remembered dictionary, if the file is still there
    pub fn dictionary(&self) -> Option<PathBuf> {
        self.last_dictionary.clone().filter(|p| p.is_file())
    }
}
