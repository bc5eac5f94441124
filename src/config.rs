use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conflict::{Grid, DEFAULT_SUGGESTIONS};
use crate::error::{Error, Result};
use crate::history::DEFAULT_CAPACITY;
use crate::progress::MAX_HORIZON_DAYS;

pub const APP_DIR: &str = "studyplan";
pub const DEFAULT_DB_NAME: &str = "studyplan.db";
pub const CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV: &str = "STUDYPLAN_CONFIG";
pub const DB_ENV: &str = "STUDYPLAN_DB";

/// User settings, read from `config.toml`. Every field is optional in the
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database file; overridden by `STUDYPLAN_DB`
    pub database: Option<PathBuf>,
    pub learner_id: i64,
    pub grid: GridSettings,
    pub history: HistorySettings,
    pub reviews: ReviewSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub open_hour: u32,
    pub close_hour: u32,
    pub step_minutes: u32,
    /// Free positions offered when a placement conflicts
    pub suggestions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Days ahead listed as upcoming reviews
    pub horizon_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            learner_id: 1,
            grid: GridSettings::default(),
            history: HistorySettings::default(),
            reviews: ReviewSettings::default(),
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            open_hour: 7,
            close_hour: 23,
            step_minutes: 30,
            suggestions: DEFAULT_SUGGESTIONS,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self { horizon_days: 7 }
    }
}

impl Settings {
    /// Loads from `$STUDYPLAN_CONFIG` or the default location. A missing
    /// file means defaults.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => config_dir().join(CONFIG_FILE),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        settings.grid()?;
        if settings.history.capacity == 0 {
            return Err(Error::InvalidConfig(
                "history.capacity must be at least 1".to_string(),
            ));
        }
        let horizon = settings.reviews.horizon_days;
        if !(0..=MAX_HORIZON_DAYS).contains(&horizon) {
            return Err(Error::InvalidConfig(format!(
                "reviews.horizon_days must be within 0..={}, got {}",
                MAX_HORIZON_DAYS, horizon
            )));
        }
        log::debug!("config: loaded {}", path.display());
        Ok(settings)
    }

    pub fn grid(&self) -> Result<Grid> {
        let g = &self.grid;
        if g.step_minutes == 0 || 60 % g.step_minutes != 0 {
            return Err(Error::InvalidConfig(format!(
                "grid.step_minutes must divide an hour, got {}",
                g.step_minutes
            )));
        }
        if g.open_hour >= g.close_hour || g.close_hour > 24 {
            return Err(Error::InvalidConfig(format!(
                "grid hours must satisfy open < close <= 24, got {}..{}",
                g.open_hour, g.close_hour
            )));
        }
        Ok(Grid::new(g.open_hour * 60, g.close_hour * 60, g.step_minutes))
    }

    /// `env_override` (from `STUDYPLAN_DB`) beats the configured path, which
    /// beats the default under the user config directory.
    pub fn db_path(&self, env_override: Option<PathBuf>) -> PathBuf {
        if let Some(path) = env_override {
            return path;
        }
        if let Some(path) = &self.database {
            return path.clone();
        }

        let dir = config_dir();
        std::fs::create_dir_all(&dir).ok();
        dir.join(DEFAULT_DB_NAME)
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    mod load_tests {
        use super::*;

        #[test]
        fn missing_file_gives_defaults() {
            let dir = tempfile::tempdir().unwrap();
            let settings = Settings::load_from(&dir.path().join("nope.toml")).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.grid().unwrap(), Grid::default());
        }

        #[test]
        fn partial_file_keeps_other_defaults() {
            let file = write_config(
                r#"
                learner_id = 4

                [grid]
                open_hour = 8
                suggestions = 3
                "#,
            );
            let settings = Settings::load_from(file.path()).unwrap();
            assert_eq!(settings.learner_id, 4);
            assert_eq!(settings.grid.open_hour, 8);
            assert_eq!(settings.grid.close_hour, 23);
            assert_eq!(settings.grid.suggestions, 3);
            assert_eq!(settings.history.capacity, DEFAULT_CAPACITY);
            assert_eq!(settings.reviews.horizon_days, 7);
            assert_eq!(settings.grid().unwrap(), Grid::new(480, 1380, 30));
        }

        #[test]
        fn malformed_toml_is_a_config_error() {
            let file = write_config("learner_id = \"one\"");
            assert!(matches!(
                Settings::load_from(file.path()),
                Err(Error::Config(_))
            ));
        }

        #[test]
        fn inverted_hours_are_rejected() {
            let file = write_config("[grid]\nopen_hour = 20\nclose_hour = 8\n");
            assert!(matches!(
                Settings::load_from(file.path()),
                Err(Error::InvalidConfig(_))
            ));
        }

        #[test]
        fn odd_step_is_rejected() {
            let mut settings = Settings::default();
            settings.grid.step_minutes = 25;
            assert!(settings.grid().is_err());
            settings.grid.step_minutes = 15;
            assert_eq!(settings.grid().unwrap().step, 15);
        }

        #[test]
        fn out_of_range_review_horizon_is_rejected() {
            let file = write_config("[reviews]\nhorizon_days = 10000000000\n");
            assert!(matches!(
                Settings::load_from(file.path()),
                Err(Error::InvalidConfig(_))
            ));
            let file = write_config("[reviews]\nhorizon_days = -1\n");
            assert!(Settings::load_from(file.path()).is_err());
            let file = write_config("[reviews]\nhorizon_days = 30\n");
            assert_eq!(Settings::load_from(file.path()).unwrap().reviews.horizon_days, 30);
        }

        #[test]
        fn zero_history_capacity_is_rejected() {
            let file = write_config("[history]\ncapacity = 0\n");
            assert!(Settings::load_from(file.path()).is_err());
        }
    }

    mod db_path_tests {
        use super::*;

        #[test]
        fn env_override_wins() {
            let settings = Settings {
                database: Some(PathBuf::from("/tmp/configured.db")),
                ..Default::default()
            };
            let path = settings.db_path(Some(PathBuf::from("/tmp/env.db")));
            assert_eq!(path, PathBuf::from("/tmp/env.db"));
        }

        #[test]
        fn configured_path_beats_default() {
            let settings = Settings {
                database: Some(PathBuf::from("/tmp/configured.db")),
                ..Default::default()
            };
            assert_eq!(settings.db_path(None), PathBuf::from("/tmp/configured.db"));
        }

        #[test]
        fn default_lives_under_app_dir() {
            let path = Settings::default().db_path(None);
            let path_str = path.to_str().unwrap();
            assert!(path_str.ends_with(DEFAULT_DB_NAME));
            assert!(path_str.contains(APP_DIR));
        }
    }
}
