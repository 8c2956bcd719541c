use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const MIN_N_LEVEL: u32 = 1;
pub const MAX_N_LEVEL: u32 = 5;
pub const MIN_DURATION_SECS: f64 = 1.0;
pub const MAX_DURATION_SECS: f64 = 5.0;
pub const DURATION_STEP_SECS: f64 = 0.5;
pub const MIN_TRIALS: u32 = 10;
pub const MAX_TRIALS: u32 = 50;
pub const TRIALS_STEP: u32 = 5;

/// Where letter sounds come from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AudioProvider {
    Recorded,
    Tts,
}

/// Per-session game configuration. Never mutated while a session runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub n_level: u32,
    /// seconds each stimulus stays on screen
    pub duration_seconds: f64,
    pub total_trials: u32,
    /// probability of forcing a match at each eligible index, per channel
    pub match_chance: f64,
    pub audio_provider: AudioProvider,
    pub tts_voice: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            n_level: 2,
            duration_seconds: 2.5,
            total_trials: 20,
            match_chance: 0.3,
            audio_provider: AudioProvider::Tts,
            tts_voice: None,
        }
    }
}

impl Settings {
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds)
    }

    /// Check the preconditions the sequence generator and scorer rely on.
    pub fn validate(&self) -> Result<()> {
        if self.n_level < 1 {
            return Err(Error::InvalidConfig(
                "n-back level must be at least 1".to_string(),
            ));
        }
        if self.total_trials <= self.n_level {
            return Err(Error::InvalidConfig(format!(
                "total trials ({}) must exceed the n-back level ({})",
                self.total_trials, self.n_level
            )));
        }
        if !(0.0..=1.0).contains(&self.match_chance) {
            return Err(Error::InvalidConfig(format!(
                "match chance {} is outside [0, 1]",
                self.match_chance
            )));
        }
        if !(self.duration_seconds.is_finite() && self.duration_seconds > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "step duration {}s must be positive",
                self.duration_seconds
            )));
        }
        Ok(())
    }

    /// Pull every user-facing option back onto the configuration surface
    /// (levels 1-5, 1-5s in half seconds, 10-50 trials in fives).
    pub fn clamped(mut self) -> Self {
        self.n_level = self.n_level.clamp(MIN_N_LEVEL, MAX_N_LEVEL);

        let duration = if self.duration_seconds.is_finite() {
            (self.duration_seconds / DURATION_STEP_SECS).round() * DURATION_STEP_SECS
        } else {
            Settings::default().duration_seconds
        };
        self.duration_seconds = duration.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);

        let trials = self.total_trials.clamp(MIN_TRIALS, MAX_TRIALS);
        self.total_trials = ((trials + TRIALS_STEP / 2) / TRIALS_STEP * TRIALS_STEP).min(MAX_TRIALS);

        if !(0.0..=1.0).contains(&self.match_chance) {
            self.match_chance = Settings::default().match_chance;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "nback") {
            pd.config_dir().join("settings.json")
        } else {
            PathBuf::from("nback_settings.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files fall back to the defaults.
    fn load(&self) -> Settings {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) => settings.clamped(),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "ignoring unreadable settings: {e}");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileConfigStore::with_path(&path);
        let settings = Settings::default();
        store.save(&settings).unwrap();
        assert_eq!(settings, store.load());
    }

    #[test]
    fn save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            n_level: 4,
            duration_seconds: 1.5,
            total_trials: 35,
            match_chance: 0.25,
            audio_provider: AudioProvider::Recorded,
            tts_voice: Some("en-us".into()),
        };
        store.save(&settings).unwrap();
        assert_eq!(settings, store.load());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, br#"{ "n_level": 3, "audio_provider": "recorded" }"#).unwrap();
        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.n_level, 3);
        assert_eq!(loaded.audio_provider, AudioProvider::Recorded);
        assert_eq!(loaded.total_trials, 20);
    }

    #[test]
    fn huge_trial_count_loads_as_maximum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, br#"{ "total_trials": 4294967295 }"#).unwrap();
        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.total_trials, MAX_TRIALS);
    }

    #[test]
    fn clamped_snaps_onto_surface() {
        let settings = Settings {
            n_level: 9,
            duration_seconds: 1.3,
            total_trials: 93,
            match_chance: 4.0,
            ..Settings::default()
        }
        .clamped();
        assert_eq!(settings.n_level, 5);
        assert_eq!(settings.duration_seconds, 1.5);
        assert_eq!(settings.total_trials, 50);
        assert_eq!(settings.match_chance, 0.3);

        let low = Settings {
            n_level: 0,
            duration_seconds: 0.1,
            total_trials: 12,
            ..Settings::default()
        }
        .clamped();
        assert_eq!(low.n_level, 1);
        assert_eq!(low.duration_seconds, 1.0);
        assert_eq!(low.total_trials, 10);
    }

    #[test]
    fn validate_rejects_too_few_trials() {
        let settings = Settings {
            n_level: 3,
            total_trials: 3,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_bad_chance_and_duration() {
        let chance = Settings {
            match_chance: 1.5,
            ..Settings::default()
        };
        assert!(chance.validate().is_err());

        let duration = Settings {
            duration_seconds: 0.0,
            ..Settings::default()
        };
        assert!(duration.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn step_duration_in_millis() {
        let settings = Settings::default();
        assert_eq!(settings.step_duration().as_millis(), 2500);
    }
}
