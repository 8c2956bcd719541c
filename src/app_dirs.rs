use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/nback`, or the platform data dir without `$HOME`
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("nback"))
        } else {
            ProjectDirs::from("", "", "nback").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("nback.log"))
    }

    /// Default location of recorded letter sounds (`c.wav`, `h.wav`, ...)
    pub fn sounds_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "nback").map(|proj_dirs| proj_dirs.data_dir().join("sounds"))
    }
}
