//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Project-relative directory holding the lake and metadata by default.
pub const STATE_DIR: &str = ".strata";

/// XDG-compliant paths for Strata
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("dev", "Strata", "strata"),
        }
    }

    /// User config directory (~/.config/strata/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::XdgError("Failed to determine user config directory".to_string()))
    }

    /// User config file path (~/.config/strata/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Project config file path (strata.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("strata.toml")
    }

    /// Local override file path (strata.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("strata.local.toml")
    }

}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn user_paths_mention_strata() {
        if let Ok(dir) = Paths::new().user_config_dir() {
            assert!(dir.to_string_lossy().contains("strata"));
        }
    }

    #[test]
    fn project_paths() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        assert_eq!(Paths::project_config_file(project_dir), project_dir.join("strata.toml"));
        assert_eq!(Paths::local_config_file(project_dir), project_dir.join("strata.local.toml"));
    }
}
