use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;

/// Puts the database, config and exports under one directory
pub const HOME_ENV: &str = "COURTSIDE_HOME";

const DB_FILE: &str = "shots.db";
const CONFIG_FILE: &str = "config.json";
const EXPORT_SUBDIR: &str = "courtside";

/// Where courtside keeps its shot database, config and CSV exports
pub struct AppDirs;

impl AppDirs {
    fn home_override() -> Option<PathBuf> {
        std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "courtside")
    }

    pub fn db_path() -> Option<PathBuf> {
        if let Some(home) = Self::home_override() {
            return Some(home.join(DB_FILE));
        }
        Self::project().map(|p| p.data_local_dir().join(DB_FILE))
    }

    pub fn config_path() -> PathBuf {
        if let Some(home) = Self::home_override() {
            return home.join(CONFIG_FILE);
        }
        Self::project()
            .map(|p| p.config_dir().join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// `<documents>/courtside` when the platform has a documents folder,
    /// otherwise the current directory
    pub fn export_dir() -> PathBuf {
        if let Some(home) = Self::home_override() {
            return home.join("exports");
        }
        UserDirs::new()
            .and_then(|u| u.document_dir().map(|d| d.join(EXPORT_SUBDIR)))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locations_use_fixed_file_names() {
        if AppDirs::home_override().is_some() {
            return;
        }
        if let Some(db) = AppDirs::db_path() {
            assert!(db.ends_with(DB_FILE));
        }
        assert!(AppDirs::config_path().ends_with(CONFIG_FILE));
    }
}
