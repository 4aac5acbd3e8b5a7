//! Workspace layout and configuration paths
//!
//! Everything bootrun persists lives under one workspace root:
//!
//! ```text
//! templates/<template>/{scenarios.csv, quick-responses.csv}
//! runtime/pending/<n>-<template>--<fields>/
//! runtime/running/<n>-<template>--<fields>--<boot-id>/
//! results/<n>-<template>--<fields>--<boot-id>/
//! ```

use std::path::{Path, PathBuf};

/// Name used for the config directory and log file
const APP_NAME: &str = "bootrun";

/// Scenario template file inside a template directory
pub const SCENARIOS_FILE: &str = "scenarios.csv";

/// Response definition file inside a template directory
pub const RESPONSES_FILE: &str = "quick-responses.csv";

/// Per-test scenario file
pub const SCENARIO_FILE: &str = "scenario.csv";

/// Sidecar holding the boot id a running test is bound to
pub const BOOT_ID_FILE: &str = "boot_id";

/// Sidecar holding the log file prefix
pub const PREFIX_FILE: &str = "prefix";

/// Resolved directory layout for one workspace root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn template_dir(&self, template: &str) -> PathBuf {
        self.templates_dir().join(template)
    }

    /// `templates/<template>/scenarios.csv`
    pub fn scenarios_file(&self, template: &str) -> PathBuf {
        self.template_dir(template).join(SCENARIOS_FILE)
    }

    /// `templates/<template>/quick-responses.csv`
    pub fn responses_file(&self, template: &str) -> PathBuf {
        self.template_dir(template).join(RESPONSES_FILE)
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("runtime")
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.runtime_dir().join("pending")
    }

    pub fn running_dir(&self) -> PathBuf {
        self.runtime_dir().join("running")
    }

    /// Where pending directories are assembled before being renamed into place
    pub fn staging_dir(&self) -> PathBuf {
        self.runtime_dir().join(".staging")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Persistent log written alongside the runtime state
    pub fn log_file(&self) -> PathBuf {
        self.runtime_dir().join(format!("{APP_NAME}.log"))
    }
}

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/bootrun/`
/// - macOS: `~/Library/Application Support/bootrun/`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the user configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Configuration file looked up in the working directory first
pub fn local_config_path() -> PathBuf {
    PathBuf::from(format!("{APP_NAME}.toml"))
}

/// Expand a leading `~` against the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_places_runtime_roots_under_root() {
        let layout = Layout::new("/srv/lab");
        assert_eq!(layout.pending_dir(), PathBuf::from("/srv/lab/runtime/pending"));
        assert_eq!(layout.running_dir(), PathBuf::from("/srv/lab/runtime/running"));
        assert_eq!(layout.results_dir(), PathBuf::from("/srv/lab/results"));
        assert_eq!(
            layout.responses_file("power"),
            PathBuf::from("/srv/lab/templates/power/quick-responses.csv")
        );
    }

    #[test]
    fn test_expand_home_leaves_plain_paths_alone() {
        assert_eq!(expand_home(Path::new("/usr/bin/true")), PathBuf::from("/usr/bin/true"));
        assert_eq!(expand_home(Path::new("bin/tool")), PathBuf::from("bin/tool"));
    }

    #[test]
    fn test_expand_home_replaces_tilde() {
        let expanded = expand_home(Path::new("~/bin/amd_s2idle.py"));
        assert!(expanded.ends_with("bin/amd_s2idle.py"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert!(expanded.starts_with(dirs.home_dir()));
        }
    }
}
