//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::{config_path, expand_home, local_config_path, Layout};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Template to enroll and run
    #[serde(default = "default_template")]
    pub template: String,

    /// Workspace root holding `templates/`, `runtime/` and `results/`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Extra columns appended (empty) to the results report
    #[serde(default = "default_report_headers")]
    pub report_headers: Vec<String>,

    /// Boot identity source
    #[serde(default)]
    pub boot: BootConfig,

    /// Kernel log capture
    #[serde(default)]
    pub journal: JournalConfig,

    /// Sleep/wake exercise run on the current boot
    #[serde(default)]
    pub sleep: SleepConfig,

    /// Audible prompt before the menu
    #[serde(default)]
    pub notify: NotifyConfig,

    /// System reboot trigger
    #[serde(default)]
    pub reboot: RebootConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template: default_template(),
            root: default_root(),
            report_headers: default_report_headers(),
            boot: BootConfig::default(),
            journal: JournalConfig::default(),
            sleep: SleepConfig::default(),
            notify: NotifyConfig::default(),
            reboot: RebootConfig::default(),
        }
    }
}

fn default_template() -> String {
    "power".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_report_headers() -> Vec<String> {
    vec!["amd_s2idle".to_string(), "kernel_log".to_string()]
}

/// Boot identity settings
#[derive(Debug, Deserialize, Clone)]
pub struct BootConfig {
    /// File exposing the per-boot identifier
    #[serde(default = "default_boot_id_path")]
    pub id_path: PathBuf,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            id_path: default_boot_id_path(),
        }
    }
}

fn default_boot_id_path() -> PathBuf {
    PathBuf::from("/proc/sys/kernel/random/boot_id")
}

/// Kernel log capture settings
#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    /// Journal reader, invoked as `<command> -b <boot-id> -k`
    #[serde(default = "default_journal_command")]
    pub command: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            command: default_journal_command(),
        }
    }
}

fn default_journal_command() -> String {
    "journalctl".to_string()
}

/// Sleep/wake exercise settings
#[derive(Debug, Deserialize, Clone)]
pub struct SleepConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exercise tool, invoked as `<command> --log <file> <args...>`
    #[serde(default = "default_sleep_command")]
    pub command: PathBuf,

    #[serde(default = "default_sleep_args")]
    pub args: Vec<String>,

    /// Run the tool through sudo
    #[serde(default = "default_true")]
    pub sudo: bool,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_sleep_command(),
            args: default_sleep_args(),
            sudo: true,
        }
    }
}

impl SleepConfig {
    /// The tool path with `~` expanded
    pub fn resolved_command(&self) -> PathBuf {
        expand_home(&self.command)
    }
}

fn default_sleep_command() -> PathBuf {
    PathBuf::from("~/bin/amd_s2idle.py")
}

fn default_sleep_args() -> Vec<String> {
    vec!["--wait".to_string(), "10".to_string()]
}

/// Audible prompt settings
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_notify_command")]
    pub command: String,

    #[serde(default = "default_notify_message")]
    pub message: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_notify_command(),
            message: default_notify_message(),
        }
    }
}

fn default_notify_command() -> String {
    "spd-say".to_string()
}

fn default_notify_message() -> String {
    "Ready".to_string()
}

/// Reboot trigger settings
#[derive(Debug, Deserialize, Clone)]
pub struct RebootConfig {
    /// When false the reboot action only syncs and finalizes
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reboot_command")]
    pub command: Vec<String>,
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_reboot_command(),
        }
    }
}

fn default_reboot_command() -> Vec<String> {
    vec!["sudo".to_string(), "reboot".to_string(), "now".to_string()]
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the first config file found
    ///
    /// Looks for `./bootrun.toml`, then the user config file. Returns the
    /// default configuration if neither exists.
    pub fn load() -> Result<Self> {
        let local = local_config_path();
        if local.exists() {
            return Self::from_file(&local);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Override the configured template, e.g. from `--template`
    pub fn with_template(mut self, template: Option<String>) -> Self {
        if let Some(template) = template {
            self.template = template;
        }
        self
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    /// Check the selected template exists
    pub fn validate(&self) -> Result<()> {
        if self.template.is_empty() {
            return Err(Error::Config("template name must not be empty".to_string()));
        }
        let dir = self.layout().template_dir(&self.template);
        if !dir.is_dir() {
            return Err(Error::MissingTemplate {
                name: self.template.clone(),
                path: dir,
            });
        }
        Ok(())
    }
}
