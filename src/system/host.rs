//! Real host implementation of [`System`]
//!
//! External tools run synchronously with their output redirected straight
//! into files, so log size never affects memory use.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use colored::Colorize;

use super::{BootId, System};
use crate::common::config::{BootConfig, Config, JournalConfig, NotifyConfig, RebootConfig, SleepConfig};
use crate::common::{Error, Result};

/// Runs the configured tools on this machine
#[derive(Debug, Clone)]
pub struct HostSystem {
    boot: BootConfig,
    journal: JournalConfig,
    sleep: SleepConfig,
    notify: NotifyConfig,
    reboot: RebootConfig,
}

impl HostSystem {
    pub fn from_config(config: &Config) -> Self {
        Self {
            boot: config.boot.clone(),
            journal: config.journal.clone(),
            sleep: config.sleep.clone(),
            notify: config.notify.clone(),
            reboot: config.reboot.clone(),
        }
    }
}

/// Locate an executable on PATH, or check an explicit path
fn resolve(command: &str) -> Result<PathBuf> {
    which::which(command).map_err(|e| Error::CommandNotFound {
        command: command.to_string(),
        details: e.to_string(),
    })
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl System for HostSystem {
    fn current_boot_id(&self) -> Result<BootId> {
        let path = &self.boot.id_path;
        let raw = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        BootId::parse(&raw).ok_or_else(|| {
            Error::Config(format!("'{}' does not hold a boot id", path.display()))
        })
    }

    fn capture_kernel_log(&self, boot_id: &BootId, dest: &Path) -> Result<()> {
        let journal = resolve(&self.journal.command)?;
        let out = File::create(dest)?;

        tracing::info!("Capturing kernel log for boot {} to {}", boot_id, dest.display());
        let status = Command::new(&journal)
            .args(["-b", boot_id.as_str(), "-k"])
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::command_failed(&self.journal.command, e.to_string()))?;

        if !status.success() {
            tracing::warn!("{} {}", self.journal.command, describe(status));
        }
        Ok(())
    }

    fn run_sleep_cycle(&self, log_path: &Path) -> Result<()> {
        if !self.sleep.enabled {
            tracing::debug!("Sleep exercise disabled");
            return Ok(());
        }

        let tool = self.sleep.resolved_command();
        let tool_str = tool.display().to_string();
        let tool = resolve(&tool_str)?;

        let mut argv: Vec<String> = Vec::new();
        if self.sleep.sudo {
            argv.push(resolve("sudo")?.display().to_string());
        }
        argv.push(tool.display().to_string());
        argv.push("--log".to_string());
        argv.push(log_path.display().to_string());
        argv.extend(self.sleep.args.iter().cloned());

        println!("{}", argv.join(" ").white().bold());
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|e| Error::command_failed(&tool_str, e.to_string()))?;

        if !status.success() {
            tracing::warn!("Sleep exercise {}", describe(status));
        }
        Ok(())
    }

    fn announce(&self, message: &str) -> Result<()> {
        println!("{}", message.bold());
        if !self.notify.enabled {
            return Ok(());
        }

        let speaker = match resolve(&self.notify.command) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping audible prompt: {}", e);
                return Ok(());
            }
        };
        match Command::new(speaker).arg(message).stdin(Stdio::null()).status() {
            Ok(status) if !status.success() => {
                tracing::warn!("{} {}", self.notify.command, describe(status));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to run {}: {}", self.notify.command, e),
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync(&self) -> Result<()> {
        tracing::debug!("Syncing filesystems");
        // SAFETY: sync(2) takes no arguments and cannot fail.
        unsafe { libc::sync() };
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn reboot(&self) -> Result<()> {
        if !self.reboot.enabled {
            tracing::info!("Reboot disabled in configuration, not rebooting");
            return Ok(());
        }

        let (program, args) = self
            .reboot
            .command
            .split_first()
            .ok_or_else(|| Error::Config("reboot.command must not be empty".to_string()))?;

        tracing::info!("Rebooting: {}", self.reboot.command.join(" "));
        let status = Command::new(resolve(program)?)
            .args(args)
            .status()
            .map_err(|e| Error::command_failed(program, e.to_string()))?;

        if !status.success() {
            return Err(Error::command_failed(program, describe(status)));
        }
        Ok(())
    }
}
