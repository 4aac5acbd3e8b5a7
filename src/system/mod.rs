//! Host integration
//!
//! Everything that touches the machine under test goes through [`System`]:
//! boot identity, kernel log capture, the sleep/wake exercise, the audible
//! prompt, and the reboot itself. [`HostSystem`] does it for real; tests swap
//! in a fake.

mod host;

pub use host::HostSystem;

use std::fmt;
use std::path::Path;

use crate::common::Result;

/// Identifier of one kernel boot, hyphens stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootId(String);

impl BootId {
    /// Normalize a raw boot id as exposed by the kernel
    ///
    /// Returns `None` if nothing but whitespace and hyphens is left, or if it
    /// contains anything besides ASCII letters and digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let id: String = raw.trim().chars().filter(|c| *c != '-').collect();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side effects on the machine under test
pub trait System {
    /// Identifier of the boot this process is running in
    fn current_boot_id(&self) -> Result<BootId>;

    /// Write the kernel log of `boot_id` to `dest`
    fn capture_kernel_log(&self, boot_id: &BootId, dest: &Path) -> Result<()>;

    /// Run the sleep/wake exercise, logging to `log_path`
    fn run_sleep_cycle(&self, log_path: &Path) -> Result<()>;

    /// Tell the operator, audibly if possible, that input is needed
    fn announce(&self, message: &str) -> Result<()>;

    /// Flush filesystem buffers to durable storage
    fn sync(&self) -> Result<()>;

    /// Reboot the machine
    fn reboot(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_id_strips_hyphens_and_whitespace() {
        let id = BootId::parse("3f2a9c1e-0b4d-4e6f-8a7b-1c2d3e4f5a6b\n").unwrap();
        assert_eq!(id.as_str(), "3f2a9c1e0b4d4e6f8a7b1c2d3e4f5a6b");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn test_boot_id_rejects_garbage() {
        assert!(BootId::parse("").is_none());
        assert!(BootId::parse(" - \n").is_none());
        assert!(BootId::parse("abc/def").is_none());
    }
}
