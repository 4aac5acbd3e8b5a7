use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::common::{Error, Result};
use crate::menu::Menu;
use crate::responses::ResponseMenu;
use crate::system::{BootId, System};

/// [`System`] that logs calls instead of running tools
///
/// Calls are recorded as `"journal <boot>"`, `"sleep"`, `"announce <msg>"`,
/// `"sync"` and `"reboot"`. Log captures write a small placeholder file so
/// finalized tests look like real ones.
#[derive(Debug)]
pub struct FakeSystem {
    boot_id: RefCell<BootId>,
    calls: RefCell<Vec<String>>,
    fail_sleep: bool,
    fail_reboot: bool,
}

impl FakeSystem {
    pub fn new(boot_id: &str) -> Self {
        Self {
            boot_id: RefCell::new(parse_boot(boot_id)),
            calls: RefCell::new(Vec::new()),
            fail_sleep: false,
            fail_reboot: false,
        }
    }

    /// Make the sleep exercise fail like a missing helper would
    pub fn failing_sleep(mut self) -> Self {
        self.fail_sleep = true;
        self
    }

    /// Make the reboot command fail
    pub fn failing_reboot(mut self) -> Self {
        self.fail_reboot = true;
        self
    }

    /// Pretend the machine came back up with a new boot id
    pub fn set_boot(&self, boot_id: &str) {
        *self.boot_id.borrow_mut() = parse_boot(boot_id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

fn parse_boot(raw: &str) -> BootId {
    BootId::parse(raw).unwrap_or_else(|| panic!("Invalid fake boot id: {raw:?}"))
}

impl System for FakeSystem {
    fn current_boot_id(&self) -> Result<BootId> {
        Ok(self.boot_id.borrow().clone())
    }

    fn capture_kernel_log(&self, boot_id: &BootId, dest: &Path) -> Result<()> {
        self.record(format!("journal {boot_id}"));
        fs::write(dest, format!("kernel log for boot {boot_id}\n"))?;
        Ok(())
    }

    fn run_sleep_cycle(&self, log: &Path) -> Result<()> {
        self.record("sleep");
        if self.fail_sleep {
            return Err(Error::command_failed("amd_s2idle.py", "exited with code 1"));
        }
        fs::write(log, "suspend/resume cycle ok\n")?;
        Ok(())
    }

    fn announce(&self, message: &str) -> Result<()> {
        self.record(format!("announce {message}"));
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.record("sync");
        Ok(())
    }

    fn reboot(&self) -> Result<()> {
        self.record("reboot");
        if self.fail_reboot {
            return Err(Error::command_failed("reboot", "exited with code 1"));
        }
        Ok(())
    }
}

/// [`Menu`] that replays canned answers
///
/// Each answer is resolved like operator input: a hotkey or a full
/// description. Running out of answers closes the menu.
#[derive(Debug, Default)]
pub struct ScriptedMenu {
    answers: VecDeque<String>,
    presented: Vec<(String, Vec<String>)>,
}

impl ScriptedMenu {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            presented: Vec::new(),
        }
    }

    /// Every menu shown so far, as (title, descriptions)
    pub fn presented(&self) -> &[(String, Vec<String>)] {
        &self.presented
    }
}

impl Menu for ScriptedMenu {
    fn choose(&mut self, title: &str, menu: &ResponseMenu) -> Result<Option<String>> {
        self.presented.push((
            title.to_string(),
            menu.descriptions().map(str::to_string).collect(),
        ));
        let Some(answer) = self.answers.pop_front() else {
            return Ok(None);
        };
        menu.resolve_choice(&answer)
            .map(|entry| Some(entry.description.clone()))
            .ok_or_else(|| Error::Internal(format!("Scripted answer '{answer}' is not on the menu")))
    }
}
