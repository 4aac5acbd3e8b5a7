//! Per-run execution context

use std::fmt;
use std::path::PathBuf;

use crate::common::config::Config;
use crate::common::paths::SCENARIO_FILE;
use crate::common::{Error, Result};
use crate::lifecycle::{self, TestTree};
use crate::responses::Conditions;
use crate::scenario::{ScenarioRecord, ScenarioStore};
use crate::system::{BootId, System};

/// State of one test run, owned by a single orchestration pass
///
/// Once finalized, the test directory must not be moved or modified again;
/// [`RunContext::ensure_mutable`] enforces this for actions.
pub struct RunContext<'a> {
    pub config: &'a Config,
    pub store: &'a ScenarioStore,
    pub system: &'a dyn System,
    /// Full scenario row, placeholders included
    pub scenario: ScenarioRecord,
    pub scenario_file: PathBuf,
    pub test_directory: PathBuf,
    pub results_dir: PathBuf,
    /// Boot the test was claimed in
    pub boot_id: BootId,
    pub current_boot_id: BootId,
    /// Log file name prefix
    pub prefix: String,
    finalized: bool,
}

impl<'a> RunContext<'a> {
    /// Build the context for a running test directory
    pub fn load(
        config: &'a Config,
        store: &'a ScenarioStore,
        system: &'a dyn System,
        tree: &TestTree,
        test_directory: PathBuf,
    ) -> Result<Self> {
        let boot_id = lifecycle::read_boot_id(&test_directory)?;
        let current_boot_id = system.current_boot_id()?;
        let prefix = lifecycle::read_prefix(&test_directory)?;
        let scenario_file = test_directory.join(SCENARIO_FILE);
        let scenario = store.read_single_row(&scenario_file, false)?;

        Ok(Self {
            config,
            store,
            system,
            scenario,
            scenario_file,
            test_directory,
            results_dir: tree.results_dir().to_path_buf(),
            boot_id,
            current_boot_id,
            prefix,
            finalized: false,
        })
    }

    /// True when the test was claimed during the boot we are running in
    pub fn is_current_boot(&self) -> bool {
        self.boot_id == self.current_boot_id
    }

    /// Runtime conditions response definitions can be gated on
    pub fn conditions(&self) -> Conditions {
        Conditions::for_boot(self.is_current_boot())
    }

    /// `<test dir>/<prefix>-<suffix>`
    pub fn log_path(&self, suffix: &str) -> PathBuf {
        self.test_directory.join(format!("{}-{}", self.prefix, suffix))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// Fail if the test directory may no longer be touched
    pub fn ensure_mutable(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized(self.test_directory.clone()));
        }
        Ok(())
    }

    /// Move the test into the results root, once
    pub fn finalize(&mut self) -> Result<Option<PathBuf>> {
        lifecycle::finalize(self)
    }
}

impl fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("template", &self.config.template)
            .field("scenario", &self.scenario.to_string())
            .field("test_directory", &self.test_directory)
            .field("boot_id", &self.boot_id.as_str())
            .field("current_boot_id", &self.current_boot_id.as_str())
            .field("is_current_boot", &self.is_current_boot())
            .field("prefix", &self.prefix)
            .field("finalized", &self.finalized)
            .finish()
    }
}
