//! Test cycle orchestration
//!
//! Each invocation does exactly one of three things:
//!
//! 1. a test is running (typically because the last invocation rebooted the
//!    machine): resume it and stop;
//! 2. tests are pending: claim the next one and run it;
//! 3. nothing to do.
//!
//! Running a test means: compile its response menu, capture the kernel log of
//! the boot it is bound to, exercise sleep/wake if that boot is the current
//! one, ask the operator, apply the chosen actions, and finalize. Response
//! definitions are compiled before a pending test is claimed, so a broken
//! definition never consumes a test.

use std::path::PathBuf;

use crate::actions::RunContext;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::lifecycle::TestTree;
use crate::menu::Menu;
use crate::responses::{self, Conditions, ResponseMenu};
use crate::scenario::ScenarioStore;
use crate::system::System;

/// Kernel log file suffix inside a test directory
pub const KERNEL_LOG_SUFFIX: &str = "journal-k.log";

/// Sleep exercise log file suffix inside a test directory
pub const SLEEP_LOG_SUFFIX: &str = "amd_s2idle.log";

/// What one invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Running tests found and resumed
    Resumed(Vec<TestRun>),
    /// A pending test was claimed and run
    Started(TestRun),
    /// No running or pending tests
    Idle,
}

/// Result of running one test directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// Directory the run started from
    pub test_directory: PathBuf,
    /// Whether the test was claimed in the current boot
    pub current_boot: bool,
    /// Menu entry the operator picked
    pub choice: Option<String>,
    /// Location in the results root, when the run moved it there
    pub result_directory: Option<PathBuf>,
}

/// Drives test cycles against one workspace
pub struct Runner<'a> {
    config: &'a Config,
    store: &'a ScenarioStore,
    system: &'a dyn System,
    menu: &'a mut dyn Menu,
    tree: TestTree,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a ScenarioStore,
        system: &'a dyn System,
        menu: &'a mut dyn Menu,
    ) -> Self {
        Self {
            config,
            store,
            system,
            menu,
            tree: TestTree::new(&config.layout()),
        }
    }

    /// Resume a running test, or start the next pending one
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if self.tree.running_exists()? {
            let mut runs = Vec::new();
            for test_dir in self.tree.running_tests()? {
                tracing::info!("Resuming {}", test_dir.display());
                runs.push(self.run_test(test_dir)?);
            }
            return Ok(CycleOutcome::Resumed(runs));
        }
        tracing::info!("No tests running");

        if self.tree.pending_exists()? {
            // A fresh claim always runs in the current boot
            self.compile_menu(&Conditions::for_boot(true))?;
            let boot_id = self.system.current_boot_id()?;
            let test_dir = self.tree.claim_next(&boot_id)?;
            return Ok(CycleOutcome::Started(self.run_test(test_dir)?));
        }
        tracing::info!("No tests pending");

        Ok(CycleOutcome::Idle)
    }

    /// Run one test in the running root through to finalization
    ///
    /// A failure before the operator is asked (bad response definitions, a
    /// log capture or sleep exercise that cannot run) leaves the test in the
    /// running root to be resumed. Once the menu is up the test is finalized
    /// whatever happens, unless an action already finalized or discarded it.
    pub fn run_test(&mut self, test_dir: PathBuf) -> Result<TestRun> {
        let mut ctx = RunContext::load(
            self.config,
            self.store,
            self.system,
            &self.tree,
            test_dir.clone(),
        )?;
        tracing::debug!("{:?}", ctx);

        let menu = self.compile_menu(&ctx.conditions())?;
        self.collect_logs(&ctx)?;

        let outcome = self.respond(&mut ctx, &menu);
        let finalized = ctx.finalize();

        let choice = match outcome {
            Ok(choice) => choice,
            Err(e) => {
                if let Err(finalize_err) = finalized {
                    tracing::error!("Failed to finalize after error: {}", finalize_err);
                }
                return Err(e);
            }
        };

        let result_directory = finalized?.or_else(|| {
            let moved = self.tree.results_dir().join(test_dir.file_name()?);
            moved.is_dir().then_some(moved)
        });

        Ok(TestRun {
            test_directory: test_dir,
            current_boot: ctx.is_current_boot(),
            choice,
            result_directory,
        })
    }

    fn compile_menu(&self, conditions: &Conditions) -> Result<ResponseMenu> {
        let layout = self.config.layout();
        let template = &self.config.template;
        responses::compile_file(
            &layout.responses_file(template),
            conditions,
            self.store,
            &layout.scenarios_file(template),
        )
    }

    fn collect_logs(&self, ctx: &RunContext<'a>) -> Result<()> {
        self.system
            .capture_kernel_log(&ctx.boot_id, &ctx.log_path(KERNEL_LOG_SUFFIX))?;
        if ctx.is_current_boot() {
            self.system.run_sleep_cycle(&ctx.log_path(SLEEP_LOG_SUFFIX))?;
        }
        Ok(())
    }

    fn respond(&mut self, ctx: &mut RunContext<'a>, menu: &ResponseMenu) -> Result<Option<String>> {
        if menu.is_empty() {
            tracing::warn!("No responses apply to this test, finishing without a result");
            return Ok(None);
        }

        if ctx.is_current_boot() {
            self.system.announce(&self.config.notify.message)?;
        }

        let Some(description) = self.menu.choose(&ctx.scenario.title(), menu)? else {
            tracing::warn!("No option chosen");
            return Ok(None);
        };

        for action in menu.actions_for(&description) {
            tracing::info!("Running {} for '{}'", action, description);
            action.run(ctx)?;
        }
        Ok(Some(description))
    }
}

/// Enroll a new batch from the configured template
///
/// The template's response definitions are compiled first under every
/// combination of runtime conditions, so a bad definition is caught before
/// any test is created.
pub fn enroll(config: &Config, store: &ScenarioStore) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let layout = config.layout();
    let scenarios = layout.scenarios_file(&config.template);
    let responses_file = layout.responses_file(&config.template);

    if !scenarios.is_file() {
        return Err(Error::MissingTemplate {
            name: config.template.clone(),
            path: scenarios,
        });
    }
    if responses_file.is_file() {
        for current_boot in [true, false] {
            responses::compile_file(
                &responses_file,
                &Conditions::for_boot(current_boot),
                store,
                &scenarios,
            )?;
        }
    } else {
        tracing::warn!("No response definitions at {}", responses_file.display());
    }

    let rows = store.read_rows(&scenarios)?;
    let headers = rows.headers().to_vec();
    let tree = TestTree::new(&layout);
    tree.enroll_batch(&config.template, &headers, rows, store)
}
