//! Operator actions and their registry
//!
//! Response definitions name actions by their registry name. The set is
//! closed: every action is listed in [`all_actions`] and resolved with
//! [`get_action`], which also knows how to turn the raw parameter tokens of a
//! definition row into a typed [`Action`].

mod context;

pub use context::RunContext;

use std::fmt;
use std::path::Path;

use crate::common::{Error, Result};
use crate::scenario::ScenarioStore;

/// An action with its parameters already prepared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Sync, finalize the test, then reboot the machine
    Reboot,
    /// Delete the test directory; the test never reaches the results root
    Discard,
    /// Record an operator judgment in a scenario column
    WriteResult { column: String, result: String },
    /// Close the run without recording a result for this boot
    Quit,
}

/// Registry entry for an action
#[derive(Clone)]
pub struct ActionInfo {
    /// Name used in the `action` column of response definitions
    pub name: &'static str,
    /// Parameter synopsis
    pub params: &'static str,
    /// Brief description
    pub description: &'static str,
    prepare: fn(&ActionInfo, &[String]) -> Result<Action>,
}

impl ActionInfo {
    /// Turn raw parameter tokens into a typed action
    pub fn prepare(&self, tokens: &[String]) -> Result<Action> {
        (self.prepare)(self, tokens)
    }
}

impl fmt::Debug for ActionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInfo")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// All available actions
static ACTIONS: &[ActionInfo] = &[
    ActionInfo {
        name: "reboot",
        params: "",
        description: "Sync, finalize the test and reboot",
        prepare: prepare_reboot,
    },
    ActionInfo {
        name: "discard",
        params: "",
        description: "Delete the running test without keeping a result",
        prepare: prepare_discard,
    },
    ActionInfo {
        name: "write_result",
        params: "<column> <result>",
        description: "Write a result into a scenario column",
        prepare: prepare_write_result,
    },
    ActionInfo {
        name: "quit",
        params: "",
        description: "Finish this run without writing a result",
        prepare: prepare_quit,
    },
];

/// Get all registered actions
pub fn all_actions() -> &'static [ActionInfo] {
    ACTIONS
}

/// Get action info by name
pub fn get_action(name: &str) -> Option<&'static ActionInfo> {
    ACTIONS.iter().find(|a| a.name == name)
}

fn prepare_reboot(info: &ActionInfo, tokens: &[String]) -> Result<Action> {
    expect_no_params(info, tokens, Action::Reboot)
}

fn prepare_discard(info: &ActionInfo, tokens: &[String]) -> Result<Action> {
    expect_no_params(info, tokens, Action::Discard)
}

fn prepare_quit(info: &ActionInfo, tokens: &[String]) -> Result<Action> {
    expect_no_params(info, tokens, Action::Quit)
}

fn expect_no_params(info: &ActionInfo, tokens: &[String], action: Action) -> Result<Action> {
    if !tokens.is_empty() {
        return Err(Error::invalid_params(
            info.name,
            format!("takes no parameters, got {tokens:?}"),
        ));
    }
    Ok(action)
}

fn prepare_write_result(info: &ActionInfo, tokens: &[String]) -> Result<Action> {
    let [column, result] = tokens else {
        return Err(Error::invalid_params(
            info.name,
            format!("expected {}, got {tokens:?}", info.params),
        ));
    };
    // "result, pass" tokenizes to ["result,", "pass"]
    let column = column.trim().trim_end_matches(',').trim_end();
    if column.is_empty() {
        return Err(Error::invalid_params(info.name, "column must not be empty"));
    }
    Ok(Action::WriteResult {
        column: column.to_string(),
        result: result.clone(),
    })
}

impl Action {
    /// Registry name of this action
    pub fn name(&self) -> &'static str {
        match self {
            Action::Reboot => "reboot",
            Action::Discard => "discard",
            Action::WriteResult { .. } => "write_result",
            Action::Quit => "quit",
        }
    }

    /// Check the parameters against the scenario schema at `schema_path`
    pub fn verify(&self, store: &ScenarioStore, schema_path: &Path) -> Result<()> {
        match self {
            Action::WriteResult { column, .. } => store.validate_column(schema_path, column),
            Action::Reboot | Action::Discard | Action::Quit => Ok(()),
        }
    }

    /// Apply the action to a run
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        match self {
            Action::Reboot => {
                tracing::info!("Rebooting");
                tracing::debug!("{:?}", ctx);
                ctx.system.sync()?;
                // The reboot kills this process before the normal finalize
                // at the end of the run gets a chance.
                ctx.finalize()?;
                ctx.system.reboot()
            }
            Action::Discard => {
                ctx.ensure_mutable()?;
                tracing::info!("Discarding test at {}", ctx.test_directory.display());
                std::fs::remove_dir_all(&ctx.test_directory)?;
                ctx.mark_finalized();
                Ok(())
            }
            Action::WriteResult { column, result } => {
                ctx.ensure_mutable()?;
                tracing::info!("Writing result to column {}: {}", column, result);
                ctx.scenario.set(column, result.as_str());
                let headers = ctx.store.headers(&ctx.scenario_file)?;
                ctx.store.write_row(&ctx.scenario_file, &headers, &ctx.scenario)?;
                tracing::debug!("Scenario is now: {}", ctx.scenario);
                Ok(())
            }
            Action::Quit => {
                tracing::info!("Quitting without a result");
                ctx.mark_finalized();
                Ok(())
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::WriteResult { column, result } => {
                write!(f, "{}({}={})", self.name(), column, result)
            }
            _ => f.write_str(self.name()),
        }
    }
}
