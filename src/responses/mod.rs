//! Response definitions: from a declarative table to an operator menu
//!
//! A response file has one row per `(description, condition, action, params)`.
//! Rows that share a description run their actions in order when that
//! description is chosen. Hotkeys are marked in the description with `[ ]`.
//!
//! Compilation checks everything it can before a test runs: action names,
//! parameters (including scenario columns they refer to), condition names and
//! hotkey bindings. It does so for every row, whether or not its condition
//! currently holds.

mod hotkeys;

pub use hotkeys::extract_hotkeys;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::actions::{get_action, Action};
use crate::common::{Error, Result};
use crate::scenario::ScenarioStore;

/// Condition true when the test was claimed in the current boot
pub const IS_CURRENT_BOOT: &str = "is_current_boot";

/// Named runtime conditions that gate response rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeMap<String, bool>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conditions known for a test run
    pub fn for_boot(is_current_boot: bool) -> Self {
        Self::new().with(IS_CURRENT_BOOT, is_current_boot)
    }

    pub fn with(mut self, name: &str, value: bool) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    /// Value of a named condition; an empty name always holds
    pub fn resolve(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(true);
        }
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownCondition(name.to_string()))
    }
}

/// One row of a response definition file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseRow {
    pub description: String,
    #[serde(default)]
    pub condition: String,
    pub action: String,
    /// Shell-tokenized parameter string
    #[serde(default)]
    pub params: String,
}

impl ResponseRow {
    pub fn new(description: &str, condition: &str, action: &str, params: &str) -> Self {
        Self {
            description: description.to_string(),
            condition: condition.to_string(),
            action: action.to_string(),
            params: params.to_string(),
        }
    }
}

/// Read every row of a response definition file
pub fn read_response_rows(path: &Path) -> Result<Vec<ResponseRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| Error::malformed_responses(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::malformed_responses(path, e.to_string()))?;
    for required in ["description", "action"] {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::malformed_responses(
                path,
                format!("missing '{required}' column"),
            ));
        }
    }

    reader
        .deserialize()
        .map(|row| row.map_err(|e| Error::malformed_responses(path, e.to_string())))
        .collect()
}

/// A menu item and the actions it runs, in definition order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub description: String,
    pub actions: Vec<Action>,
}

/// Compiled response definitions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMenu {
    entries: Vec<MenuEntry>,
    hotkeys: BTreeMap<char, String>,
}

impl ResponseMenu {
    /// Entries in order of first appearance
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.description.as_str())
    }

    pub fn entry(&self, description: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.description == description)
    }

    /// Actions run for a description, empty if it is not on the menu
    pub fn actions_for(&self, description: &str) -> &[Action] {
        self.entry(description)
            .map(|e| e.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Hotkey bindings, key to description
    pub fn hotkeys(&self) -> &BTreeMap<char, String> {
        &self.hotkeys
    }

    /// Description bound to a hotkey, case-insensitive
    pub fn description_for_key(&self, key: char) -> Option<&str> {
        key.to_lowercase()
            .next()
            .and_then(|k| self.hotkeys.get(&k))
            .map(String::as_str)
    }

    /// Resolve operator input: a single hotkey, or the full description text
    pub fn resolve_choice(&self, input: &str) -> Option<&MenuEntry> {
        let mut chars = input.chars();
        if let (Some(key), None) = (chars.next(), chars.next()) {
            if let Some(description) = self.description_for_key(key) {
                return self.entry(description);
            }
        }
        self.entry(input)
    }

    fn push(&mut self, description: &str, action: Action) {
        match self.entries.iter_mut().find(|e| e.description == description) {
            Some(entry) => entry.actions.push(action),
            None => self.entries.push(MenuEntry {
                description: description.to_string(),
                actions: vec![action],
            }),
        }
    }
}

/// Compile response rows into a menu
///
/// `schema_path` is the scenario table whose columns action parameters may
/// refer to. Rows whose condition is false are validated and then dropped:
/// they contribute neither actions nor hotkeys.
pub fn compile(
    rows: &[ResponseRow],
    conditions: &Conditions,
    store: &ScenarioStore,
    schema_path: &Path,
) -> Result<ResponseMenu> {
    let mut menu = ResponseMenu::default();

    for row in rows {
        let info = get_action(row.action.trim())
            .ok_or_else(|| Error::UnknownAction(row.action.clone()))?;
        let tokens = shlex::split(&row.params).ok_or_else(|| {
            Error::invalid_params(info.name, format!("cannot tokenize '{}'", row.params))
        })?;
        let action = info.prepare(&tokens)?;
        action.verify(store, schema_path)?;

        if !conditions.resolve(&row.condition)? {
            tracing::debug!(
                "Skipping '{}' ({}): condition '{}' is false",
                row.description,
                action,
                row.condition
            );
            continue;
        }

        for key in extract_hotkeys(&row.description).chars() {
            match menu.hotkeys.get(&key) {
                Some(existing) if *existing != row.description => {
                    return Err(Error::HotkeyCollision {
                        key,
                        existing: existing.clone(),
                        conflicting: row.description.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    menu.hotkeys.insert(key, row.description.clone());
                }
            }
        }
        menu.push(&row.description, action);
    }

    Ok(menu)
}

/// Read and compile a response definition file
pub fn compile_file(
    path: &Path,
    conditions: &Conditions,
    store: &ScenarioStore,
    schema_path: &Path,
) -> Result<ResponseMenu> {
    let rows = read_response_rows(path)?;
    let menu = compile(&rows, conditions, store, schema_path)?;
    tracing::debug!(
        "Compiled {} response rows from {} into {} menu entries",
        rows.len(),
        path.display(),
        menu.len()
    );
    Ok(menu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn schema() -> (TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "mode,duration?,result\ns2idle,10,\n").unwrap();
        (dir, path)
    }

    fn compile_rows(rows: &[ResponseRow], conditions: &Conditions) -> Result<ResponseMenu> {
        let (_dir, path) = schema();
        compile(rows, conditions, &ScenarioStore::new(), &path)
    }

    fn write_result(value: &str) -> Action {
        Action::WriteResult {
            column: "result".to_string(),
            result: value.to_string(),
        }
    }

    #[test]
    fn test_single_row_menu() {
        let rows = vec![ResponseRow::new("Passed [p]", "", "write_result", "result, pass")];
        let menu = compile_rows(&rows, &Conditions::new()).unwrap();

        assert_eq!(menu.descriptions().collect::<Vec<_>>(), vec!["Passed [p]"]);
        assert_eq!(menu.actions_for("Passed [p]"), &[write_result("pass")]);
        assert_eq!(menu.description_for_key('p'), Some("Passed [p]"));
        assert_eq!(menu.description_for_key('P'), Some("Passed [p]"));
    }

    #[test]
    fn test_shared_description_combines_actions_in_order() {
        let rows = vec![
            ResponseRow::new("Pass and reboot [r]", "", "write_result", "result, pass"),
            ResponseRow::new("Failed [f]", "", "write_result", "result, fail"),
            ResponseRow::new("Pass and reboot [r]", "", "reboot", ""),
        ];
        let menu = compile_rows(&rows, &Conditions::new()).unwrap();

        assert_eq!(menu.len(), 2);
        assert_eq!(
            menu.actions_for("Pass and reboot [r]"),
            &[write_result("pass"), Action::Reboot]
        );
    }

    #[test]
    fn test_hotkey_collision() {
        let rows = vec![
            ResponseRow::new("Passed [p]", "", "write_result", "result, pass"),
            ResponseRow::new("[P]ending", "", "quit", ""),
        ];
        let err = compile_rows(&rows, &Conditions::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::HotkeyCollision { key: 'p', ref existing, ref conflicting }
                if existing == "Passed [p]" && conflicting == "[P]ending"
        ));
    }

    #[test]
    fn test_false_condition_drops_row_and_hotkeys() {
        let rows = vec![
            ResponseRow::new("Sleep again [s]", IS_CURRENT_BOOT, "reboot", ""),
            ResponseRow::new("[S]kip", "", "quit", ""),
        ];
        // Colliding rows are fine while one of them is switched off
        let menu = compile_rows(&rows, &Conditions::for_boot(false)).unwrap();
        assert_eq!(menu.descriptions().collect::<Vec<_>>(), vec!["[S]kip"]);

        assert!(matches!(
            compile_rows(&rows, &Conditions::for_boot(true)),
            Err(Error::HotkeyCollision { .. })
        ));
    }

    #[test]
    fn test_disabled_rows_are_still_validated() {
        let rows = vec![ResponseRow::new("Bad [b]", IS_CURRENT_BOOT, "write_result", "verdict, pass")];
        assert!(matches!(
            compile_rows(&rows, &Conditions::for_boot(false)),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_unknown_action_and_condition() {
        let rows = vec![ResponseRow::new("Halt [h]", "", "halt", "")];
        assert!(matches!(
            compile_rows(&rows, &Conditions::new()),
            Err(Error::UnknownAction(ref name)) if name == "halt"
        ));

        let rows = vec![ResponseRow::new("Quit [q]", "is_full_moon", "quit", "")];
        assert!(matches!(
            compile_rows(&rows, &Conditions::new()),
            Err(Error::UnknownCondition(ref name)) if name == "is_full_moon"
        ));
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let rows = vec![ResponseRow::new("Note [n]", "", "write_result", "result \"half")];
        assert!(matches!(
            compile_rows(&rows, &Conditions::new()),
            Err(Error::InvalidActionParams { .. })
        ));
    }

    #[test]
    fn test_quoted_result_with_spaces() {
        let rows = vec![ResponseRow::new("Flaky [k]", "", "write_result", "result, \"pass after retry\"")];
        let menu = compile_rows(&rows, &Conditions::new()).unwrap();
        assert_eq!(menu.actions_for("Flaky [k]"), &[write_result("pass after retry")]);
    }

    #[test]
    fn test_resolve_choice() {
        let rows = vec![
            ResponseRow::new("Passed [p]", "", "write_result", "result, pass"),
            ResponseRow::new("Quit", "", "quit", ""),
        ];
        let menu = compile_rows(&rows, &Conditions::new()).unwrap();

        assert_eq!(menu.resolve_choice("p").map(|e| e.description.as_str()), Some("Passed [p]"));
        assert_eq!(menu.resolve_choice("Quit").map(|e| e.description.as_str()), Some("Quit"));
        assert!(menu.resolve_choice("x").is_none());
        assert!(menu.actions_for("Nope").is_empty());
    }

    #[test]
    fn test_empty_file_gives_empty_menu() {
        let (dir, schema) = schema();
        let path = dir.path().join("quick-responses.csv");
        fs::write(&path, "description,condition,action,params\n").unwrap();

        let menu = compile_file(&path, &Conditions::new(), &ScenarioStore::new(), &schema).unwrap();
        assert!(menu.is_empty());
    }

    #[test]
    fn test_read_rows_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quick-responses.csv");
        fs::write(
            &path,
            "description,condition,action,params\n\
             Passed [p],,write_result,\"result, pass\"\n\
             Reboot [r],is_current_boot,reboot,\n",
        )
        .unwrap();

        let rows = read_response_rows(&path).unwrap();
        assert_eq!(
            rows,
            vec![
                ResponseRow::new("Passed [p]", "", "write_result", "result, pass"),
                ResponseRow::new("Reboot [r]", "is_current_boot", "reboot", ""),
            ]
        );
    }

    #[test]
    fn test_params_column_is_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quick-responses.csv");
        fs::write(&path, "description,condition,action\nQuit [q],,quit\n").unwrap();

        let rows = read_response_rows(&path).unwrap();
        assert_eq!(rows, vec![ResponseRow::new("Quit [q]", "", "quit", "")]);
    }

    #[test]
    fn test_missing_description_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quick-responses.csv");
        fs::write(&path, "label,action\nQuit,quit\n").unwrap();

        assert!(matches!(
            read_response_rows(&path),
            Err(Error::MalformedResponseFile { .. })
        ));
    }
}
