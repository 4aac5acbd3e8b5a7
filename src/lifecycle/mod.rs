//! Test directory state machine
//!
//! A test is a directory, and its state is the root that contains it:
//!
//! ```text
//! runtime/pending/1-power--mode-s2idle/                Pending
//! runtime/running/1-power--mode-s2idle--<boot-id>/     Running
//! results/1-power--mode-s2idle--<boot-id>/             Completed
//! ```
//!
//! Every transition is a single `rename(2)` within one filesystem, so a
//! process killed at any point (typically by the reboot under test) leaves the
//! directory entirely in its old root or entirely in its new one. A discarded
//! test is deleted instead of being moved to the results root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::actions::RunContext;
use crate::common::paths::{Layout, BOOT_ID_FILE, PREFIX_FILE, SCENARIO_FILE};
use crate::common::{Error, Result};
use crate::scenario::{ScenarioRecord, ScenarioStore};
use crate::system::BootId;

/// Separates name segments: template from fields, fields from boot id
const SEGMENT_SEPARATOR: &str = "--";

/// The three roots a test directory moves between
#[derive(Debug, Clone)]
pub struct TestTree {
    pending: PathBuf,
    running: PathBuf,
    staging: PathBuf,
    results: PathBuf,
}

impl TestTree {
    pub fn new(layout: &Layout) -> Self {
        Self {
            pending: layout.pending_dir(),
            running: layout.running_dir(),
            staging: layout.staging_dir(),
            results: layout.results_dir(),
        }
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending
    }

    pub fn running_dir(&self) -> &Path {
        &self.running
    }

    pub fn results_dir(&self) -> &Path {
        &self.results
    }

    /// True if at least one test waits in the pending root
    pub fn pending_exists(&self) -> Result<bool> {
        dir_has_entries(&self.pending)
    }

    /// True if at least one test sits in the running root
    pub fn running_exists(&self) -> Result<bool> {
        dir_has_entries(&self.running)
    }

    /// Pending tests, oldest ordinal first
    pub fn pending_tests(&self) -> Result<Vec<PathBuf>> {
        list_tests(&self.pending)
    }

    /// Running tests, oldest ordinal first
    pub fn running_tests(&self) -> Result<Vec<PathBuf>> {
        list_tests(&self.running)
    }

    /// Completed tests in the results root
    pub fn completed_tests(&self) -> Result<Vec<PathBuf>> {
        list_tests(&self.results)
    }

    /// Materialize one pending directory per template row
    ///
    /// Refuses to run while any pending test remains. The whole batch is
    /// assembled in a staging root, which then becomes the pending root; if
    /// any row fails nothing reaches the pending root.
    pub fn enroll_batch<I>(
        &self,
        template: &str,
        headers: &[String],
        rows: I,
        store: &ScenarioStore,
    ) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = Result<ScenarioRecord>>,
    {
        if self.pending_exists()? {
            return Err(Error::PendingTestsExist(self.pending.clone()));
        }

        if self.staging.exists() {
            tracing::warn!("Removing leftover staging directory {}", self.staging.display());
            fs::remove_dir_all(&self.staging)?;
        }
        fs::create_dir_all(&self.staging)?;

        let staged = match self.stage_batch(template, headers, rows, store) {
            Ok(staged) => staged,
            Err(e) => {
                let _ = fs::remove_dir_all(&self.staging);
                return Err(e);
            }
        };

        // Pending is empty here; one rename publishes the whole batch
        if self.pending.exists() {
            fs::remove_dir(&self.pending)?;
        }
        fs::rename(&self.staging, &self.pending)?;

        Ok(staged
            .into_iter()
            .map(|name| {
                tracing::info!("Enrolled {}", name);
                self.pending.join(name)
            })
            .collect())
    }

    fn stage_batch<I>(
        &self,
        template: &str,
        headers: &[String],
        rows: I,
        store: &ScenarioStore,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = Result<ScenarioRecord>>,
    {
        let mut staged = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let row = row?;
            let prefix = format!("{}-{}", index + 1, template);
            let name = format!("{prefix}{SEGMENT_SEPARATOR}{}", row.directory_fragment());

            let dir = self.staging.join(&name);
            fs::create_dir(&dir)?;
            store.write_row(&dir.join(SCENARIO_FILE), headers, &row)?;
            fs::write(dir.join(PREFIX_FILE), &prefix)?;
            staged.push(name);
        }
        Ok(staged)
    }

    /// Move the next pending test into the running root, bound to `boot_id`
    ///
    /// The rename is the commit point: once it has happened the test is
    /// running, and a later invocation resumes it. The boot id sidecar is
    /// written afterwards and can be recovered from the name if it is lost.
    pub fn claim_next(&self, boot_id: &BootId) -> Result<PathBuf> {
        let next = self
            .pending_tests()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoPendingTests(self.pending.clone()))?;
        let name = file_name(&next)?;

        fs::create_dir_all(&self.running)?;
        let dest = self
            .running
            .join(format!("{name}{SEGMENT_SEPARATOR}{boot_id}"));
        fs::rename(&next, &dest)?;
        tracing::info!("Claimed {} for boot {}", name, boot_id);

        write_boot_id(&dest, boot_id)?;
        Ok(dest)
    }
}

/// Move a running test into the results root, at most once per context
///
/// Does nothing when the context is already finalized. When the directory is
/// gone (it was discarded) the context is marked finalized without a move.
/// Returns the new location when a move happened.
pub fn finalize(ctx: &mut RunContext<'_>) -> Result<Option<PathBuf>> {
    if ctx.is_finalized() {
        tracing::debug!("{} already finalized", ctx.test_directory.display());
        return Ok(None);
    }

    if !ctx.test_directory.is_dir() {
        tracing::warn!(
            "{} no longer exists, nothing to finalize",
            ctx.test_directory.display()
        );
        ctx.mark_finalized();
        return Ok(None);
    }

    fs::create_dir_all(&ctx.results_dir)?;
    let dest = ctx.results_dir.join(file_name(&ctx.test_directory)?);
    if dest.exists() {
        return Err(Error::Internal(format!(
            "Cannot finalize {}: {} already exists",
            ctx.test_directory.display(),
            dest.display()
        )));
    }
    fs::rename(&ctx.test_directory, &dest)?;
    ctx.mark_finalized();
    tracing::info!("Finalized test into {}", dest.display());
    Ok(Some(dest))
}

/// Boot id a running test is bound to
///
/// Falls back to the name suffix when the sidecar is missing or empty, and
/// rewrites the sidecar in that case.
pub fn read_boot_id(test_dir: &Path) -> Result<BootId> {
    let sidecar = test_dir.join(BOOT_ID_FILE);
    match fs::read_to_string(&sidecar) {
        Ok(raw) => {
            if let Some(id) = BootId::parse(&raw) {
                return Ok(id);
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::file_read(&sidecar, e)),
    }

    let name = file_name(test_dir)?;
    let id = name
        .rsplit_once(SEGMENT_SEPARATOR)
        .and_then(|(_, suffix)| BootId::parse(suffix))
        .ok_or_else(|| Error::MissingBootId(test_dir.to_path_buf()))?;
    tracing::warn!("Recovered boot id {} from directory name {}", id, name);
    write_boot_id(test_dir, &id)?;
    Ok(id)
}

/// Prefix for log file names inside a test directory
pub fn read_prefix(test_dir: &Path) -> Result<String> {
    match fs::read_to_string(test_dir.join(PREFIX_FILE)) {
        Ok(prefix) if !prefix.trim().is_empty() => return Ok(prefix.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::file_read(&test_dir.join(PREFIX_FILE), e)),
    }
    let name = file_name(test_dir)?;
    Ok(name
        .split(SEGMENT_SEPARATOR)
        .next()
        .unwrap_or(name.as_str())
        .to_string())
}

fn write_boot_id(test_dir: &Path, boot_id: &BootId) -> Result<()> {
    fs::write(test_dir.join(BOOT_ID_FILE), boot_id.as_str())?;
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Internal(format!("Not a test directory: {}", path.display())))
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Leading `<n>-` ordinal of a test directory name
fn ordinal(name: &str) -> Option<u64> {
    name.split_once('-')
        .and_then(|(head, _)| head.parse().ok())
}

/// Test directories under `root`, ordered by ordinal then name
///
/// Plain lexicographic order would put `10-...` before `2-...`.
fn list_tests(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut tests = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            tests.push(entry.path());
        }
    }
    tests.sort_by_cached_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (ordinal(&name).unwrap_or(u64::MAX), name)
    });
    Ok(tests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn headers() -> Vec<String> {
        vec!["mode".to_string(), "duration?".to_string(), "result".to_string()]
    }

    fn row(mode: &str) -> Result<ScenarioRecord> {
        Ok(ScenarioRecord::from_row(&headers(), &[mode, "10", ""]))
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| file_name(p).unwrap()).collect()
    }

    #[test]
    fn test_enroll_names_and_contents() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        let store = ScenarioStore::new();

        let enrolled = tree
            .enroll_batch("power", &headers(), vec![row("s2idle"), row("Deep Sleep")], &store)
            .unwrap();
        assert_eq!(
            names(&enrolled),
            vec!["1-power--mode-s2idle__result-", "2-power--mode-deep_sleep__result-"]
        );

        let first = &enrolled[0];
        assert_eq!(read_prefix(first).unwrap(), "1-power");
        let scenario = store.read_single_row(&first.join(SCENARIO_FILE), false).unwrap();
        assert_eq!(scenario.get("duration?"), Some("10"));
        assert!(!dir.path().join("runtime").join(".staging").exists());
    }

    #[test]
    fn test_enroll_refuses_to_layer_batches() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        let store = ScenarioStore::new();

        let first = tree
            .enroll_batch("power", &headers(), vec![row("s2idle")], &store)
            .unwrap();
        let err = tree
            .enroll_batch("power", &headers(), vec![row("deep")], &store)
            .unwrap_err();
        assert!(matches!(err, Error::PendingTestsExist(_)));
        assert_eq!(tree.pending_tests().unwrap(), first);
    }

    #[test]
    fn test_enroll_failure_leaves_pending_empty() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        let rows = vec![
            row("s2idle"),
            Err(Error::malformed_scenario(Path::new("scenarios.csv"), "bad row")),
        ];

        assert!(tree
            .enroll_batch("power", &headers(), rows, &ScenarioStore::new())
            .is_err());
        assert!(!tree.pending_exists().unwrap());
    }

    #[test]
    fn test_claim_next_is_fifo_by_ordinal() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        let rows: Vec<_> = (0..11).map(|i| row(&format!("m{i}"))).collect();
        tree.enroll_batch("power", &headers(), rows, &ScenarioStore::new())
            .unwrap();

        let boot = BootId::parse("b00t").unwrap();
        let first = tree.claim_next(&boot).unwrap();
        assert_eq!(file_name(&first).unwrap(), "1-power--mode-m0__result---b00t");
        assert_eq!(read_boot_id(&first).unwrap(), boot);

        let pending = names(&tree.pending_tests().unwrap());
        assert_eq!(pending.first().map(String::as_str), Some("2-power--mode-m1__result-"));
        assert_eq!(pending.last().map(String::as_str), Some("11-power--mode-m10__result-"));
    }

    #[test]
    fn test_claim_with_nothing_pending() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        assert!(matches!(
            tree.claim_next(&BootId::parse("b00t").unwrap()),
            Err(Error::NoPendingTests(_))
        ));
    }

    #[test]
    fn test_boot_id_recovered_from_name() {
        let dir = tempdir().unwrap();
        let test_dir = dir.path().join("1-power--mode-s2idle--cafe01");
        fs::create_dir_all(&test_dir).unwrap();

        assert_eq!(read_boot_id(&test_dir).unwrap().as_str(), "cafe01");
        assert_eq!(fs::read_to_string(test_dir.join(BOOT_ID_FILE)).unwrap(), "cafe01");
    }

    #[test]
    fn test_prefix_falls_back_to_name() {
        let dir = tempdir().unwrap();
        let test_dir = dir.path().join("3-power--mode-deep--cafe01");
        fs::create_dir_all(&test_dir).unwrap();
        assert_eq!(read_prefix(&test_dir).unwrap(), "3-power");
    }

    #[test]
    fn test_claim_moves_between_roots() {
        let dir = tempdir().unwrap();
        let tree = TestTree::new(&Layout::new(dir.path()));
        tree.enroll_batch("power", &headers(), vec![row("s2idle"), row("deep")], &ScenarioStore::new())
            .unwrap();
        let running = tree.claim_next(&BootId::parse("b00t").unwrap()).unwrap();

        assert_eq!(names(&tree.pending_tests().unwrap()), vec!["2-power--mode-deep__result-"]);
        assert_eq!(tree.running_tests().unwrap(), vec![running]);
        assert!(tree.running_exists().unwrap());
        assert!(tree.completed_tests().unwrap().is_empty());
    }

    #[test]
    fn test_enroll_replaces_empty_pending_root_whole() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        fs::create_dir_all(layout.pending_dir()).unwrap();
        let tree = TestTree::new(&layout);

        let enrolled = tree
            .enroll_batch("power", &headers(), vec![row("s2idle"), row("deep")], &ScenarioStore::new())
            .unwrap();
        assert_eq!(tree.pending_tests().unwrap(), enrolled);
        assert!(enrolled.iter().all(|p| p.join(SCENARIO_FILE).is_file()));
        assert!(!layout.staging_dir().exists());
    }
}
