use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::common::config::Config;
use crate::common::paths::Layout;
use crate::lifecycle::TestTree;
use crate::scenario::ScenarioStore;
use crate::system::BootId;

/// Template name every fixture uses
pub const FIXTURE_TEMPLATE: &str = "power";

/// Temporary workspace root with one template installed
///
/// The directory is removed when the fixture is dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Install `scenarios.csv` and `quick-responses.csv` for the fixture
    /// template
    pub fn new(scenarios_csv: &str, responses_csv: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let workspace = Self { dir };
        let layout = workspace.layout();
        fs::create_dir_all(layout.template_dir(FIXTURE_TEMPLATE))
            .expect("Failed to create template dir");
        fs::write(layout.scenarios_file(FIXTURE_TEMPLATE), scenarios_csv)
            .expect("Failed to write scenarios");
        fs::write(layout.responses_file(FIXTURE_TEMPLATE), responses_csv)
            .expect("Failed to write responses");
        workspace
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.root())
    }

    /// Configuration rooted at the fixture with every host tool disabled
    pub fn config(&self) -> Config {
        let mut config = Config {
            root: self.root().to_path_buf(),
            template: FIXTURE_TEMPLATE.to_string(),
            ..Config::default()
        };
        config.sleep.enabled = false;
        config.notify.enabled = false;
        config.reboot.enabled = false;
        config
    }

    /// Write a `bootrun.toml` equivalent to [`Workspace::config`] at the root
    ///
    /// The root is left relative so the binary resolves it from its working
    /// directory.
    pub fn write_config_file(&self) -> PathBuf {
        let path = self.root().join("bootrun.toml");
        let content = format!(
            "template = \"{FIXTURE_TEMPLATE}\"\nroot = \".\"\n\n\
             [sleep]\nenabled = false\n\n\
             [notify]\nenabled = false\n\n\
             [reboot]\nenabled = false\n"
        );
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    pub fn tree(&self) -> TestTree {
        TestTree::new(&self.layout())
    }

    pub fn scenarios_file(&self) -> PathBuf {
        self.layout().scenarios_file(FIXTURE_TEMPLATE)
    }

    pub fn responses_file(&self) -> PathBuf {
        self.layout().responses_file(FIXTURE_TEMPLATE)
    }

    /// Enroll every template row as a pending test
    pub fn enroll(&self) -> Vec<PathBuf> {
        let store = ScenarioStore::new();
        let rows = store
            .read_rows(&self.scenarios_file())
            .expect("Failed to read scenarios");
        let headers = rows.headers().to_vec();
        self.tree()
            .enroll_batch(FIXTURE_TEMPLATE, &headers, rows, &store)
            .expect("Failed to enroll")
    }

    /// Enroll the template and claim the first test for `boot_id`
    pub fn enroll_and_claim(&self, boot_id: &str) -> PathBuf {
        self.enroll();
        let boot_id = BootId::parse(boot_id).expect("Invalid boot id");
        self.tree().claim_next(&boot_id).expect("Failed to claim")
    }
}
