//! Isolated environment for binary tests: a temp directory holding the
//! config file, the database and the maintenance marker, wired to the
//! module binary through `BILLMOD_CONF`.

use assert_cmd::Command;
use billmod_store::Store;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestPanel {
    temp: TempDir,
    conf_path: PathBuf,
    db_path: PathBuf,
    marker_path: PathBuf,
}

impl Default for TestPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPanel {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let db_path = temp.path().join("billing.db");
        let marker_path = temp.path().join("maintenance");
        let conf_path = temp.path().join("billmod.toml");
        let conf = format!(
            "db_path = \"{}\"\nmaintenance_marker = \"{}\"\n",
            db_path.display(),
            marker_path.display()
        );
        std::fs::write(&conf_path, conf).expect("write config");
        TestPanel {
            temp,
            conf_path,
            db_path,
            marker_path,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn conf_path(&self) -> &Path {
        &self.conf_path
    }

    /// Open the panel database, creating the schema on first use. Drop the
    /// handle before invoking the binary.
    pub fn store(&self) -> Store {
        Store::open(&self.db_path).expect("open store")
    }

    /// Seed the standard fleet from [`crate::fixtures`].
    pub fn seed(&self) -> &Self {
        let store = self.store();
        crate::fixtures::seed(&store);
        self
    }

    pub fn enable_maintenance(&self) -> &Self {
        std::fs::write(&self.marker_path, "").expect("maintenance marker");
        self
    }

    /// Command for the given module binary with this panel's config.
    pub fn command(&self, bin: &str) -> Command {
        let mut cmd = Command::cargo_bin(bin).expect("module binary");
        cmd.env("BILLMOD_CONF", &self.conf_path);
        cmd.current_dir(self.temp.path());
        cmd
    }
}
