//! Shared helpers for the integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stackyard::test_utils::ManifestFixture;

/// A temporary directory holding manifests and an isolated config file.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config").join("config.toml")
    }

    pub async fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    pub async fn write_fixture(&self, fixture: &ManifestFixture) -> PathBuf {
        self.write(&fixture.name, &fixture.content).await
    }

    pub async fn write_config(&self, content: &str) -> PathBuf {
        let path = self.config_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    /// `stackyard` running in this project with its own config and no colors.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("stackyard").unwrap();
        cmd.current_dir(self.dir.path())
            .env("STACKYARD_CONFIG", self.config_path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("STACKYARD_TEST_STAGE");
        cmd
    }
}
