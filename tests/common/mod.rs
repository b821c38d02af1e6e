#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch project with its own `harness.toml` and an isolated HOME.
pub struct Project {
    tmp: TempDir,
    home: PathBuf,
}

impl Project {
    pub fn new(config: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");

        let project = Self { tmp, home };
        project.write("project/harness.toml", config);
        project
    }

    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("project")
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.tmp.path().join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create parent dirs");
        fs::write(&path, content).expect("write fixture");
        path
    }

    /// Writes a file relative to the project root.
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        self.write(&format!("project/{}", rel), content)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).exists()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("harness").expect("binary built");
        cmd.env("HOME", &self.home)
            .env_remove("RUST_LOG")
            .current_dir(self.root());
        cmd
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}
