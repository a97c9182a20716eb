//! Throwaway git repositories for tests.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::Command;

/// A repository driven through the `git` binary.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// `git init` on branch `main`, with a local test identity.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        self.run_git_command(&["symbolic-ref", "HEAD", "refs/heads/main"], "Failed to select branch main")?;
        self.run_git_command(
            &["config", "user.email", "test@stackyard.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        Ok(())
    }

    /// Write `content` to `relative` inside the repository, creating parents.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Stage everything and commit.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// `git+file://...` location of `relative` in this repository.
    pub fn source_location(&self, relative: &str, reference: Option<&str>) -> String {
        let mut location = format!("git+file://{}//{}", self.repo_path.display(), relative);
        if let Some(reference) = reference {
            location.push_str("?ref=");
            location.push_str(reference);
        }
        location
    }
}
