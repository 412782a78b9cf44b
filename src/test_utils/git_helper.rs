//! Git test helper utilities
//!
//! Builds small local repositories that repository locators can point at.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command builder for tests
///
/// Every command runs with a fixed identity so commits work on machines
/// without a global git config.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(["-c", "user.name=Test User", "-c", "user.email=test@superbuild.example"])
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Initialize a repository holding `files` in a single commit
    pub fn init_with_files(&self, files: &[(&str, &str)]) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        for (name, content) in files {
            self.write_file(name, content)?;
        }
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        self.run_git_command(&["commit", "--quiet", "-m", "initial"], "Failed to create git commit")?;
        Ok(())
    }

    /// Create a lightweight tag at HEAD
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {}", tag_name))?;
        Ok(())
    }

    /// Write `name` and commit it
    pub fn commit_file(&self, name: &str, content: &str) -> Result<()> {
        self.write_file(name, content)?;
        self.run_git_command(&["add", name], "Failed to add file to git")?;
        self.run_git_command(
            &["commit", "--quiet", "-m", &format!("update {name}")],
            "Failed to create git commit",
        )?;
        Ok(())
    }

    /// Get the current HEAD commit
    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get HEAD commit")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn write_file(&self, name: &str, content: &str) -> Result<()> {
        let path = self.repo_path.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}
