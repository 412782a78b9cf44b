//! Common utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{BuildSettings, Definition, SettingsStore};
use crate::constants::DEFAULT_BINARY_DIR;
use crate::manifest::{Manifest, find_manifest_with_optional};
use crate::resolver::{Plan, build_plan};
use crate::utils::platform::absolutize;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub manifest_path: Option<PathBuf>,
    pub binary_dir: Option<PathBuf>,
    pub definitions: Vec<Definition>,
    pub unsets: Vec<String>,
    pub quiet: bool,
    pub no_progress: bool,
}

/// Manifest, project and binary root for one invocation.
#[derive(Debug)]
pub struct CommandContext {
    /// Parsed project manifest (superbuild.toml)
    pub manifest: Manifest,
    /// Absolute path to the manifest file
    pub manifest_path: PathBuf,
    /// Project root directory (containing superbuild.toml)
    pub project_dir: PathBuf,
    /// Where intermediate build state and the settings store live
    pub binary_root: PathBuf,
}

impl CommandContext {
    /// Locate and load the manifest, and resolve the binary root.
    ///
    /// Relative `--build-dir` values resolve against the current directory;
    /// without one the binary root is `<project>/build`.
    ///
    /// # Errors
    /// Returns an error if no manifest is found or it fails validation
    pub fn load(options: &GlobalOptions) -> Result<Self> {
        let cwd = std::env::current_dir().context("Cannot determine current working directory")?;
        let manifest_path = absolutize(
            &cwd,
            &find_manifest_with_optional(options.manifest_path.clone())?,
        );
        let binary_root = options.binary_dir.as_deref().map(|dir| absolutize(&cwd, dir));
        Self::from_manifest_path(&manifest_path, binary_root)
    }

    /// Create a context from an absolute manifest path.
    ///
    /// # Errors
    /// Returns an error if the manifest file doesn't exist or cannot be read
    pub fn from_manifest_path(manifest_path: &Path, binary_root: Option<PathBuf>) -> Result<Self> {
        if !manifest_path.exists() {
            return Err(anyhow::anyhow!("Manifest file {} not found", manifest_path.display()));
        }

        let project_dir = manifest_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid manifest path"))?
            .to_path_buf();

        let manifest = Manifest::load(manifest_path).with_context(|| {
            format!("Failed to load manifest file: {}", manifest_path.display())
        })?;

        let binary_root = binary_root.unwrap_or_else(|| project_dir.join(DEFAULT_BINARY_DIR));
        tracing::debug!(
            "Project {} with binary root {}",
            project_dir.display(),
            binary_root.display()
        );

        Ok(Self {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            project_dir,
            binary_root,
        })
    }

    /// Load the settings store and fold in this invocation's definitions.
    ///
    /// Nothing is written; call [`SettingsStore::save`] to persist.
    ///
    /// # Errors
    /// Unparseable store or non-boolean toggle values
    pub fn store_with(&self, options: &GlobalOptions) -> Result<SettingsStore> {
        let mut store = SettingsStore::load(&self.binary_root)?;
        store.apply(&options.definitions, &options.unsets, &self.manifest)?;
        for key in store.prune(&self.manifest) {
            tracing::info!("Forgetting {}: no longer declared in the manifest", key);
        }
        Ok(store)
    }

    /// Build settings derived from the store's definitions.
    ///
    /// # Errors
    /// Invalid paths or build job counts
    pub fn settings(&self, store: &SettingsStore) -> Result<BuildSettings> {
        BuildSettings::from_definitions(&store.definitions, &self.project_dir)
    }

    /// Store, settings and plan for this invocation.
    ///
    /// # Errors
    /// Any configuration or plan error
    pub fn plan(&self, options: &GlobalOptions) -> Result<(SettingsStore, Plan)> {
        let store = self.store_with(options)?;
        let settings = self.settings(&store)?;
        let plan = build_plan(&self.manifest, &settings, &store, &self.binary_root)?;
        Ok((store, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_manifest;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"
        [[dependency]]
        name = "zlib"
        url = "vendor/zlib.tar.gz"
    "#;

    #[test]
    fn test_default_binary_root() {
        let temp = tempdir().unwrap();
        let path = write_manifest(temp.path(), MANIFEST).unwrap();

        let ctx = CommandContext::from_manifest_path(&path, None).unwrap();
        assert_eq!(ctx.binary_root, temp.path().join("build"));
        assert_eq!(ctx.project_dir, temp.path());
        assert!(ctx.manifest.get("zlib").is_some());
    }

    #[test]
    fn test_store_with_does_not_write() {
        let temp = tempdir().unwrap();
        let path = write_manifest(temp.path(), MANIFEST).unwrap();
        let ctx = CommandContext::from_manifest_path(&path, Some(temp.path().join("out"))).unwrap();

        let options = GlobalOptions {
            definitions: vec![Definition::new("SUPERBUILD_zlib", "OFF")],
            ..GlobalOptions::default()
        };
        let store = ctx.store_with(&options).unwrap();
        assert_eq!(store.toggles.get("zlib"), Some(&false));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_missing_manifest() {
        let temp = tempdir().unwrap();
        let err = CommandContext::from_manifest_path(&temp.path().join("superbuild.toml"), None)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
