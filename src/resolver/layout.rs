//! Filesystem locations of one dependency.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::constants::SOURCES_DIR;
use crate::resolver::task::Phase;

/// Roots shared by every dependency in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPaths {
    /// Intermediate build root (`-B`, default `<project>/build`)
    pub binary_root: PathBuf,
    /// Install root in effect for this run
    pub install_root: PathBuf,
    /// Default install root; differs from `install_root` when the operator chose one
    pub default_install_root: PathBuf,
}

impl RunPaths {
    /// Where fetched sources go, `<binaryRoot>/_sources`.
    #[must_use]
    pub fn source_root(&self) -> PathBuf {
        self.binary_root.join(SOURCES_DIR)
    }

    /// Layout of the dependency called `name`.
    #[must_use]
    pub fn layout(&self, name: &str) -> InstallLayout {
        InstallLayout::resolve(name, &self.source_root(), &self.binary_root, &self.install_root)
    }
}

/// Every location a dependency reads or writes, each namespaced by its name.
///
/// ```text
/// <binaryRoot>/_sources/<name>        fetched source
/// <binaryRoot>/<name>/tmp             downloads, phase logs
/// <binaryRoot>/<name>/stamp           per-phase stamps
/// <binaryRoot>/<name>/build           build tree
/// <installRoot>/<name>                final install
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallLayout {
    pub source_dir: PathBuf,
    /// `<binaryRoot>/<name>`, parent of tmp, stamp and build
    pub binary_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub stamp_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
}

impl InstallLayout {
    #[must_use]
    pub fn resolve(name: &str, source_root: &Path, binary_root: &Path, install_root: &Path) -> Self {
        let binary_dir = binary_root.join(name);
        Self {
            source_dir: source_root.join(name),
            tmp_dir: binary_dir.join("tmp"),
            stamp_dir: binary_dir.join("stamp"),
            build_dir: binary_dir.join("build"),
            binary_dir,
            install_dir: install_root.join(name),
        }
    }

    /// Captured output of `phase`, `<tmp>/<name>-<phase>.log`.
    #[must_use]
    pub fn log_file(&self, name: &str, phase: Phase) -> PathBuf {
        self.tmp_dir.join(format!("{name}-{phase}.log"))
    }

    /// Stamp recording that `phase` completed, `<stamp>/<name>-<phase>.stamp`.
    #[must_use]
    pub fn stamp_file(&self, name: &str, phase: Phase) -> PathBuf {
        self.stamp_dir.join(format!("{name}-{phase}.stamp"))
    }
}
