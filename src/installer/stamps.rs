//! Per-phase stamp files.
//!
//! A completed phase leaves `<binaryRoot>/<name>/stamp/<name>-<phase>.stamp`
//! holding the phase's fingerprint. On the next run the phase is skipped
//! only if the stamp's fingerprint matches the freshly planned one and
//! every earlier phase was skipped too; otherwise it runs again and all
//! later stamps are discarded.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::resolver::{BuildTask, Phase};
use crate::utils::fs::safe_write;

/// Contents of a stamp file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stamp {
    pub fingerprint: String,
    pub completed_at: DateTime<Utc>,
}

/// Read a stamp; missing or unreadable stamps count as absent.
#[must_use]
pub fn read_stamp(path: &Path) -> Option<Stamp> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(stamp) => Some(stamp),
        Err(e) => {
            tracing::debug!("Ignoring unreadable stamp {}: {}", path.display(), e);
            None
        }
    }
}

/// Whether `phase` of `task` completed with the same description before.
#[must_use]
pub fn is_current(task: &BuildTask, phase: Phase) -> bool {
    read_stamp(&task.layout.stamp_file(&task.name, phase))
        .is_some_and(|stamp| stamp.fingerprint == task.fingerprint(phase))
}

/// Record that `phase` of `task` completed.
///
/// # Errors
///
/// Fails if the stamp cannot be written.
pub fn write_stamp(task: &BuildTask, phase: Phase) -> Result<()> {
    let stamp = Stamp {
        fingerprint: task.fingerprint(phase).to_string(),
        completed_at: Utc::now(),
    };
    let path = task.layout.stamp_file(&task.name, phase);
    let content = serde_json::to_string_pretty(&stamp).context("Failed to serialize stamp")?;
    safe_write(&path, &content)
        .with_context(|| format!("Failed to write stamp {}", path.display()))
}

/// Remove the stamps of `phase` and every later phase.
///
/// # Errors
///
/// Fails if an existing stamp cannot be removed.
pub fn invalidate_from(task: &BuildTask, phase: Phase) -> Result<()> {
    for later in Phase::ALL.iter().filter(|p| **p >= phase) {
        let path = task.layout.stamp_file(&task.name, *later);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed stamp {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to remove stamp {}", path.display()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::task::PhasePlan;
    use crate::resolver::{ArgumentList, RunPaths};
    use tempfile::tempdir;

    fn task(root: &Path, configure_fingerprint: &str) -> BuildTask {
        let paths = RunPaths {
            binary_root: root.join("build"),
            install_root: root.join("install"),
            default_install_root: root.join("install"),
        };
        BuildTask {
            name: "zlib".to_string(),
            prerequisites: Vec::new(),
            layout: paths.layout("zlib"),
            arguments: ArgumentList::new(),
            prebuilt: false,
            phases: Phase::ALL
                .iter()
                .map(|&phase| PhasePlan {
                    phase,
                    steps: Vec::new(),
                    fingerprint: if phase == Phase::Configure {
                        configure_fingerprint.to_string()
                    } else {
                        format!("{phase}-fp")
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_stamp_roundtrip_and_mismatch() {
        let temp = tempdir().unwrap();
        let original = task(temp.path(), "aaa");
        assert!(!is_current(&original, Phase::Configure));

        write_stamp(&original, Phase::Configure).unwrap();
        assert!(is_current(&original, Phase::Configure));
        assert!(original.layout.stamp_dir.join("zlib-configure.stamp").exists());

        let changed = task(temp.path(), "bbb");
        assert!(!is_current(&changed, Phase::Configure));
    }

    #[test]
    fn test_invalidate_from_removes_later_stamps() {
        let temp = tempdir().unwrap();
        let task = task(temp.path(), "aaa");
        for phase in Phase::ALL {
            write_stamp(&task, phase).unwrap();
        }

        invalidate_from(&task, Phase::Build).unwrap();
        assert!(is_current(&task, Phase::Fetch));
        assert!(is_current(&task, Phase::Configure));
        assert!(!is_current(&task, Phase::Build));
        assert!(!is_current(&task, Phase::Install));

        // Nothing left to remove is fine
        invalidate_from(&task, Phase::Build).unwrap();
    }

    #[test]
    fn test_corrupt_stamp_is_absent() {
        let temp = tempdir().unwrap();
        let task = task(temp.path(), "aaa");
        let path = task.layout.stamp_file("zlib", Phase::Fetch);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(!is_current(&task, Phase::Fetch));
    }
}
