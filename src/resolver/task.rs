//! Four-phase task descriptors.
//!
//! A [`BuildTask`] describes everything the installer does for one enabled
//! dependency, as ordered [`Step`]s per [`Phase`]. Descriptors are plain
//! data: nothing here touches the filesystem, so a plan can be printed
//! without executing it, and each phase's description hashes into the
//! fingerprint its stamp file records.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BuildSettings;
use crate::core::SuperbuildError;
use crate::manifest::{DependencySpec, SourceLocator, StepCommand};
use crate::resolver::arguments::ArgumentList;
use crate::resolver::layout::InstallLayout;
use crate::resolver::templates::{StepContext, StepRenderer};
use crate::utils::platform::get_cmake_command;

/// Lifecycle phases, run strictly in this order for one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Fetch,
    Configure,
    Build,
    Install,
}

impl Phase {
    pub const ALL: [Self; 4] = [Self::Fetch, Self::Configure, Self::Build, Self::Install];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
        }
    }

    /// Progress label while the phase runs.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Fetch => "Fetching",
            Self::Configure => "Configuring",
            Self::Build => "Building",
            Self::Install => "Installing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sub-step of a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Download (or copy) an archive into `scratch` and extract it into `destination`
    DownloadArchive {
        url: String,
        scratch: PathBuf,
        destination: PathBuf,
    },
    /// Clone `address` into `destination` and check out `revision` with submodules
    GitCheckout {
        address: String,
        revision: String,
        destination: PathBuf,
    },
    /// Run an external program
    Command {
        program: String,
        args: Vec<String>,
        cwd: PathBuf,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    /// Flat directory copy
    CopyTree {
        from: PathBuf,
        to: PathBuf,
    },
}

impl Step {
    /// One-line description for plans and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::DownloadArchive {
                url,
                destination,
                ..
            } => format!("download {url} -> {}", destination.display()),
            Self::GitCheckout {
                address,
                revision,
                destination,
            } => format!("git checkout {address}@{revision} -> {}", destination.display()),
            Self::Command {
                program,
                args,
                ..
            } => std::iter::once(program.as_str())
                .chain(args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            Self::CopyTree {
                from,
                to,
            } => format!("copy {} -> {}", from.display(), to.display()),
        }
    }
}

/// Steps and fingerprint of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhasePlan {
    pub phase: Phase,
    pub steps: Vec<Step>,
    /// SHA-256 over this phase's description chained with the previous phase's fingerprint
    pub fingerprint: String,
}

/// Everything needed to take one dependency from nothing to installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTask {
    pub name: String,
    /// Tasks that must finish installing before this one starts fetching
    pub prerequisites: Vec<String>,
    pub layout: InstallLayout,
    /// Configure arguments in final order
    pub arguments: ArgumentList,
    /// Installed from a pre-built archive
    pub prebuilt: bool,
    /// Fetch, configure, build and install, in that order
    pub phases: Vec<PhasePlan>,
}

impl BuildTask {
    /// Steps of `phase`.
    #[must_use]
    pub fn steps(&self, phase: Phase) -> &[Step] {
        self.phase(phase).map_or(&[], |p| p.steps.as_slice())
    }

    #[must_use]
    pub fn phase(&self, phase: Phase) -> Option<&PhasePlan> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Fingerprint recorded in `phase`'s stamp.
    #[must_use]
    pub fn fingerprint(&self, phase: Phase) -> &str {
        self.phase(phase).map_or("", |p| p.fingerprint.as_str())
    }
}

/// Inputs of [`build_task`].
pub struct TaskInputs<'a> {
    pub spec: &'a DependencySpec,
    pub settings: &'a BuildSettings,
    pub layout: InstallLayout,
    pub arguments: ArgumentList,
    /// `;`-joined install locations of every transitive prerequisite
    pub prefix_path: String,
}

/// Build the task descriptor of an enabled dependency.
///
/// # Errors
///
/// [`SuperbuildError::InvalidDependency`] when a custom step template
/// cannot be rendered.
pub fn build_task(inputs: TaskInputs<'_>) -> Result<BuildTask, SuperbuildError> {
    let TaskInputs {
        spec,
        settings,
        layout,
        arguments,
        prefix_path,
    } = inputs;

    let renderer = StepRenderer::new(&StepContext::new(
        &spec.name,
        &layout,
        settings,
        &arguments,
        &prefix_path,
    ))?;
    let env = spec
        .env
        .iter()
        .map(|(key, value)| Ok((key.clone(), renderer.render(value)?)))
        .collect::<Result<BTreeMap<_, _>, SuperbuildError>>()?;

    let commands = |list: &[StepCommand], cwd: &Path| -> Result<Vec<Step>, SuperbuildError> {
        list.iter()
            .map(|command| {
                let rendered = renderer.render_all(command)?;
                let Some((program, args)) = rendered.split_first() else {
                    return Err(SuperbuildError::InvalidDependency {
                        name: spec.name.clone(),
                        reason: "empty step command".to_string(),
                    });
                };
                Ok(Step::Command {
                    program: program.clone(),
                    args: args.to_vec(),
                    cwd: cwd.to_path_buf(),
                    env: env.clone(),
                })
            })
            .collect()
    };
    let cmake = |args: Vec<String>, cwd: &Path| Step::Command {
        program: get_cmake_command().to_string(),
        args,
        cwd: cwd.to_path_buf(),
        env: env.clone(),
    };

    let prebuilt_url = spec.prebuilt_for_host();
    let mut steps: BTreeMap<Phase, Vec<Step>> = BTreeMap::new();

    if let Some(url) = prebuilt_url {
        steps.insert(
            Phase::Fetch,
            vec![Step::DownloadArchive {
                url: url.to_string(),
                scratch: layout.tmp_dir.clone(),
                destination: layout.source_dir.clone(),
            }],
        );
        steps.insert(Phase::Configure, Vec::new());
        steps.insert(Phase::Build, Vec::new());
        steps.insert(
            Phase::Install,
            vec![Step::CopyTree {
                from: layout.source_dir.clone(),
                to: layout.install_dir.clone(),
            }],
        );
    } else {
        let mut fetch = vec![match &spec.locator {
            SourceLocator::Archive {
                url,
            } => Step::DownloadArchive {
                url: url.clone(),
                scratch: layout.tmp_dir.clone(),
                destination: layout.source_dir.clone(),
            },
            SourceLocator::Repository {
                address,
                revision,
            } => Step::GitCheckout {
                address: address.clone(),
                revision: revision.clone(),
                destination: layout.source_dir.clone(),
            },
        }];
        fetch.extend(commands(&spec.steps.patch, &layout.source_dir)?);
        steps.insert(Phase::Fetch, fetch);

        let mut configure = commands(&spec.steps.prepare, &layout.source_dir)?;
        if let Some(custom) = &spec.steps.configure {
            configure.extend(commands(custom, &layout.build_dir)?);
        } else {
            let mut args = vec![
                "-S".to_string(),
                layout.source_dir.display().to_string(),
                "-B".to_string(),
                layout.build_dir.display().to_string(),
            ];
            if let Some(generator) = &settings.generator {
                args.push("-G".to_string());
                args.push(generator.clone());
            }
            args.extend(arguments.render());
            configure.push(cmake(args, &layout.build_dir));
        }
        steps.insert(Phase::Configure, configure);

        let build = if let Some(custom) = &spec.steps.build {
            commands(custom, &layout.build_dir)?
        } else {
            let mut args = vec!["--build".to_string(), layout.build_dir.display().to_string()];
            if settings.is_multi_config() {
                args.push("--config".to_string());
                args.push(settings.build_type.clone());
            }
            if let Some(jobs) = settings.parallel_level() {
                args.push("--parallel".to_string());
                args.push(jobs.to_string());
            }
            vec![cmake(args, &layout.build_dir)]
        };
        steps.insert(Phase::Build, build);

        let install = if let Some(custom) = &spec.steps.install {
            commands(custom, &layout.build_dir)?
        } else {
            let mut args = vec!["--install".to_string(), layout.build_dir.display().to_string()];
            if settings.is_multi_config() {
                args.push("--config".to_string());
                args.push(settings.build_type.clone());
            }
            vec![cmake(args, &layout.build_dir)]
        };
        steps.insert(Phase::Install, install);
    }

    let mut previous = String::new();
    let phases = Phase::ALL
        .iter()
        .map(|&phase| {
            let steps = steps.remove(&phase).unwrap_or_default();
            let fingerprint = fingerprint(&spec.name, phase, &steps, &previous);
            previous.clone_from(&fingerprint);
            PhasePlan {
                phase,
                steps,
                fingerprint,
            }
        })
        .collect();

    Ok(BuildTask {
        name: spec.name.clone(),
        prerequisites: spec.prerequisites.clone(),
        layout,
        arguments,
        prebuilt: prebuilt_url.is_some(),
        phases,
    })
}

fn fingerprint(name: &str, phase: Phase, steps: &[Step], previous: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(phase.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(previous.as_bytes());
    hasher.update([0]);
    // Step serializes only strings, paths and maps
    hasher.update(serde_json::to_vec(steps).unwrap_or_default());
    hex::encode(hasher.finalize())
}
