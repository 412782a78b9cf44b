//! Plan construction.
//!
//! Turns a validated [`Manifest`], the [`SettingsStore`] and the ambient
//! [`BuildSettings`] into a [`Plan`]: which dependencies are built, which
//! are disabled (and cleaned), which are excluded, and for every built one
//! a four-phase [`BuildTask`] with its layout and configure arguments.
//!
//! # Process
//!
//! 1. **Toggle evaluation** ([`toggles::evaluate`]): feature switches, then
//!    each dependency's availability and effective enabled value. Pure.
//! 2. **Ordering**: the prerequisite graph is sorted so every prerequisite
//!    precedes its dependents; cycles were already rejected at load time.
//! 3. **Registration** ([`Planner::register`]): per dependency, in that
//!    order. Enabled dependencies get a layout, an argument list and a
//!    task; disabled ones are recorded for cleanup.
//!
//! Nothing in this module touches the filesystem or the network, so
//! `superbuild plan` can show exactly what `superbuild build` would do.
//!
//! # Example
//!
//! ```rust,no_run
//! use superbuild_cli::config::{BuildSettings, SettingsStore};
//! use superbuild_cli::manifest::Manifest;
//! use superbuild_cli::resolver::build_plan;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let manifest = Manifest::load(Path::new("superbuild.toml"))?;
//! let store = SettingsStore::load(Path::new("build"))?;
//! let settings = BuildSettings::from_definitions(&store.definitions, &manifest.project_dir)?;
//! let plan = build_plan(&manifest, &settings, &store, Path::new("build"))?;
//! for task in &plan.tasks {
//!     println!("{}", task.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod arguments;
pub mod dependency_graph;
pub mod layout;
pub mod task;
pub mod templates;
pub mod toggles;

pub use arguments::{ArgumentList, ToolArg, assemble_arguments};
pub use dependency_graph::DependencyGraph;
pub use layout::{InstallLayout, RunPaths};
pub use task::{BuildTask, Phase, PhasePlan, Step};
pub use toggles::{Exclusion, FeatureState, ToggleOrigin, ToggleState, ToggleTable};

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config::{BuildSettings, SettingsStore};
use crate::core::SuperbuildError;
use crate::manifest::{DependencySpec, Manifest};
use task::{TaskInputs, build_task};

/// Outcome of registering one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Toggle on: build it
    Build(Box<BuildTask>),
    /// Toggle off: its locations are removed
    Disabled(DisabledDependency),
    /// Not considered this run (feature group off, other platform)
    Excluded(ExcludedDependency),
}

/// A dependency whose toggle is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisabledDependency {
    pub name: String,
    pub origin: ToggleOrigin,
    pub layout: InstallLayout,
}

/// A dependency left out of this run entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedDependency {
    pub name: String,
    pub reason: Exclusion,
}

/// State of one dependency in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Enabled,
    Disabled,
    Excluded,
}

impl EntryState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Excluded => "excluded",
        }
    }
}

/// Summary row for listings, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub toggle: String,
    pub state: EntryState,
    pub origin: ToggleOrigin,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Everything one run will do.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub paths: RunPaths,
    pub settings: BuildSettings,
    pub features: Vec<FeatureState>,
    pub entries: Vec<PlanEntry>,
    /// Enabled dependencies, every prerequisite before its dependents
    pub tasks: Vec<BuildTask>,
    pub disabled: Vec<DisabledDependency>,
    pub excluded: Vec<ExcludedDependency>,
    /// Per-dependency directories under the default install root, removed
    /// when empty because a different root is in effect
    pub stale_default_dirs: Vec<PathBuf>,
}

impl Plan {
    /// Look up a task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&BuildTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Keep only `names` and everything they transitively need.
    ///
    /// Disabled dependencies are still cleaned; stale default directories
    /// are only kept for the remaining tasks.
    ///
    /// # Errors
    ///
    /// Fails when a name is not an enabled dependency of this plan.
    pub fn restrict_to(&mut self, names: &[String]) -> Result<()> {
        let by_name: HashMap<&str, &BuildTask> =
            self.tasks.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut keep = BTreeSet::new();
        let mut stack: Vec<String> = Vec::new();
        for name in names {
            if !by_name.contains_key(name.as_str()) {
                let reason = self.entries.iter().find(|e| &e.name == name).map_or_else(
                    || "no such dependency".to_string(),
                    |entry| format!("it is {} for this run", entry.state.as_str()),
                );
                return Err(SuperbuildError::InvalidDependency {
                    name: name.clone(),
                    reason: format!("cannot build it on its own: {reason}"),
                }
                .into());
            }
            stack.push(name.clone());
        }
        while let Some(name) = stack.pop() {
            if keep.insert(name.clone())
                && let Some(task) = by_name.get(name.as_str())
            {
                stack.extend(task.prerequisites.iter().cloned());
            }
        }

        let default_root = &self.paths.default_install_root;
        self.tasks.retain(|t| keep.contains(&t.name));
        self.stale_default_dirs.retain(|dir| {
            dir.strip_prefix(default_root)
                .ok()
                .and_then(|rel| rel.to_str())
                .is_some_and(|name| keep.contains(name))
        });
        Ok(())
    }
}

/// Registers dependencies against one run's settings and toggles.
pub struct Planner<'a> {
    manifest: &'a Manifest,
    settings: &'a BuildSettings,
    paths: RunPaths,
    toggles: ToggleTable,
    graph: DependencyGraph,
    order: Vec<String>,
}

impl<'a> Planner<'a> {
    /// # Errors
    ///
    /// [`SuperbuildError::CircularDependency`] if the prerequisites form a cycle.
    pub fn new(
        manifest: &'a Manifest,
        settings: &'a BuildSettings,
        store: &SettingsStore,
        binary_root: &Path,
    ) -> Result<Self> {
        let graph = DependencyGraph::from_specs(&manifest.dependencies);
        let order = graph.topological_order()?;
        Ok(Self {
            manifest,
            settings,
            paths: RunPaths {
                binary_root: binary_root.to_path_buf(),
                install_root: settings.install_root().to_path_buf(),
                default_install_root: settings.default_install_prefix.clone(),
            },
            toggles: toggles::evaluate(manifest, store),
            graph,
            order,
        })
    }

    #[must_use]
    pub const fn toggles(&self) -> &ToggleTable {
        &self.toggles
    }

    #[must_use]
    pub const fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Register one dependency.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::PrerequisiteNotEnabled`] when the dependency is
    /// enabled but one of its prerequisites is not, and
    /// [`SuperbuildError::InvalidDependency`] for malformed arguments or
    /// step templates.
    pub fn register(&self, spec: &DependencySpec) -> Result<Registration> {
        let toggle = self.toggles.get(&spec.name).ok_or_else(|| SuperbuildError::Other {
            message: format!("dependency '{}' is not part of the manifest", spec.name),
        })?;

        if let Some(reason) = &toggle.excluded {
            tracing::debug!("{} excluded: {}", spec.name, reason);
            return Ok(Registration::Excluded(ExcludedDependency {
                name: spec.name.clone(),
                reason: reason.clone(),
            }));
        }

        let layout = self.paths.layout(&spec.name);
        if !toggle.enabled {
            tracing::debug!("{} disabled ({})", spec.name, toggle.origin);
            return Ok(Registration::Disabled(DisabledDependency {
                name: spec.name.clone(),
                origin: toggle.origin,
                layout,
            }));
        }

        for prerequisite in &spec.prerequisites {
            if let Some(state) = self.toggles.get(prerequisite)
                && !state.is_enabled()
            {
                return Err(SuperbuildError::PrerequisiteNotEnabled {
                    name: spec.name.clone(),
                    prerequisite: prerequisite.clone(),
                    state: state.off_reason(),
                }
                .into());
            }
        }

        let transitive = self.graph.transitive_prerequisites(&spec.name);
        let prerequisite_installs: Vec<PathBuf> = self
            .order
            .iter()
            .filter(|name| transitive.contains(*name))
            .map(|name| self.paths.layout(name).install_dir)
            .collect();
        let prefix_path = prerequisite_installs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(";");

        let arguments = assemble_arguments(
            &spec.name,
            self.settings,
            &layout,
            &prerequisite_installs,
            &spec.extra_args,
        )?;
        let task = build_task(TaskInputs {
            spec,
            settings: self.settings,
            layout,
            arguments,
            prefix_path,
        })?;
        Ok(Registration::Build(Box::new(task)))
    }

    /// Register every dependency and assemble the plan.
    ///
    /// # Errors
    ///
    /// The first registration error.
    pub fn plan(self) -> Result<Plan> {
        let mut tasks = Vec::new();
        let mut disabled = Vec::new();
        let mut excluded = Vec::new();
        let mut stale_default_dirs = Vec::new();
        let custom_root = self.paths.install_root != self.paths.default_install_root;

        for name in &self.order {
            let Some(spec) = self.manifest.get(name) else {
                continue;
            };
            match self.register(spec)? {
                Registration::Build(task) => {
                    if custom_root {
                        stale_default_dirs.push(self.paths.default_install_root.join(&task.name));
                    }
                    tasks.push(*task);
                }
                Registration::Disabled(dep) => disabled.push(dep),
                Registration::Excluded(dep) => excluded.push(dep),
            }
        }

        let entries = self
            .manifest
            .dependencies
            .iter()
            .filter_map(|spec| {
                let toggle = self.toggles.get(&spec.name)?;
                let state = if toggle.excluded.is_some() {
                    EntryState::Excluded
                } else if toggle.enabled {
                    EntryState::Enabled
                } else {
                    EntryState::Disabled
                };
                Some(PlanEntry {
                    name: spec.name.clone(),
                    toggle: spec.toggle_key(),
                    state,
                    origin: toggle.origin,
                    source: spec.locator.describe(),
                    feature: spec.feature.clone(),
                    reason: toggle.excluded.as_ref().map(ToString::to_string).or_else(|| {
                        toggle.required_by.as_ref().map(|by| format!("required by {by}"))
                    }),
                })
            })
            .collect();

        // Declaration order reads better in listings than graph order
        let position: HashMap<&str, usize> = self
            .manifest
            .dependencies
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();
        disabled.sort_by_key(|d: &DisabledDependency| position.get(d.name.as_str()).copied());
        excluded.sort_by_key(|d: &ExcludedDependency| position.get(d.name.as_str()).copied());

        Ok(Plan {
            project: self.manifest.project.name.clone(),
            paths: self.paths.clone(),
            settings: self.settings.clone(),
            features: self.toggles.features.clone(),
            entries,
            tasks,
            disabled,
            excluded,
            stale_default_dirs,
        })
    }
}

/// Build the plan for `manifest` in one call.
///
/// # Errors
///
/// See [`Planner::new`] and [`Planner::plan`].
pub fn build_plan(
    manifest: &Manifest,
    settings: &BuildSettings,
    store: &SettingsStore,
    binary_root: &Path,
) -> Result<Plan> {
    Planner::new(manifest, settings, store, binary_root)?.plan()
}
