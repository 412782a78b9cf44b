//! DAG scheduler.
//!
//! Tasks become ready once every prerequisite has installed. Up to
//! `max_parallel` ready tasks run at once on a [`JoinSet`]; inside a task
//! the four phases run strictly in sequence. A failed phase stops that
//! task and marks everything that transitively depends on it as blocked,
//! while independent branches keep going until the ready set drains.

use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::core::SuperbuildError;
use crate::installer::executor::PhaseExecutor;
use crate::installer::stamps;
use crate::resolver::{BuildTask, Phase};
use crate::utils::progress::{BuildProgress, ProgressBar};

/// Knobs for one execution.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of dependencies in flight
    pub max_parallel: usize,
    /// Ignore stamps and run every phase
    pub force: bool,
    /// Draw progress bars
    pub progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_parallel: crate::constants::default_max_parallel(),
            force: false,
            progress: false,
        }
    }
}

/// Final state of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Outcome {
    /// All four phases are done
    Installed {
        ran: Vec<Phase>,
        skipped: Vec<Phase>,
    },
    /// A phase failed; later phases did not run
    Failed {
        phase: Phase,
        error: String,
        log: PathBuf,
    },
    /// Never started because a prerequisite failed
    Blocked {
        by: String,
    },
}

/// Outcome of every task, in plan order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl BuildReport {
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Installed { .. }))
            .map(|(n, _)| n.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed { .. }))
            .map(|(n, o)| (n.as_str(), o))
    }

    pub fn blocked(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(n, o)| match o {
            Outcome::Blocked {
                by,
            } => Some((n.as_str(), by.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| matches!(o, Outcome::Installed { .. }))
    }

    /// One terminal diagnostic for every failure, or `self` when all installed.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::BuildFailed`] naming each failing dependency and
    /// phase with its log, and listing blocked dependents separately.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let mut lines = Vec::new();
        let mut failed = 0;
        for (name, outcome) in self.failed() {
            if let Outcome::Failed {
                phase,
                error,
                log,
            } = outcome
            {
                failed += 1;
                lines.push(format!("{name}: {phase} failed (log: {})", log.display()));
                lines.extend(error.lines().map(|l| format!("    {l}")));
            }
        }
        let blocked: Vec<String> =
            self.blocked().map(|(name, by)| format!("{name} (needs {by})")).collect();
        if !blocked.is_empty() {
            lines.push(format!("blocked: {}", blocked.join(", ")));
        }

        Err(SuperbuildError::BuildFailed {
            failed,
            blocked: blocked.len(),
            summary: lines.join("\n"),
        }
        .into())
    }
}

fn describe_error(error: &anyhow::Error) -> String {
    let mut message = format!("{error:#}");
    if let Some(SuperbuildError::CommandFailed {
        stderr,
        ..
    }) = error.downcast_ref::<SuperbuildError>()
        && !stderr.trim().is_empty()
    {
        message.push('\n');
        message.push_str(stderr.trim_end());
    }
    message
}

/// Drive one task through its phases, resuming from current stamps.
pub async fn run_task<E: PhaseExecutor>(
    executor: &E,
    task: &BuildTask,
    force: bool,
    spinner: &ProgressBar,
) -> Outcome {
    let mut ran = Vec::new();
    let mut skipped = Vec::new();
    let mut resuming = !force;

    for phase in Phase::ALL {
        if resuming && stamps::is_current(task, phase) {
            tracing::debug!("({}) {} is up to date", task.name, phase);
            skipped.push(phase);
            continue;
        }
        if resuming || ran.is_empty() {
            // Everything from here on runs again
            if let Err(e) = stamps::invalidate_from(task, phase) {
                return failed(task, phase, &e);
            }
        }
        resuming = false;

        spinner.set_message(phase.verb());
        tracing::info!("({}) {}", task.name, phase.verb());
        if let Err(e) = executor.run_phase(task, phase).await {
            tracing::debug!("({}) {} failed: {:#}", task.name, phase, e);
            return failed(task, phase, &e);
        }
        if let Err(e) = stamps::write_stamp(task, phase) {
            return failed(task, phase, &e);
        }
        ran.push(phase);
    }

    Outcome::Installed {
        ran,
        skipped,
    }
}

fn failed(task: &BuildTask, phase: Phase, error: &anyhow::Error) -> Outcome {
    Outcome::Failed {
        phase,
        error: describe_error(error),
        log: task.layout.log_file(&task.name, phase),
    }
}

/// Run `tasks` (already in dependency order) to completion.
///
/// Never fails as a whole: each task's outcome is in the report.
pub async fn execute<E: PhaseExecutor>(
    tasks: &[BuildTask],
    executor: Arc<E>,
    options: &BuildOptions,
) -> BuildReport {
    let max_parallel = options.max_parallel.max(1);
    let progress = BuildProgress::new(tasks.len(), options.progress);

    let index: HashMap<&str, usize> =
        tasks.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();
    let mut remaining: Vec<usize> = tasks
        .iter()
        .map(|t| t.prerequisites.iter().filter(|p| index.contains_key(p.as_str())).count())
        .collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        for prerequisite in &task.prerequisites {
            if let Some(&p) = index.get(prerequisite.as_str()) {
                dependents[p].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..tasks.len()).filter(|&i| remaining[i] == 0).collect();
    let mut outcomes: Vec<Option<Outcome>> = vec![None; tasks.len()];
    let mut running: JoinSet<(usize, Outcome)> = JoinSet::new();
    let mut spinners: HashMap<usize, ProgressBar> = HashMap::new();
    let mut ids = HashMap::new();

    loop {
        while running.len() < max_parallel
            && let Some(i) = ready.pop_front()
        {
            let task = tasks[i].clone();
            let executor = Arc::clone(&executor);
            let spinner = progress.start_task(&task.name);
            spinners.insert(i, spinner.clone());
            let force = options.force;
            tracing::debug!("Starting {} ({} running)", task.name, running.len() + 1);
            let handle = running.spawn(async move {
                let outcome = run_task(executor.as_ref(), &task, force, &spinner).await;
                (i, outcome)
            });
            ids.insert(handle.id(), i);
        }

        let Some(joined) = running.join_next_with_id().await else {
            break;
        };
        let (i, outcome) = match joined {
            Ok((_, result)) => result,
            Err(e) => {
                let Some(&i) = ids.get(&e.id()) else {
                    continue;
                };
                let task = &tasks[i];
                let outcome = Outcome::Failed {
                    phase: Phase::Fetch,
                    error: format!("task aborted: {e}"),
                    log: task.layout.log_file(&task.name, Phase::Fetch),
                };
                (i, outcome)
            }
        };

        let name = tasks[i].name.clone();
        if let Some(spinner) = spinners.remove(&i) {
            let message = match &outcome {
                Outcome::Installed {
                    ..
                } => format!("{name} installed"),
                Outcome::Failed {
                    phase,
                    ..
                } => format!("{name} {phase} failed"),
                Outcome::Blocked {
                    ..
                } => format!("{name} blocked"),
            };
            progress.finish_task(&spinner, message);
        }

        match &outcome {
            Outcome::Installed {
                ..
            } => {
                tracing::info!("({}) Installed", name);
                for &d in &dependents[i] {
                    remaining[d] -= 1;
                    if remaining[d] == 0 && outcomes[d].is_none() {
                        ready.push_back(d);
                    }
                }
            }
            _ => {
                let mut stack = dependents[i].clone();
                while let Some(d) = stack.pop() {
                    if outcomes[d].is_none() {
                        tracing::debug!("{} blocked by {}", tasks[d].name, name);
                        outcomes[d] = Some(Outcome::Blocked {
                            by: name.clone(),
                        });
                        stack.extend(dependents[d].iter().copied());
                    }
                }
            }
        }
        outcomes[i] = Some(outcome);
    }
    progress.finish();

    BuildReport {
        outcomes: tasks
            .iter()
            .zip(outcomes)
            .map(|(task, outcome)| {
                let outcome = outcome.unwrap_or_else(|| Outcome::Blocked {
                    by: "an earlier failure".to_string(),
                });
                (task.name.clone(), outcome)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::task::PhasePlan;
    use crate::resolver::{ArgumentList, RunPaths};
    use crate::test_utils::{Event, RecordingExecutor};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn task(root: &Path, name: &str, prerequisites: &[&str]) -> BuildTask {
        let paths = RunPaths {
            binary_root: root.join("build"),
            install_root: root.join("install"),
            default_install_root: root.join("install"),
        };
        BuildTask {
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(ToString::to_string).collect(),
            layout: paths.layout(name),
            arguments: ArgumentList::new(),
            prebuilt: false,
            phases: Phase::ALL
                .iter()
                .map(|&phase| PhasePlan {
                    phase,
                    steps: Vec::new(),
                    fingerprint: format!("{name}-{phase}"),
                })
                .collect(),
        }
    }

    fn options(max_parallel: usize) -> BuildOptions {
        BuildOptions {
            max_parallel,
            force: false,
            progress: false,
        }
    }

    #[tokio::test]
    async fn test_prerequisite_installs_before_dependent_fetches() {
        let temp = tempdir().unwrap();
        let tasks = vec![task(temp.path(), "b", &[]), task(temp.path(), "a", &["b"])];
        let executor = Arc::new(RecordingExecutor::new().with_delay("b", Duration::from_millis(50)));

        let report = execute(&tasks, Arc::clone(&executor), &options(4)).await;
        assert!(report.is_success());

        let b_install = executor.position(&Event::End("b".to_string(), Phase::Install)).unwrap();
        let a_fetch = executor.position(&Event::Start("a".to_string(), Phase::Fetch)).unwrap();
        assert!(b_install < a_fetch);
    }

    #[tokio::test]
    async fn test_independent_tasks_overlap() {
        let temp = tempdir().unwrap();
        let tasks = vec![task(temp.path(), "x", &[]), task(temp.path(), "y", &[])];
        let executor = Arc::new(
            RecordingExecutor::new()
                .with_delay("x", Duration::from_millis(30))
                .with_delay("y", Duration::from_millis(30)),
        );

        execute(&tasks, Arc::clone(&executor), &options(2)).await;
        assert_eq!(executor.max_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_max_parallel_one_serializes() {
        let temp = tempdir().unwrap();
        let tasks = vec![task(temp.path(), "x", &[]), task(temp.path(), "y", &[])];
        let executor = Arc::new(RecordingExecutor::new().with_delay("x", Duration::from_millis(20)));

        execute(&tasks, Arc::clone(&executor), &options(1)).await;
        assert_eq!(executor.max_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_only() {
        let temp = tempdir().unwrap();
        let tasks = vec![
            task(temp.path(), "base", &[]),
            task(temp.path(), "other", &[]),
            task(temp.path(), "mid", &["base"]),
            task(temp.path(), "top", &["mid", "other"]),
        ];
        let executor = Arc::new(RecordingExecutor::new().fail_on("base", Phase::Configure));

        let report = execute(&tasks, Arc::clone(&executor), &options(4)).await;

        assert!(matches!(
            report.outcome("base"),
            Some(Outcome::Failed {
                phase: Phase::Configure,
                ..
            })
        ));
        assert!(matches!(report.outcome("other"), Some(Outcome::Installed { .. })));
        assert_eq!(
            report.outcome("mid"),
            Some(&Outcome::Blocked {
                by: "base".to_string()
            })
        );
        assert_eq!(
            report.outcome("top"),
            Some(&Outcome::Blocked {
                by: "base".to_string()
            })
        );
        assert!(executor.position(&Event::Start("base".to_string(), Phase::Build)).is_none());

        let err = report.into_result().unwrap_err();
        match err.downcast_ref::<SuperbuildError>() {
            Some(SuperbuildError::BuildFailed {
                failed,
                blocked,
                summary,
            }) => {
                assert_eq!((*failed, *blocked), (1, 2));
                assert!(summary.contains("base: configure failed"));
                assert!(summary.contains("base-configure.log"));
                assert!(summary.contains("mid (needs base)"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stamps_skip_completed_phases() {
        let temp = tempdir().unwrap();
        let tasks = vec![task(temp.path(), "z", &[])];

        let first = Arc::new(RecordingExecutor::new());
        execute(&tasks, Arc::clone(&first), &options(1)).await;
        assert_eq!(first.phases_run("z").len(), 4);

        let second = Arc::new(RecordingExecutor::new());
        let report = execute(&tasks, Arc::clone(&second), &options(1)).await;
        assert!(second.phases_run("z").is_empty());
        assert_eq!(
            report.outcome("z"),
            Some(&Outcome::Installed {
                ran: vec![],
                skipped: Phase::ALL.to_vec()
            })
        );

        let forced = Arc::new(RecordingExecutor::new());
        let mut force = options(1);
        force.force = true;
        execute(&tasks, Arc::clone(&forced), &force).await;
        assert_eq!(forced.phases_run("z").len(), 4);
    }

    #[tokio::test]
    async fn test_changed_phase_reruns_it_and_everything_after() {
        let temp = tempdir().unwrap();
        let original = vec![task(temp.path(), "z", &[])];
        execute(&original, Arc::new(RecordingExecutor::new()), &options(1)).await;

        let mut changed = original.clone();
        changed[0].phases[2].fingerprint = "new-build".to_string();
        let executor = Arc::new(RecordingExecutor::new());
        execute(&changed, Arc::clone(&executor), &options(1)).await;
        assert_eq!(executor.phases_run("z"), [Phase::Build, Phase::Install]);
    }

    #[tokio::test]
    async fn test_failed_phase_resumes_there() {
        let temp = tempdir().unwrap();
        let tasks = vec![task(temp.path(), "z", &[])];
        let failing = Arc::new(RecordingExecutor::new().fail_on("z", Phase::Build));
        execute(&tasks, Arc::clone(&failing), &options(1)).await;

        let retry = Arc::new(RecordingExecutor::new());
        execute(&tasks, Arc::clone(&retry), &options(1)).await;
        assert_eq!(retry.phases_run("z"), [Phase::Build, Phase::Install]);
    }
}
