use std::sync::Arc;
use std::time::Duration;

use superbuild_cli::installer::{BuildOptions, Outcome, run_plan};
use superbuild_cli::resolver::Phase;
use superbuild_cli::test_utils::{Event, RecordingExecutor};

use crate::Project;

const DIAMOND: &str = r#"
[[dependency]]
name = "top"
url = "top.tgz"
depends = ["left", "right"]

[[dependency]]
name = "left"
url = "left.tgz"
depends = ["base"]

[[dependency]]
name = "right"
url = "right.tgz"
depends = ["base"]

[[dependency]]
name = "base"
url = "base.tgz"
"#;

fn options(max_parallel: usize) -> BuildOptions {
    BuildOptions {
        max_parallel,
        force: false,
        progress: false,
    }
}

fn start(name: &str, phase: Phase) -> Event {
    Event::Start(name.to_string(), phase)
}

fn end(name: &str, phase: Phase) -> Event {
    Event::End(name.to_string(), phase)
}

#[tokio::test]
async fn test_prerequisite_install_precedes_dependent_fetch() {
    let project = Project::new(
        r#"
        [[dependency]]
        name = "a"
        url = "a.tgz"
        depends = ["b"]

        [[dependency]]
        name = "b"
        url = "b.tgz"
        "#,
    );
    let (_, plan) = project.plan(&[]).unwrap();
    let executor = Arc::new(RecordingExecutor::new().with_delay("b", Duration::from_millis(40)));

    let (_, report) = run_plan(&plan, Arc::clone(&executor), &options(4)).await.unwrap();
    assert!(report.is_success());

    let events = executor.events();
    let b_installed = events.iter().position(|e| *e == end("b", Phase::Install)).unwrap();
    let a_fetch = events.iter().position(|e| *e == start("a", Phase::Fetch)).unwrap();
    assert!(b_installed < a_fetch);
    assert_eq!(executor.phases_run("a"), Phase::ALL);
}

#[tokio::test]
async fn test_diamond_runs_siblings_in_parallel() {
    let project = Project::new(DIAMOND);
    let (_, plan) = project.plan(&[]).unwrap();
    let executor = Arc::new(
        RecordingExecutor::new()
            .with_delay("left", Duration::from_millis(40))
            .with_delay("right", Duration::from_millis(40)),
    );

    let (_, report) = run_plan(&plan, Arc::clone(&executor), &options(4)).await.unwrap();
    assert!(report.is_success());
    assert_eq!(executor.max_concurrency(), 2);

    let top_fetch = executor.position(&start("top", Phase::Fetch)).unwrap();
    assert!(executor.position(&end("left", Phase::Install)).unwrap() < top_fetch);
    assert!(executor.position(&end("right", Phase::Install)).unwrap() < top_fetch);
}

#[tokio::test]
async fn test_failed_branch_blocks_only_its_dependents() {
    let project = Project::new(DIAMOND);
    let (_, plan) = project.plan(&[]).unwrap();
    let executor = Arc::new(RecordingExecutor::new().fail_on("left", Phase::Build));

    let (_, report) = run_plan(&plan, Arc::clone(&executor), &options(4)).await.unwrap();

    assert!(matches!(report.outcome("base"), Some(Outcome::Installed { .. })));
    assert!(matches!(report.outcome("right"), Some(Outcome::Installed { .. })));
    assert!(matches!(
        report.outcome("left"),
        Some(Outcome::Failed {
            phase: Phase::Build,
            ..
        })
    ));
    assert_eq!(
        report.outcome("top"),
        Some(&Outcome::Blocked {
            by: "left".to_string()
        })
    );
    assert!(executor.phases_run("top").is_empty());
    assert!(report.into_result().is_err());
}
