//! Real runs through the system executor.
//!
//! Dependencies use custom shell steps instead of the default build tool,
//! so these only need `sh` and `git`.

use std::fs;
use std::sync::Arc;

use superbuild_cli::core::SuperbuildError;
use superbuild_cli::installer::{BuildOptions, Outcome, SystemExecutor, run_plan};
use superbuild_cli::resolver::Phase;
use superbuild_cli::test_utils::{TestGit, write_tar_gz};
use superbuild_cli::utils::platform::command_exists;

use crate::Project;

fn manifest(repo: &str, b_install: &str) -> String {
    format!(
        r#"
[[dependency]]
name = "a"
url = "vendor/a-1.0.tar.gz"

[dependency.steps]
configure = [["sh", "-c", "echo configured > {{{{ build_dir }}}}/configured.txt"]]
build = [["sh", "-c", "cp {{{{ source_dir }}}}/a.h {{{{ build_dir }}}}/a.h"]]
install = [["sh", "-c", "mkdir -p {{{{ install_dir }}}}/include && cp {{{{ build_dir }}}}/a.h {{{{ install_dir }}}}/include/"]]

[[dependency]]
name = "b"
git = "{repo}"
tag = "v1.0"
depends = ["a"]

[dependency.env]
FOO = "bar"

[dependency.steps]
configure = []
build = []
install = [["sh", "-c", "{b_install}"]]
"#
    )
}

const B_INSTALL: &str = "mkdir -p {{ install_dir }} && cp {{ source_dir }}/b.txt {{ install_dir }}/ && echo $FOO > {{ install_dir }}/foo.txt";

fn options() -> BuildOptions {
    BuildOptions {
        max_parallel: 2,
        force: false,
        progress: false,
    }
}

struct Fixture {
    project: Project,
    repo: String,
    _upstream: tempfile::TempDir,
}

fn fixture() -> Option<Fixture> {
    if !command_exists("git") || !command_exists("sh") {
        eprintln!("git or sh not available, skipping");
        return None;
    }
    let upstream = tempfile::tempdir().unwrap();
    let git = TestGit::new(upstream.path().join("b"));
    git.init_with_files(&[("b.txt", "from b v1.0\n")]).unwrap();
    git.tag("v1.0").unwrap();
    git.commit_file("b.txt", "after the tag\n").unwrap();
    let repo = git.repo_path().display().to_string();

    let project = Project::new(&manifest(&repo, B_INSTALL));
    fs::create_dir_all(project.path().join("vendor")).unwrap();
    write_tar_gz(&project.path().join("vendor/a-1.0.tar.gz"), &[("a-1.0/a.h", "#define A 1\n")])
        .unwrap();
    Some(Fixture {
        project,
        repo,
        _upstream: upstream,
    })
}

#[tokio::test]
async fn test_archive_and_git_dependencies_install() {
    let Some(fx) = fixture() else {
        return;
    };
    let root = fx.project.path();
    let (_, plan) = fx.project.plan(&[]).unwrap();
    let executor = Arc::new(SystemExecutor::new(root));

    let (_, report) = run_plan(&plan, executor, &options()).await.unwrap();
    let report = report.into_result().unwrap();
    assert_eq!(report.installed().collect::<Vec<_>>(), ["a", "b"]);

    assert_eq!(fs::read_to_string(root.join("install/a/include/a.h")).unwrap(), "#define A 1\n");
    assert!(root.join("build/a/build/configured.txt").exists());
    assert_eq!(fs::read_to_string(root.join("install/b/b.txt")).unwrap(), "from b v1.0\n");
    assert_eq!(fs::read_to_string(root.join("install/b/foo.txt")).unwrap().trim(), "bar");

    let log = fs::read_to_string(root.join("build/a/tmp/a-configure.log")).unwrap();
    assert!(log.contains("$ sh -c"));
    assert!(root.join("build/b/stamp/b-install.stamp").exists());
}

#[tokio::test]
async fn test_second_run_skips_and_changes_rerun_from_changed_phase() {
    let Some(fx) = fixture() else {
        return;
    };
    let root = fx.project.path();
    let executor = Arc::new(SystemExecutor::new(root));

    let (_, plan) = fx.project.plan(&[]).unwrap();
    run_plan(&plan, Arc::clone(&executor), &options()).await.unwrap().1.into_result().unwrap();

    let (_, plan) = fx.project.plan(&[]).unwrap();
    let (_, report) = run_plan(&plan, Arc::clone(&executor), &options()).await.unwrap();
    for name in ["a", "b"] {
        assert_eq!(
            report.outcome(name),
            Some(&Outcome::Installed {
                ran: vec![],
                skipped: Phase::ALL.to_vec()
            })
        );
    }

    let changed = B_INSTALL.replace("foo.txt", "foo2.txt");
    fx.project.rewrite(&manifest(&fx.repo, &changed));
    let (_, plan) = fx.project.plan(&[]).unwrap();
    let (_, report) = run_plan(&plan, executor, &options()).await.unwrap();
    assert_eq!(
        report.outcome("b"),
        Some(&Outcome::Installed {
            ran: vec![Phase::Install],
            skipped: vec![Phase::Fetch, Phase::Configure, Phase::Build]
        })
    );
    assert!(root.join("install/b/foo2.txt").exists());
}

#[tokio::test]
async fn test_failed_phase_is_reported_with_log_and_resumed() {
    let Some(fx) = fixture() else {
        return;
    };
    let root = fx.project.path();
    let executor = Arc::new(SystemExecutor::new(root));

    fx.project.rewrite(&manifest(&fx.repo, "echo cannot install >&2; exit 7"));
    let (_, plan) = fx.project.plan(&[]).unwrap();
    let (_, report) = run_plan(&plan, Arc::clone(&executor), &options()).await.unwrap();

    assert!(matches!(report.outcome("a"), Some(Outcome::Installed { .. })));
    let err = report.into_result().unwrap_err();
    match err.downcast_ref::<SuperbuildError>() {
        Some(SuperbuildError::BuildFailed {
            failed,
            summary,
            ..
        }) => {
            assert_eq!(*failed, 1);
            assert!(summary.contains("b: install failed"));
            assert!(summary.contains("b-install.log"));
            assert!(summary.contains("cannot install"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let log = fs::read_to_string(root.join("build/b/tmp/b-install.log")).unwrap();
    assert!(log.contains("# exit: exit code 7"));

    fx.project.rewrite(&manifest(&fx.repo, B_INSTALL));
    let (_, plan) = fx.project.plan(&[]).unwrap();
    let (_, report) = run_plan(&plan, executor, &options()).await.unwrap();
    assert_eq!(
        report.outcome("b"),
        Some(&Outcome::Installed {
            ran: vec![Phase::Install],
            skipped: vec![Phase::Fetch, Phase::Configure, Phase::Build]
        })
    );
}

#[tokio::test]
async fn test_disabling_after_install_removes_it() {
    let Some(fx) = fixture() else {
        return;
    };
    let root = fx.project.path();
    let executor = Arc::new(SystemExecutor::new(root));

    let (_, plan) = fx.project.plan(&[]).unwrap();
    run_plan(&plan, Arc::clone(&executor), &options()).await.unwrap().1.into_result().unwrap();
    assert!(root.join("install/b/b.txt").exists());

    let (_, plan) = fx.project.plan(&["SUPERBUILD_b=OFF"]).unwrap();
    let (cleanup, report) = run_plan(&plan, executor, &options()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(cleanup.removed, [root.join("build/b"), root.join("install/b")]);
    assert!(root.join("install/a/include/a.h").exists());
    assert!(root.join("build/_sources/b/b.txt").exists());
}
