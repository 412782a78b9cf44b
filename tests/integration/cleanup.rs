use std::fs;
use std::sync::Arc;

use superbuild_cli::installer::{BuildOptions, run_plan};
use superbuild_cli::test_utils::RecordingExecutor;

use crate::Project;

const MANIFEST: &str = r#"
[[dependency]]
name = "zlib"
url = "zlib.tgz"

[[dependency]]
name = "png"
url = "png.tgz"
"#;

fn options() -> BuildOptions {
    BuildOptions {
        max_parallel: 2,
        force: false,
        progress: false,
    }
}

#[tokio::test]
async fn test_disabling_removes_build_and_install_dirs_idempotently() {
    let project = Project::new(MANIFEST);
    let build = project.path().join("build/png/build");
    let install = project.path().join("install/png");
    let sources = project.path().join("build/_sources/png");
    for dir in [&build, &install, &sources] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(install.join("libpng.a"), "").unwrap();

    let (store, plan) = project.plan(&["SUPERBUILD_png=OFF"]).unwrap();
    store.save().unwrap();
    let (cleanup, report) =
        run_plan(&plan, Arc::new(RecordingExecutor::new()), &options()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(cleanup.removed.len(), 2);
    assert!(!project.path().join("build/png").exists());
    assert!(!install.exists());
    assert!(sources.exists());

    // Same toggles again: nothing left to remove, no error
    let (_, plan) = project.plan(&[]).unwrap();
    assert_eq!(plan.disabled.len(), 1);
    let (cleanup, _) =
        run_plan(&plan, Arc::new(RecordingExecutor::new()), &options()).await.unwrap();
    assert!(cleanup.removed.is_empty());
}

#[tokio::test]
async fn test_moved_install_root_removes_empty_default_root() {
    let project = Project::new(MANIFEST);
    let default_root = project.path().join("install");
    fs::create_dir_all(default_root.join("zlib")).unwrap();
    fs::create_dir_all(default_root.join("png")).unwrap();

    let custom = project.path().join("prefix");
    let definition = format!("CMAKE_INSTALL_PREFIX={}", custom.display());
    let (_, plan) = project.plan(&[definition.as_str()]).unwrap();
    assert_eq!(plan.paths.install_root, custom);
    assert_eq!(plan.task("zlib").unwrap().layout.install_dir, custom.join("zlib"));

    let (cleanup, _) =
        run_plan(&plan, Arc::new(RecordingExecutor::new()), &options()).await.unwrap();
    assert!(!default_root.exists());
    assert!(cleanup.removed_stale.contains(&default_root));
    assert!(cleanup.kept_stale.is_empty());
}

#[tokio::test]
async fn test_moved_install_root_keeps_default_root_with_content() {
    let project = Project::new(MANIFEST);
    let default_root = project.path().join("install");
    fs::create_dir_all(default_root.join("zlib/lib")).unwrap();
    fs::write(default_root.join("zlib/lib/libz.a"), "").unwrap();

    let definition = format!("CMAKE_INSTALL_PREFIX={}", project.path().join("prefix").display());
    let (_, plan) = project.plan(&[definition.as_str()]).unwrap();
    let (cleanup, _) =
        run_plan(&plan, Arc::new(RecordingExecutor::new()), &options()).await.unwrap();

    assert!(default_root.join("zlib/lib/libz.a").exists());
    assert!(cleanup.kept_stale.contains(&default_root));
}

#[tokio::test]
async fn test_default_root_untouched_without_custom_prefix() {
    let project = Project::new(MANIFEST);
    let (_, plan) = project.plan(&[]).unwrap();
    assert!(plan.stale_default_dirs.is_empty());

    let default_root = project.path().join("install");
    fs::create_dir_all(&default_root).unwrap();
    run_plan(&plan, Arc::new(RecordingExecutor::new()), &options()).await.unwrap();
    assert!(default_root.exists());
}
