use assert_cmd::Command;
use predicates::prelude::*;

use crate::Project;

const MANIFEST: &str = r#"
[project]
name = "demo"

[features.docs]
default = false

[[dependency]]
name = "zlib"
url = "vendor/zlib-1.3.tar.gz"

[[dependency]]
name = "png"
url = "vendor/libpng.tar.gz"
depends = ["zlib"]
args = ["PNG_SHARED=OFF"]

[[dependency]]
name = "doxygen"
url = "vendor/doxygen.zip"
feature = "docs"
"#;

fn superbuild(project: &Project) -> Command {
    let mut cmd = Command::cargo_bin("superbuild").unwrap();
    cmd.current_dir(project.path()).env("NO_COLOR", "1").env("SUPERBUILD_NO_PROGRESS", "1");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_validate_reports_build_order() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid (3 dependencies, 1 feature switches)"))
        .stdout(predicate::str::contains("Build order:"));

    let output = superbuild(&project).args(["validate", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["valid"], true);
    let order: Vec<&str> =
        results["build_order"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
    assert_eq!(order.len(), 3);
    assert!(position("zlib") < position("png"));
}

#[test]
fn test_validate_json_for_invalid_manifest() {
    let project = Project::new(
        r#"
        [[dependency]]
        name = "png"
        url = "png.tgz"
        depends = ["zlibb"]
        "#,
    );
    superbuild(&project)
        .args(["validate", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\": false"))
        .stdout(predicate::str::contains("zlibb"));
}

#[test]
fn test_missing_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("superbuild")
        .unwrap()
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("superbuild.toml not found"));
}

#[test]
fn test_plan_text_and_json() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. zlib"))
        .stdout(predicate::str::contains("2. png"))
        .stdout(predicate::str::contains("-DPNG_SHARED=OFF"))
        .stdout(predicate::str::contains("doxygen (excluded"));

    let output = superbuild(&project).args(["plan", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tasks = plan["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1]["name"], "png");

    // plan never writes the settings store
    assert!(!project.path().join("build/_superbuild-cache.toml").exists());
}

#[test]
fn test_plan_with_feature_definition() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .args(["-D", "SUPERBUILD_FEATURE_docs=ON", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3. doxygen"));
}

#[test]
fn test_list_shows_state_and_origin() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .args(["-D", "SUPERBUILD_png=OFF", "-D", "SUPERBUILD_zlib=OFF", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"OFF png\s+command line").unwrap())
        .stdout(predicate::str::is_match(r"--- doxygen\s+default").unwrap());
}

#[test]
fn test_disabled_prerequisite_reported() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .args(["-D", "SUPERBUILD_zlib=OFF", "plan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'png'"))
        .stderr(predicate::str::contains("'zlib'"));
}

#[test]
fn test_clean_unknown_dependency() {
    let project = Project::new(MANIFEST);
    superbuild(&project)
        .args(["clean", "zlb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did you mean 'zlib'"));
}

#[test]
fn test_clean_removes_build_and_install_state() {
    let project = Project::new(MANIFEST);
    let build = project.path().join("build/zlib/stamp");
    let install = project.path().join("install/zlib/lib");
    let sources = project.path().join("build/_sources/zlib");
    for dir in [&build, &install, &sources] {
        std::fs::create_dir_all(dir).unwrap();
    }

    superbuild(&project)
        .args(["clean", "zlib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    assert!(!project.path().join("build/zlib").exists());
    assert!(!project.path().join("install/zlib").exists());
    assert!(sources.exists());
}

#[test]
fn test_build_failure_summarizes_and_saves_store() {
    let project = Project::new(
        r#"
        [[dependency]]
        name = "zlib"
        url = "vendor/missing.tar.gz"
        "#,
    );
    superbuild(&project)
        .args(["-D", "CMAKE_BUILD_TYPE=Debug", "build", "--max-parallel", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed zlib (fetch)"))
        .stderr(predicate::str::contains("zlib-fetch.log"));

    let store =
        std::fs::read_to_string(project.path().join("build/_superbuild-cache.toml")).unwrap();
    assert!(store.contains("CMAKE_BUILD_TYPE"));
    assert!(store.contains("Debug"));
}
