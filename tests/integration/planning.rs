use superbuild_cli::core::SuperbuildError;
use superbuild_cli::resolver::{EntryState, Phase, Step};

use crate::Project;

const STACK: &str = r#"
[features.solvers]
default = false

[[dependency]]
name = "a"
url = "vendor/a-1.0.tar.gz"

[[dependency]]
name = "b"
git = "https://example.org/b.git"
tag = "v2.1"
depends = ["a"]
args = ["FOO=1"]

[[dependency]]
name = "c"
url = "vendor/c.zip"
feature = "solvers"
depends = ["b"]
"#;

#[test]
fn test_prerequisite_planned_first_with_base_args_then_extra_args() {
    let project = Project::new(STACK);
    let (_, plan) = project.plan(&[]).unwrap();

    let names: Vec<_> = plan.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);

    let a = plan.task("a").unwrap();
    assert_eq!(
        a.arguments.get("CMAKE_INSTALL_PREFIX"),
        Some(project.path().join("install").join("a").to_str().unwrap())
    );

    let b = plan.task("b").unwrap();
    assert_eq!(b.prerequisites, ["a"]);
    let prefix = b.arguments.position("CMAKE_INSTALL_PREFIX").unwrap();
    let build_type = b.arguments.position("CMAKE_BUILD_TYPE").unwrap();
    let prefix_path = b.arguments.position("CMAKE_PREFIX_PATH").unwrap();
    let foo = b.arguments.position("FOO").unwrap();
    assert!(prefix < build_type && build_type < prefix_path && prefix_path < foo);
    assert_eq!(foo, b.arguments.len() - 1);
    assert_eq!(b.arguments.get("FOO"), Some("1"));

    assert!(matches!(
        b.steps(Phase::Fetch).first(),
        Some(Step::GitCheckout { revision, .. }) if revision == "v2.1"
    ));
}

#[test]
fn test_feature_switch_enables_group() {
    let project = Project::new(STACK);

    let (_, plan) = project.plan(&[]).unwrap();
    let c = plan.entries.iter().find(|e| e.name == "c").unwrap();
    assert_eq!(c.state, EntryState::Excluded);
    assert!(plan.task("c").is_none());

    let (_, plan) = project.plan(&["SUPERBUILD_FEATURE_solvers=ON"]).unwrap();
    assert!(plan.task("c").is_some());
}

#[test]
fn test_enabled_dependency_with_disabled_prerequisite_is_fatal() {
    let project = Project::new(STACK);
    let err = project.plan(&["SUPERBUILD_a=OFF"]).unwrap_err();

    match err.downcast_ref::<SuperbuildError>() {
        Some(SuperbuildError::PrerequisiteNotEnabled {
            name,
            prerequisite,
            ..
        }) => {
            assert_eq!(name, "b");
            assert_eq!(prerequisite, "a");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Turning the dependent off too resolves it
    let (_, plan) = project.plan(&["SUPERBUILD_a=OFF", "SUPERBUILD_b=OFF"]).unwrap();
    assert!(plan.tasks.is_empty());
    assert_eq!(plan.disabled.len(), 2);
}

#[test]
fn test_toggles_persist_in_store() {
    let project = Project::new(STACK);
    let (store, _) = project.plan(&["SUPERBUILD_a=OFF", "SUPERBUILD_b=OFF"]).unwrap();
    store.save().unwrap();

    let (_, plan) = project.plan(&[]).unwrap();
    assert!(plan.tasks.is_empty());

    let (_, plan) = project.plan(&["SUPERBUILD_a=ON", "SUPERBUILD_b=ON"]).unwrap();
    assert_eq!(plan.tasks.len(), 2);
}

#[test]
fn test_both_locators_rejected_at_load() {
    let project = Project::new(
        r#"
        [[dependency]]
        name = "zlib"
        url = "zlib.tar.gz"
        git = "https://example.org/zlib.git"
        tag = "v1.3"
        "#,
    );
    let err = superbuild_cli::cli::CommandContext::from_manifest_path(&project.manifest_path, None)
        .unwrap_err();
    let known = err
        .chain()
        .find_map(|e| e.downcast_ref::<SuperbuildError>())
        .unwrap();
    assert!(matches!(known, SuperbuildError::InvalidDependency { name, .. } if name == "zlib"));
}

#[test]
fn test_cycle_rejected_at_load() {
    let project = Project::new(
        r#"
        [[dependency]]
        name = "x"
        url = "x.tgz"
        depends = ["y"]

        [[dependency]]
        name = "y"
        url = "y.tgz"
        depends = ["x"]
        "#,
    );
    let err = superbuild_cli::cli::CommandContext::from_manifest_path(&project.manifest_path, None)
        .unwrap_err();
    assert!(err.chain().any(|e| matches!(
        e.downcast_ref::<SuperbuildError>(),
        Some(SuperbuildError::CircularDependency { .. })
    )));
}

#[test]
fn test_restrict_to_keeps_prerequisites() {
    let project = Project::new(STACK);
    let (_, mut plan) = project.plan(&["SUPERBUILD_FEATURE_solvers=ON"]).unwrap();
    plan.restrict_to(&["b".to_string()]).unwrap();

    let names: Vec<_> = plan.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
}

const SUITES: &str = r#"
[features.suite-a]
default = false

[features.suite-b]
default = false

[[dependency]]
name = "shared"
url = "vendor/shared.tgz"
feature = "suite-a"

[[dependency]]
name = "a"
url = "vendor/a.tgz"
feature = "suite-a"
depends = ["shared"]

[[dependency]]
name = "b"
url = "vendor/b.tgz"
feature = "suite-b"
depends = ["shared"]
"#;

#[test]
fn test_shared_prerequisite_follows_either_suite() {
    let project = Project::new(SUITES);

    let (_, plan) = project.plan(&[]).unwrap();
    assert!(plan.tasks.is_empty());
    assert_eq!(plan.excluded.len(), 3);

    let (_, plan) = project.plan(&["SUPERBUILD_FEATURE_suite-b=ON"]).unwrap();
    let names: Vec<_> = plan.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["shared", "b"]);
    let shared = plan.entries.iter().find(|e| e.name == "shared").unwrap();
    assert_eq!(shared.state, EntryState::Enabled);
    assert_eq!(shared.reason.as_deref(), Some("required by b"));
    assert_eq!(plan.excluded.len(), 1);
    assert_eq!(plan.excluded[0].name, "a");

    let (_, plan) = project.plan(&["SUPERBUILD_FEATURE_suite-a=ON"]).unwrap();
    let names: Vec<_> = plan.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["shared", "a"]);
}

#[test]
fn test_pulled_in_prerequisite_still_honours_its_toggle() {
    let project = Project::new(SUITES);
    let err = project
        .plan(&["SUPERBUILD_FEATURE_suite-b=ON", "SUPERBUILD_shared=OFF"])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SuperbuildError>(),
        Some(SuperbuildError::PrerequisiteNotEnabled { name, prerequisite, .. })
            if name == "b" && prerequisite == "shared"
    ));
}
