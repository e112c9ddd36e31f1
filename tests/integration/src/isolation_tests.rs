//! Fault isolation, dependency ordering and removal across a whole batch
//!
//! Each test builds a mixed extensions directory where some extensions
//! misbehave, then checks that the rest of the batch is unaffected.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use cms_extensions::{
    DependencyPolicy, FailureReason, HelloWorldExtension, Phase, SharedExtensionManager,
};
use cms_test_utils::{Outcome, Script, ScriptedExtension, TestExtensions};
use pretty_assertions::assert_eq;

const HELLO_MANIFEST: &str = r#"{"class": "HelloWorldExtension", "version": "1.0.0"}"#;

#[test]
fn test_register_failures_do_not_stop_the_batch() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("alpha", "{}", Script::default())
        .add_scripted("beta", "{}", Script::default().register(Outcome::Fail))
        .add_scripted("gamma", "{}", Script::default().register(Outcome::Panic))
        .add(HelloWorldExtension::ID, HELLO_MANIFEST)
        .add("orphan", "{}");
    let mut manager = fixture.manager();

    let report = manager.start();
    assert_eq!(report.registration.succeeded, vec!["alpha", "hello-world"]);
    assert_eq!(report.registration.failed.len(), 3);

    let beta = report.registration.failure_for("beta").unwrap();
    assert_eq!(beta.phase(), Phase::Register);
    assert!(matches!(beta.reason, FailureReason::Lifecycle { .. }));

    let gamma = report.registration.failure_for("gamma").unwrap();
    assert!(matches!(
        gamma.reason,
        FailureReason::Panicked { phase: Phase::Register, .. }
    ));

    let orphan = report.registration.failure_for("orphan").unwrap();
    assert_eq!(
        orphan.reason,
        FailureReason::ClassMissing {
            class: "OrphanExtension".to_string()
        }
    );

    assert_eq!(manager.registered_ids(), vec!["alpha", "hello-world"]);
    assert_eq!(
        manager.enabled_ids(),
        ["alpha".to_string(), "hello-world".to_string()]
    );
}

#[test]
fn test_boot_failures_leave_extension_registered_but_disabled() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("alpha", "{}", Script::default().boot(Outcome::Panic))
        .add_scripted("beta", "{}", Script::default())
        .add_scripted("gamma", "{}", Script::default().boot(Outcome::Fail));
    let mut manager = fixture.manager();

    let report = manager.start();
    assert!(report.registration.is_clean());
    assert_eq!(report.boot.succeeded, vec!["beta"]);
    assert!(matches!(
        report.boot.failure_for("alpha").unwrap().reason,
        FailureReason::Panicked { phase: Phase::Boot, .. }
    ));
    assert!(matches!(
        report.boot.failure_for("gamma").unwrap().reason,
        FailureReason::Lifecycle { phase: Phase::Boot, .. }
    ));

    assert!(manager.is_registered("alpha"));
    assert!(!manager.is_enabled("alpha"));
    assert!(!manager.is_enabled("gamma"));
    assert!(manager.is_enabled("beta"));
    assert_eq!(manager.len(), 3);
}

#[test]
fn test_failing_deactivate_keeps_extension_enabled() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("sticky", "{}", Script::default().deactivate(Outcome::Fail))
        .add_scripted("crashy", "{}", Script::default().deactivate(Outcome::Panic));
    let mut manager = fixture.manager();
    assert!(manager.start().is_clean());

    let failure = manager.try_disable("sticky").unwrap_err();
    assert_eq!(failure.phase(), Phase::Deactivate);
    assert!(manager.is_enabled("sticky"));

    assert!(!manager.disable("crashy"));
    assert!(manager.is_enabled("crashy"));
}

#[test]
fn test_registration_order_is_alphabetical_and_order_sensitive() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("a-shop", r#"{"dependencies": {"m-payments": "*"}}"#, Script::default())
        .add_scripted("m-payments", "{}", Script::default())
        .add_scripted("z-reviews", r#"{"dependencies": {"m-payments": "*"}}"#, Script::default());

    let report = fixture.manager().register_extensions();
    assert_eq!(report.succeeded, vec!["m-payments", "z-reviews"]);
    assert_eq!(
        report.failure_for("a-shop").unwrap().reason,
        FailureReason::DependencyUnmet {
            dependency: "m-payments".to_string(),
            constraint: "*".to_string(),
        }
    );

    let resolved = fixture
        .manager_with(DependencyPolicy::Resolved)
        .register_extensions();
    assert!(resolved.is_clean(), "failures: {:?}", resolved.failed);
    assert_eq!(resolved.succeeded, vec!["m-payments", "a-shop", "z-reviews"]);
}

#[test]
fn test_resolved_policy_excludes_cycle_and_its_dependents() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("ping", r#"{"dependencies": {"pong": "*"}}"#, Script::default())
        .add_scripted("pong", r#"{"dependencies": {"ping": "*"}}"#, Script::default())
        .add_scripted("spectator", r#"{"dependencies": {"ping": "*"}}"#, Script::default())
        .add_scripted("bystander", "{}", Script::default());

    let report = fixture
        .manager_with(DependencyPolicy::Resolved)
        .register_extensions();

    assert_eq!(report.succeeded, vec!["bystander"]);
    for id in ["ping", "pong", "spectator"] {
        let failure = report.failure_for(id).unwrap();
        assert!(
            matches!(failure.reason, FailureReason::DependencyCycle { .. }),
            "{id}: {failure}"
        );
    }
}

#[test]
fn test_code_declared_dependencies_are_checked() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("base", "{}", Script::default().version("1.4.0"))
        .add_scripted("theme", "{}", Script::default().depends_on("base", ">=2.0"));

    let report = fixture
        .manager_with(DependencyPolicy::Resolved)
        .register_extensions();
    assert_eq!(report.succeeded, vec!["base"]);
    assert_eq!(
        report.failure_for("theme").unwrap().reason,
        FailureReason::VersionMismatch {
            dependency: "base".to_string(),
            constraint: ">=2.0".to_string(),
            found: "1.4.0".to_string(),
        }
    );
}

#[test]
fn test_factory_runs_once_per_extension() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut fixture = TestExtensions::new();
    fixture.add_scripted("counted", "{}", Script::default().counted(&counter));
    let mut manager = fixture.manager();

    manager.register_extensions();
    manager.register_extensions();
    let path = fixture.path_of("counted");
    assert!(manager.register_extension("counted", &path).is_ok());

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_uninstall_respects_dependents() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("base", "{}", Script::default())
        .add_scripted("blog", r#"{"dependencies": {"base": "*"}}"#, Script::default());
    let mut manager = fixture.manager();
    assert!(manager.start().is_clean());

    let refused = manager.try_uninstall("base").unwrap_err();
    assert_eq!(
        refused.reason,
        FailureReason::DependentsRegistered {
            dependents: vec!["blog".to_string()]
        }
    );
    assert!(manager.is_registered("base"));

    assert!(manager.uninstall("blog"));
    assert!(manager.uninstall("base"));
    assert!(manager.is_empty());
    assert!(manager.enabled_ids().is_empty());
}

#[test]
fn test_failing_uninstall_keeps_extension() {
    let mut fixture = TestExtensions::new();
    fixture.add_scripted("sticky", "{}", Script::default().uninstall(Outcome::Fail));
    let mut manager = fixture.manager();
    assert!(manager.start().is_clean());

    let failure = manager.try_uninstall("sticky").unwrap_err();
    assert_eq!(failure.phase(), Phase::Uninstall);
    assert!(manager.is_registered("sticky"));
}

#[test]
fn test_unknown_ids_are_reported() {
    let fixture = TestExtensions::new();
    let mut manager = fixture.manager();

    for result in [
        manager.try_enable("ghost"),
        manager.try_disable("ghost"),
        manager.try_uninstall("ghost"),
    ] {
        assert_eq!(result.unwrap_err().reason, FailureReason::UnknownExtension);
    }
}

#[test]
fn test_shared_manager_across_threads() {
    let mut fixture = TestExtensions::new();
    for id in ["alpha", "beta", "gamma"] {
        fixture.add_scripted(id, "{}", Script::default());
    }
    let shared = SharedExtensionManager::new(fixture.manager());
    assert!(shared.register_extensions().is_clean());
    assert!(shared.boot_extensions().is_clean());

    let handles: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(|id| {
            let shared = shared.clone();
            thread::spawn(move || {
                assert!(shared.disable(id));
                assert!(shared.with(|m| {
                    m.host()
                        .has_service(&ScriptedExtension::service_name(id))
                }));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(shared.registered_ids().len(), 3);
    assert!(shared.enabled_ids().is_empty());
}
