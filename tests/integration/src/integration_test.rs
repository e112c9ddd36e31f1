//! End-to-end integration test for the extension lifecycle
//!
//! This test exercises the complete flow: settings loading -> discovery ->
//! registration -> boot -> toggling, against the built-in hello-world
//! extension and a real extensions directory.

use cms_extensions::{
    DependencyPolicy, ExtensionManager, Greeter, HelloWorldExtension, Host, ManagerSettings,
    MemoryHost,
};
use cms_test_utils::{Script, ScriptedExtension, TestExtensions};
use pretty_assertions::assert_eq;
use serde_json::json;

const HELLO_MANIFEST: &str = r#"{
    "class": "HelloWorldExtension",
    "name": "Hello World",
    "version": "1.0.0",
    "description": "A simple hello world extension",
    "author": "KeenDigit Team"
}"#;

fn resolve_greeter(manager: &mut ExtensionManager<MemoryHost>) -> Greeter {
    let service = manager
        .host_mut()
        .resolve(HelloWorldExtension::GREETER_SERVICE)
        .expect("greeter should be bound");
    service
        .downcast_ref::<Greeter>()
        .expect("service should be a Greeter")
        .clone()
}

#[test]
fn test_hello_world_full_lifecycle() {
    let mut fixture = TestExtensions::new();
    fixture.add(HelloWorldExtension::ID, HELLO_MANIFEST);
    let mut manager = fixture.manager();

    // Discovery sees exactly one qualifying directory
    let descriptors = manager.discover();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].id, "hello-world");
    assert_eq!(descriptors[0].name(), "Hello World");

    // Startup registers and boots it
    let report = manager.start();
    assert!(report.is_clean(), "startup failures: {:?}", report);
    assert_eq!(report.registration.succeeded, vec!["hello-world"]);
    assert_eq!(manager.enabled_ids(), ["hello-world".to_string()]);

    // The greeter service answers with the default payload
    let greeter = resolve_greeter(&mut manager);
    assert_eq!(
        greeter.payload(),
        json!({
            "message": "Hello World from Extension!",
            "extension": "hello-world",
            "version": "1.0.0",
        })
    );

    // Disable, then enable again
    assert!(manager.disable("hello-world"));
    assert!(manager.enabled_ids().is_empty());
    assert!(!manager.extension("hello-world").unwrap().is_enabled());
    assert!(manager.enable("hello-world"));
    assert!(manager.extension("hello-world").unwrap().is_enabled());

    // Uninstall removes it completely
    assert!(manager.uninstall("hello-world"));
    assert!(!manager.is_registered("hello-world"));
    assert!(manager.is_empty());
}

#[test]
fn test_hello_world_reads_greeting_config() {
    let mut fixture = TestExtensions::new();
    fixture
        .add(HelloWorldExtension::ID, HELLO_MANIFEST)
        .add_config_file("hello-world", "greeting.toml", "message = \"Welcome to the site\"\n");
    let mut manager = fixture.manager();

    assert!(manager.start().is_clean());
    assert_eq!(resolve_greeter(&mut manager).message(), "Welcome to the site");

    let ext = manager.extension("hello-world").unwrap();
    assert_eq!(
        ext.get_config("greeting"),
        Some(&json!({ "message": "Welcome to the site" }))
    );
}

#[test]
fn test_console_host_and_services() {
    let mut fixture = TestExtensions::new();
    fixture.add_scripted("blog", "{}", Script::default());
    let mut manager = ExtensionManager::new(
        MemoryHost::console(),
        fixture.settings(),
        fixture.catalog().clone(),
    );

    assert!(manager.register_extensions().is_clean());
    assert!(manager.host().has_service(&ScriptedExtension::service_name("blog")));
    assert!(manager.host().running_in_console());
}

#[test]
fn test_settings_file_drives_manager() {
    let mut fixture = TestExtensions::new();
    fixture
        .add_scripted("a-blog", r#"{"dependencies": {"base": "^1.0"}}"#, Script::default())
        .add_scripted("base", "{}", Script::default().version("1.2.0"));
    let path = fixture.write_settings(
        "[extensions]\nextensions_dir = \"extensions\"\ndependency_policy = \"resolved\"\n",
    );

    let settings = ManagerSettings::from_path(&path).unwrap();
    assert_eq!(settings.extensions_dir, fixture.extensions_dir());
    assert_eq!(settings.dependency_policy, DependencyPolicy::Resolved);

    let mut manager = ExtensionManager::new(MemoryHost::new(), settings, fixture.catalog().clone());
    let report = manager.register_extensions();
    assert!(report.is_clean(), "failures: {:?}", report.failed);
    assert_eq!(report.succeeded, vec!["base", "a-blog"]);
}

#[test]
fn test_discovery_is_repeatable_and_registration_idempotent() {
    let mut fixture = TestExtensions::new();
    fixture
        .add(HelloWorldExtension::ID, HELLO_MANIFEST)
        .add_scripted("gallery", "{}", Script::default())
        .add_without_manifest("draft")
        .add_without_entry_point("broken");
    let mut manager = fixture.manager();

    let first: Vec<String> = manager.discover().into_iter().map(|d| d.id).collect();
    let second: Vec<String> = manager.discover().into_iter().map(|d| d.id).collect();
    assert_eq!(first, vec!["gallery", "hello-world"]);
    assert_eq!(first, second);

    assert!(manager.register_extensions().is_clean());
    assert!(manager.register_extensions().is_clean());
    assert_eq!(manager.len(), 2);
}
