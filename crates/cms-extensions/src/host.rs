//! Host adapter boundary.
//!
//! The extension core never talks to the surrounding application directly.
//! Every lifecycle call receives a `&mut dyn Host` through which it binds
//! services, attaches middleware, subscribes listeners and registers
//! commands. [`MemoryHost`] is a recording implementation used by the CLI and
//! by tests.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A constructed service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Lazily constructs a service the first time it is resolved.
pub type ServiceFactory = Arc<dyn Fn() -> Service + Send + Sync>;

/// Errors a host can report back to a lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host refused the operation.
    #[error("host rejected {operation} '{target}': {reason}")]
    Rejected {
        operation: &'static str,
        target: String,
        reason: String,
    },
}

impl HostError {
    pub fn rejected(
        operation: &'static str,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            operation,
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// A named service an extension contributes to the host container.
#[derive(Clone)]
pub struct Provider {
    pub name: String,
    pub factory: ServiceFactory,
}

impl Provider {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Service + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("name", &self.name).finish()
    }
}

/// Where a middleware declaration is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MiddlewareTarget {
    /// Bind the reference under a named alias.
    Alias(String),
    /// Append the reference to a named middleware group.
    Group(String),
}

/// One middleware declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Middleware {
    pub target: MiddlewareTarget,
    pub reference: String,
}

/// Group that bare middleware references are appended to.
pub const DEFAULT_MIDDLEWARE_GROUP: &str = "web";

impl Middleware {
    pub fn alias(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            target: MiddlewareTarget::Alias(name.into()),
            reference: reference.into(),
        }
    }

    pub fn group(group: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            target: MiddlewareTarget::Group(group.into()),
            reference: reference.into(),
        }
    }

    /// Append to the default `web` group.
    pub fn web(reference: impl Into<String>) -> Self {
        Self::group(DEFAULT_MIDDLEWARE_GROUP, reference)
    }
}

/// Interface the extension core requires from the surrounding application.
pub trait Host {
    /// Register a lazily-constructed service under `name`.
    fn bind_service(&mut self, name: &str, factory: ServiceFactory) -> Result<(), HostError>;

    /// Attach a middleware reference to an alias or group.
    fn attach_middleware(
        &mut self,
        target: &MiddlewareTarget,
        reference: &str,
    ) -> Result<(), HostError>;

    /// Subscribe a listener reference to an event.
    fn subscribe_listener(&mut self, event: &str, listener: &str) -> Result<(), HostError>;

    /// Register a command-line command reference.
    fn register_command(&mut self, reference: &str) -> Result<(), HostError>;

    /// Whether the host runs as a command-line application.
    fn running_in_console(&self) -> bool;

    /// Construct (once) and return the service bound under `name`.
    fn resolve(&mut self, name: &str) -> Option<Service>;
}

/// In-memory host that records everything extensions wire into it.
#[derive(Default)]
pub struct MemoryHost {
    console: bool,
    factories: HashMap<String, ServiceFactory>,
    instances: HashMap<String, Service>,
    bindings: Vec<String>,
    aliases: HashMap<String, String>,
    groups: HashMap<String, Vec<String>>,
    listeners: HashMap<String, Vec<String>>,
    commands: Vec<String>,
}

impl MemoryHost {
    /// A host that does not run in console mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that runs in console mode, so commands get registered.
    pub fn console() -> Self {
        Self {
            console: true,
            ..Self::default()
        }
    }

    /// Names of bound services, in binding order.
    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Middleware reference bound under an alias.
    pub fn middleware_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Middleware references appended to a group.
    pub fn middleware_group(&self, group: &str) -> &[String] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    /// Listener references subscribed to an event.
    pub fn listeners_for(&self, event: &str) -> &[String] {
        self.listeners.get(event).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("console", &self.console)
            .field("bindings", &self.bindings)
            .field("aliases", &self.aliases)
            .field("groups", &self.groups)
            .field("listeners", &self.listeners)
            .field("commands", &self.commands)
            .finish()
    }
}

fn require_name(operation: &'static str, name: &str) -> Result<(), HostError> {
    if name.trim().is_empty() {
        return Err(HostError::rejected(operation, name, "name must not be empty"));
    }
    Ok(())
}

impl Host for MemoryHost {
    fn bind_service(&mut self, name: &str, factory: ServiceFactory) -> Result<(), HostError> {
        require_name("service binding", name)?;
        // Rebinding replaces the factory and drops any constructed instance.
        self.instances.remove(name);
        if self.factories.insert(name.to_string(), factory).is_none() {
            self.bindings.push(name.to_string());
        }
        Ok(())
    }

    fn attach_middleware(
        &mut self,
        target: &MiddlewareTarget,
        reference: &str,
    ) -> Result<(), HostError> {
        require_name("middleware", reference)?;
        match target {
            MiddlewareTarget::Alias(alias) => {
                require_name("middleware alias", alias)?;
                self.aliases.insert(alias.clone(), reference.to_string());
            }
            MiddlewareTarget::Group(group) => {
                require_name("middleware group", group)?;
                let entries = self.groups.entry(group.clone()).or_default();
                if !entries.iter().any(|r| r == reference) {
                    entries.push(reference.to_string());
                }
            }
        }
        Ok(())
    }

    fn subscribe_listener(&mut self, event: &str, listener: &str) -> Result<(), HostError> {
        require_name("event", event)?;
        require_name("listener", listener)?;
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(listener.to_string());
        Ok(())
    }

    fn register_command(&mut self, reference: &str) -> Result<(), HostError> {
        require_name("command", reference)?;
        if !self.commands.iter().any(|c| c == reference) {
            self.commands.push(reference.to_string());
        }
        Ok(())
    }

    fn running_in_console(&self) -> bool {
        self.console
    }

    fn resolve(&mut self, name: &str) -> Option<Service> {
        if let Some(instance) = self.instances.get(name) {
            return Some(Arc::clone(instance));
        }
        let factory = self.factories.get(name)?;
        let instance = factory();
        self.instances.insert(name.to_string(), Arc::clone(&instance));
        Some(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_resolve_is_lazy_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = Provider::new("greeter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(String::from("hello")) as Service
        });

        let mut host = MemoryHost::new();
        host.bind_service(&provider.name, provider.factory.clone()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = host.resolve("greeter").unwrap();
        let second = host.resolve("greeter").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let mut host = MemoryHost::new();
        assert!(host.resolve("missing").is_none());
    }

    #[test]
    fn test_rebind_keeps_single_binding_entry() {
        let mut host = MemoryHost::new();
        let provider = Provider::new("svc", || Arc::new(1u32) as Service);
        host.bind_service("svc", provider.factory.clone()).unwrap();
        host.bind_service("svc", provider.factory).unwrap();
        assert_eq!(host.bindings(), ["svc".to_string()]);
    }

    #[test]
    fn test_middleware_alias_and_group() {
        let mut host = MemoryHost::new();
        let alias = Middleware::alias("auth.admin", "AdminOnly");
        let web = Middleware::web("InjectBanner");

        host.attach_middleware(&alias.target, &alias.reference).unwrap();
        host.attach_middleware(&web.target, &web.reference).unwrap();
        host.attach_middleware(&web.target, &web.reference).unwrap();

        assert_eq!(host.middleware_alias("auth.admin"), Some("AdminOnly"));
        assert_eq!(host.middleware_group("web"), ["InjectBanner".to_string()]);
        assert!(host.middleware_group("api").is_empty());
    }

    #[test]
    fn test_listeners_and_commands() {
        let mut host = MemoryHost::console();
        host.subscribe_listener("post.saved", "ClearCache").unwrap();
        host.subscribe_listener("post.saved", "Reindex").unwrap();
        host.register_command("cms:hello").unwrap();

        assert!(host.running_in_console());
        assert_eq!(host.listeners_for("post.saved").len(), 2);
        assert_eq!(host.commands(), ["cms:hello".to_string()]);
    }

    #[test]
    fn test_empty_names_rejected() {
        let mut host = MemoryHost::new();
        let err = host.subscribe_listener("", "Listener").unwrap_err();
        assert!(err.to_string().contains("event"));
        assert!(host.register_command(" ").is_err());
    }
}
