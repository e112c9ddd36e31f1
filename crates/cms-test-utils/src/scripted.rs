//! [`ScriptedExtension`]: a test extension whose lifecycle outcomes are
//! chosen by the test.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cms_extensions::{
    Dependencies, Extension, ExtensionCatalog, ExtensionInfo, ExtensionState, Host,
    LifecycleError, LifecycleResult, Provider, Service, class_name_for,
};

/// What one lifecycle call does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Succeed,
    /// Return a `LifecycleError`.
    Fail,
    /// Panic.
    Panic,
}

impl Outcome {
    fn apply(self, phase: &str) -> LifecycleResult {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail => Err(LifecycleError::failed(format!("{phase} refused by script"))),
            Self::Panic => panic!("{phase} panicked by script"),
        }
    }
}

/// Behaviour of a [`ScriptedExtension`].
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Reported version; `1.0.0` when unset.
    pub version: Option<String>,
    /// Dependencies declared in code, on top of the manifest's.
    pub dependencies: Dependencies,
    pub register: Outcome,
    pub boot: Outcome,
    pub deactivate: Outcome,
    pub uninstall: Outcome,
    /// Counts factory invocations when set.
    pub instances: Option<Arc<AtomicUsize>>,
}

impl Script {
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn depends_on(mut self, id: &str, constraint: &str) -> Self {
        self.dependencies.insert(id.to_string(), constraint.to_string());
        self
    }

    pub fn register(mut self, outcome: Outcome) -> Self {
        self.register = outcome;
        self
    }

    pub fn boot(mut self, outcome: Outcome) -> Self {
        self.boot = outcome;
        self
    }

    pub fn deactivate(mut self, outcome: Outcome) -> Self {
        self.deactivate = outcome;
        self
    }

    pub fn uninstall(mut self, outcome: Outcome) -> Self {
        self.uninstall = outcome;
        self
    }

    /// Count how many instances the catalog constructs.
    pub fn counted(mut self, counter: &Arc<AtomicUsize>) -> Self {
        self.instances = Some(Arc::clone(counter));
        self
    }
}

/// Extension that binds `<id>.service` on register and otherwise does what
/// its [`Script`] says.
pub struct ScriptedExtension {
    id: String,
    script: Script,
    state: ExtensionState,
}

impl ScriptedExtension {
    /// Register a factory for `id` under its conventional class name.
    pub fn add_to(catalog: &mut ExtensionCatalog, id: &str, script: Script) {
        let owned = id.to_string();
        catalog.register(class_name_for(id), move |ctx| {
            if let Some(ref counter) = script.instances {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Box::new(ScriptedExtension {
                id: owned.clone(),
                script: script.clone(),
                state: ExtensionState::new(ctx),
            })
        });
    }

    /// Name of the service this extension binds.
    pub fn service_name(id: &str) -> String {
        format!("{id}.service")
    }
}

impl Extension for ScriptedExtension {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> ExtensionInfo {
        let version = self.script.version.as_deref().unwrap_or("1.0.0");
        ExtensionInfo::new(self.id.clone(), version)
    }

    fn state(&self) -> &ExtensionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ExtensionState {
        &mut self.state
    }

    fn dependencies(&self) -> Dependencies {
        self.script.dependencies.clone()
    }

    fn providers(&self) -> Vec<Provider> {
        let id = self.id.clone();
        vec![Provider::new(Self::service_name(&self.id), move || {
            Arc::new(id.clone()) as Service
        })]
    }

    fn register(&mut self, host: &mut dyn Host) -> LifecycleResult {
        self.script.register.apply("register")?;
        for provider in self.providers() {
            host.bind_service(&provider.name, provider.factory)?;
        }
        Ok(())
    }

    fn boot(&mut self, _host: &mut dyn Host) -> LifecycleResult {
        self.script.boot.apply("boot")?;
        self.state.set_enabled(true);
        Ok(())
    }

    fn deactivate(&mut self, _host: &mut dyn Host) -> LifecycleResult {
        self.script.deactivate.apply("deactivate")?;
        self.state.set_enabled(false);
        Ok(())
    }

    fn uninstall(&mut self, _host: &mut dyn Host) -> LifecycleResult {
        self.script.uninstall.apply("uninstall")?;
        self.state.set_enabled(false);
        Ok(())
    }
}
