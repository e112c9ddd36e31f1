//! Extensions shipped with the core.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::catalog::ExtensionCatalog;
use crate::extension::{Extension, ExtensionContext, ExtensionInfo, ExtensionState};
use crate::host::{Provider, Service};

/// Register every built-in extension under its class string.
pub fn register_builtins(catalog: &mut ExtensionCatalog) {
    catalog.register(HelloWorldExtension::CLASS, |ctx| {
        Box::new(HelloWorldExtension::new(ctx))
    });
}

/// Service bound by [`HelloWorldExtension`] under `hello-world.greeter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    message: String,
}

impl Greeter {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// JSON payload served by the greeting endpoint.
    pub fn payload(&self) -> Value {
        json!({
            "message": self.message,
            "extension": HelloWorldExtension::ID,
            "version": HelloWorldExtension::VERSION,
        })
    }
}

/// Minimal extension used to demonstrate the lifecycle.
///
/// The greeting is read from `config/greeting.toml` (`message = "..."`).
#[derive(Debug)]
pub struct HelloWorldExtension {
    state: ExtensionState,
}

impl HelloWorldExtension {
    pub const ID: &'static str = "hello-world";
    pub const CLASS: &'static str = "HelloWorldExtension";
    pub const VERSION: &'static str = "1.0.0";
    pub const GREETER_SERVICE: &'static str = "hello-world.greeter";
    pub const DEFAULT_MESSAGE: &'static str = "Hello World from Extension!";

    pub fn new(ctx: &ExtensionContext) -> Self {
        Self {
            state: ExtensionState::new(ctx),
        }
    }

    fn greeting(&self) -> String {
        self.get_config("greeting.message")
            .and_then(Value::as_str)
            .unwrap_or(Self::DEFAULT_MESSAGE)
            .to_string()
    }
}

impl Extension for HelloWorldExtension {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> ExtensionInfo {
        ExtensionInfo::new("Hello World", Self::VERSION)
            .with_description("A simple hello world extension to demonstrate the extension system")
            .with_author("KeenDigit Team")
    }

    fn state(&self) -> &ExtensionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ExtensionState {
        &mut self.state
    }

    fn providers(&self) -> Vec<Provider> {
        let message = self.greeting();
        vec![Provider::new(Self::GREETER_SERVICE, move || {
            Arc::new(Greeter {
                message: message.clone(),
            }) as Service
        })]
    }
}
