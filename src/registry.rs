//! Named application factories.
//!
//! Workers are told which application to load by an [`AppRef`], an opaque name. The
//! worker resolves it against the shared [`AppRegistry`] and calls the factory itself,
//! so every worker owns a freshly built [`Router`] and nothing is shared between them.

use crate::router::Router;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Builds a fresh application router.
pub type AppFactory = Arc<dyn Fn() -> Router + Send + Sync>;

/// Opaque locator naming a registered application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRef(Arc<str>);

impl AppRef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AppRef {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Application factories keyed by name.
#[derive(Clone, Default)]
pub struct AppRegistry {
    apps: HashMap<String, AppFactory>,
}

impl AppRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A second registration under the same name replaces the first.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Router + Send + Sync + 'static,
    {
        if self.apps.insert(name.to_string(), Arc::new(factory)).is_some() {
            info!(app = %name, "Replaced registered application");
        }
        self
    }

    #[must_use]
    pub fn contains(&self, app: &AppRef) -> bool {
        self.apps.contains_key(app.name())
    }

    /// Build a new instance of the application, if it is registered.
    #[must_use]
    pub fn build(&self, app: &AppRef) -> Option<Router> {
        self.apps.get(app.name()).map(|factory| factory())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.names())
            .finish()
    }
}
