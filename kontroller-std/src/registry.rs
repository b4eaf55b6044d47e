//! # Controller registry
//!
//! The registry owns controller definitions (a name, a configuration script
//! and the controller's own namespace) and turns them into classes on first
//! use. Classes are cached by name and definition generation, so a class is
//! configured once and rebuilt only after the controller is redefined.
//!
//! ```rust,ignore
//! let registry = RegistryBuilder::new()
//!     .default_layout("site")
//!     .global("authenticate", named!(authenticate))
//!     .script("application", "before(authenticate)")
//!     .controller("posts", "load('application'); action(index)", posts_methods)
//!     .build();
//!
//! let controller = registry.instance("posts")?;
//! ```

use crate::dsl::{self, ScriptLibrary};
use kontroller_core::{
    Binding, BoxError, ConfigError, Controller, ControllerClass, DispatchOptions, Namespace,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};
use thiserror::Error;

/// Errors raised while looking up a controller.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No controller of that name is defined.
    #[error("unknown controller {0}")]
    UnknownController(String),

    /// The controller's configuration failed.
    #[error("failed to configure {controller} controller: {source}")]
    Config {
        /// Controller name.
        controller: String,
        /// What went wrong.
        #[source]
        source: ConfigError,
    },
}

/// How a controller is defined.
#[derive(Clone, Debug)]
struct Definition {
    script: Arc<str>,
    methods: Namespace,
    generation: u64,
}

struct Cached {
    generation: u64,
    class: Arc<ControllerClass>,
}

/// Builds controller classes from their definitions and hands out instances.
pub struct ControllerRegistry {
    options: DispatchOptions,
    globals: Namespace,
    library: ScriptLibrary,
    definitions: Mutex<HashMap<String, Definition>>,
    classes: Mutex<HashMap<String, Cached>>,
    shared: Mutex<HashMap<String, Controller>>,
    generations: AtomicU64,
    builds: AtomicUsize,
}

impl ControllerRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Dispatch options given to every class.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// The global namespace.
    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// Whether a controller of this name is defined.
    pub fn contains(&self, name: &str) -> bool {
        lock(&self.definitions).contains_key(name)
    }

    /// Names of all defined controllers, sorted.
    pub fn controller_names(&self) -> Vec<String> {
        let mut names: Vec<_> = lock(&self.definitions).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// How many classes have been configured so far, rebuilds included.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Define or redefine a controller.
    ///
    /// The next lookup rebuilds the class, since step bodies bound in
    /// `methods` may differ even when the script and names do not.
    pub fn define(&self, name: impl Into<String>, script: impl Into<Arc<str>>, methods: Namespace) {
        let name = name.into();
        let definition = Definition {
            script: script.into(),
            methods,
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
        };
        tracing::debug!(controller = %name, generation = definition.generation, "controller defined");
        lock(&self.definitions).insert(name, definition);
    }

    /// The configured class for `name`, building it if needed.
    pub fn class(&self, name: &str) -> Result<Arc<ControllerClass>, RegistryError> {
        let definition = lock(&self.definitions)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownController(name.to_string()))?;

        let mut classes = lock(&self.classes);
        if let Some(cached) = classes.get(name) {
            if cached.generation == definition.generation {
                return Ok(Arc::clone(&cached.class));
            }
            tracing::debug!(controller = name, "definition changed, rebuilding");
        }

        let class = Arc::new(self.configure(name, &definition)?);
        classes.insert(
            name.to_string(),
            Cached {
                generation: definition.generation,
                class: Arc::clone(&class),
            },
        );
        Ok(class)
    }

    fn configure(&self, name: &str, definition: &Definition) -> Result<ControllerClass, RegistryError> {
        let mut class = ControllerClass::new(name)
            .with_options(self.options.clone())
            .with_methods(definition.methods.clone());
        class.reset();

        dsl::evaluate(&definition.script, &mut class, &self.globals, &self.library).map_err(
            |source| {
                tracing::warn!(controller = name, error = %source, "controller configuration failed");
                RegistryError::Config {
                    controller: name.to_string(),
                    source,
                }
            },
        )?;

        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            controller = name,
            actions = class.action_names().len(),
            before = class.before_hooks().len(),
            after = class.after_hooks().len(),
            "controller class built"
        );
        Ok(class)
    }

    /// A fresh instance of `name`.
    ///
    /// Instances are cheap; taking one per request avoids reentrancy
    /// refusals entirely.
    pub fn instance(&self, name: &str) -> Result<Controller, RegistryError> {
        Ok(Controller::new(self.class(name)?))
    }

    /// The instance of `name` shared by every caller.
    ///
    /// A shared instance serves one request at a time; overlapping requests
    /// are refused with a reentrancy error. Rebuilding the class replaces it.
    pub fn shared_instance(&self, name: &str) -> Result<Controller, RegistryError> {
        let class = self.class(name)?;
        let mut shared = lock(&self.shared);
        match shared.get(name) {
            Some(controller) if Arc::ptr_eq(controller.class(), &class) => Ok(controller.clone()),
            _ => {
                let controller = Controller::new(class);
                shared.insert(name.to_string(), controller.clone());
                Ok(controller)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for constructing a [`ControllerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    options: DispatchOptions,
    globals: Namespace,
    library: ScriptLibrary,
    definitions: HashMap<String, Definition>,
    generations: u64,
}

impl RegistryBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout used by classes that do not set one (`"application"` by default).
    pub fn default_layout(mut self, layout: impl Into<String>) -> Self {
        self.options.default_layout = layout.into();
        self
    }

    /// Whether panics in steps become dispatch errors (on by default).
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.options.catch_panics = enabled;
        self
    }

    /// Whether executed steps are recorded on the response (on by default).
    pub fn record_history(mut self, enabled: bool) -> Self {
        self.options.record_history = enabled;
        self
    }

    /// Bind a name in the global namespace.
    pub fn global(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.globals.define(name, binding);
        self
    }

    /// Bind a configuration helper in the global namespace.
    pub fn helper<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ControllerClass) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.globals.helper(name, f);
        self
    }

    /// Add a shared script for `load`.
    pub fn script(mut self, name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        self.library.insert(name, source);
        self
    }

    /// Define a controller.
    pub fn controller(
        mut self,
        name: impl Into<String>,
        script: impl Into<Arc<str>>,
        methods: Namespace,
    ) -> Self {
        let definition = Definition {
            script: script.into(),
            methods,
            generation: self.generations,
        };
        self.generations += 1;
        self.definitions.insert(name.into(), definition);
        self
    }

    /// Build the registry. Classes are configured lazily.
    pub fn build(self) -> ControllerRegistry {
        ControllerRegistry {
            options: self.options,
            globals: self.globals,
            library: self.library,
            definitions: Mutex::new(self.definitions),
            classes: Mutex::new(HashMap::new()),
            shared: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(self.generations),
            builds: AtomicUsize::new(0),
        }
    }
}
