//! Named bindings visible to configuration scripts.
//!
//! A controller class owns a [`Namespace`] of its own methods; the registry
//! owns a global one. Configuration looks names up in the controller first
//! and falls back to the global namespace.

use crate::{class::ControllerClass, error::BoxError, step::StepFn};
use std::{collections::HashMap, fmt, sync::Arc};

/// A configuration-time helper: runs against the class being configured.
pub type HelperFn = dyn Fn(&mut ControllerClass) -> Result<(), BoxError> + Send + Sync;

/// What a name in a [`Namespace`] refers to.
#[derive(Clone)]
pub enum Binding {
    /// A hook or action body, usable as an argument to `action`/`before`/`after`.
    Step(StepFn),
    /// A function called for its effect during configuration.
    Helper(Arc<HelperFn>),
}

impl Binding {
    /// Wrap a configuration helper.
    pub fn helper<F>(f: F) -> Self
    where
        F: Fn(&mut ControllerClass) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Binding::Helper(Arc::new(f))
    }
}

impl From<StepFn> for Binding {
    fn from(step: StepFn) -> Self {
        Binding::Step(step)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Step(step) => f.debug_tuple("Step").field(step).finish(),
            Binding::Helper(_) => f.write_str("Helper(..)"),
        }
    }
}

/// A set of named bindings.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    entries: HashMap<String, Binding>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn define(&mut self, name: impl Into<String>, binding: impl Into<Binding>) -> &mut Self {
        self.entries.insert(name.into(), binding.into());
        self
    }

    /// Bind a configuration helper under `name`.
    pub fn helper<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut ControllerClass) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.define(name, Binding::helper(f))
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
