//! # Step functions
//!
//! A [`StepFn`] is the body of a hook or an action: a callable that receives
//! the per-step [`Scope`] and returns `Ok(())` or an error. Steps carry their
//! own declared name, so registering one without an explicit name (as in
//! `action(index)`) can still key it.
//!
//! A step never advances the pipeline by returning. It resumes it explicitly
//! through [`Scope::next`], either before returning or later from a callback.
//!
//! ```rust,ignore
//! let index = named!(fn index(cx) {
//!     cx.set("items", json!([]));
//!     cx.next().resume();
//!     Ok(())
//! });
//! assert_eq!(index.name(), Some("index"));
//! ```

use crate::{error::BoxError, scope::Scope};
use std::{fmt, sync::Arc};

/// The callable behind a [`StepFn`].
pub type StepBody = dyn Fn(&mut Scope<'_>) -> Result<(), BoxError> + Send + Sync;

/// A hook or action body together with its declared name.
#[derive(Clone)]
pub struct StepFn {
    name: Option<Arc<str>>,
    body: Arc<StepBody>,
}

impl StepFn {
    /// Create a step with a declared name.
    pub fn named<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            body: Arc::new(body),
        }
    }

    /// Create a step without a name.
    ///
    /// Anonymous steps can be hooks, but they are never deduplicated or
    /// skipped, and registering one as an action requires an explicit name.
    pub fn anonymous<F>(body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            body: Arc::new(body),
        }
    }

    /// The declared name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run the body.
    ///
    /// The engine calls this; wrappers call it to delegate to an inner step.
    pub fn call(&self, scope: &mut Scope<'_>) -> Result<(), BoxError> {
        (self.body)(scope)
    }
}

impl fmt::Debug for StepFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFn")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Build a [`StepFn`] whose name is taken from a function declaration.
///
/// Two forms are accepted:
///
/// ```rust,ignore
/// // inline declaration
/// let show = named!(fn show(cx) { cx.next().resume(); Ok(()) });
///
/// // an existing `fn index(cx: &mut Scope<'_>) -> Result<(), BoxError>`
/// let index = named!(index);
/// ```
#[macro_export]
macro_rules! named {
    (fn $name:ident ($scope:ident) $body:block) => {
        $crate::StepFn::named(
            stringify!($name),
            |$scope: &mut $crate::Scope<'_>| -> ::std::result::Result<(), $crate::BoxError> { $body },
        )
    };
    ($name:ident) => {
        $crate::StepFn::named(stringify!($name), $name)
    };
}

/// Which part of the pipeline a queued step came from.
///
/// Used for error attribution and the response's action history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// A before or after hook, with its name when it has one.
    Hook(Option<String>),
    /// The action itself.
    Action(String),
}

impl Phase {
    /// Whether this is the action step.
    pub fn is_action(&self) -> bool {
        matches!(self, Phase::Action(_))
    }

    /// The hook or action name, if known.
    pub fn name(&self) -> Option<&str> {
        match self {
            Phase::Hook(name) => name.as_deref(),
            Phase::Action(name) => Some(name),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Hook(Some(name)) => write!(f, "\"{name}\" hook"),
            Phase::Hook(None) => f.write_str("anonymous hook"),
            Phase::Action(name) => write!(f, "\"{name}\" action"),
        }
    }
}

/// A step scheduled for one dispatch, tagged with its origin.
#[derive(Clone, Debug)]
pub struct QueuedStep {
    pub(crate) phase: Phase,
    pub(crate) step: StepFn,
}

impl QueuedStep {
    pub(crate) fn new(phase: Phase, step: StepFn) -> Self {
        Self { phase, step }
    }

    /// Where this step came from.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The step body.
    pub fn step(&self) -> &StepFn {
        &self.step
    }
}
