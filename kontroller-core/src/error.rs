//! Error types for Kontroller.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`ConfigError`] - Configuration-time failures, returned synchronously
//! - [`DispatchError`] - Dispatch-time failures, delivered through the outer continuation
//! - [`StepFailure`] - What went wrong inside a single hook or action body

use crate::step::Phase;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while a controller class is being configured.
///
/// These surface to whoever evaluates the configuration and are never
/// annotated with action or hook attribution.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `action` was given an anonymous step and no explicit name.
    #[error("named function required when action name is omitted")]
    UnnamedAction,

    /// The configuration script could not be parsed.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
        /// What the parser expected.
        message: String,
    },

    /// An identifier resolved neither in the controller nor in the global namespace.
    #[error("{name} is not defined (line {line})")]
    UndefinedIdentifier {
        /// The identifier.
        name: String,
        /// 1-based line.
        line: usize,
    },

    /// A step function was called as if it were a configuration helper.
    #[error("{name} is not a function (line {line})")]
    NotCallable {
        /// The identifier.
        name: String,
        /// 1-based line.
        line: usize,
    },

    /// A configuration helper was passed where a step function was expected.
    #[error("{name} is not a step function (line {line})")]
    NotAStep {
        /// The identifier.
        name: String,
        /// 1-based line.
        line: usize,
    },

    /// A vocabulary word was called with arguments it does not accept.
    #[error("invalid arguments to {call} at line {line}: {message}")]
    InvalidArgument {
        /// The vocabulary word.
        call: String,
        /// 1-based line.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A configuration helper returned an error.
    #[error("{name} failed at line {line}: {source}")]
    Helper {
        /// The helper's name.
        name: String,
        /// 1-based line.
        line: usize,
        /// The helper's error.
        #[source]
        source: BoxError,
    },

    /// `load` named a script the library does not know.
    #[error("unknown script {name} (line {line})")]
    UnknownScript {
        /// The script name.
        name: String,
        /// 1-based line.
        line: usize,
    },

    /// `load` named a script that is already being evaluated.
    #[error("script {name} is already being loaded (line {line})")]
    RecursiveLoad {
        /// The script name.
        name: String,
        /// 1-based line.
        line: usize,
    },
}

/// Errors produced while dispatching an action.
///
/// These are always delivered through the outer continuation passed to
/// [`Controller::perform`](crate::Controller::perform); dispatch never
/// returns or raises them.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No action of that name is registered on the controller.
    #[error("undefined action \"{action}\" in {controller} controller")]
    UndefinedAction {
        /// Controller name.
        controller: String,
        /// Requested action.
        action: String,
    },

    /// The controller instance was already dispatching.
    #[error("{controller} controller is busy, refused {}", describe_refused(.action.as_deref()))]
    Reentrant {
        /// Controller name.
        controller: String,
        /// The refused action, when known.
        action: Option<String>,
    },

    /// A hook or action body failed.
    #[error("{source} in {controller} controller during {phase}")]
    Step {
        /// Controller name.
        controller: String,
        /// The action being dispatched.
        action: String,
        /// The step that failed.
        phase: Phase,
        /// The failure itself.
        #[source]
        source: StepFailure,
    },
}

fn describe_refused(action: Option<&str>) -> String {
    match action {
        Some(action) => format!("\"{action}\" action"),
        None => "initialization".to_string(),
    }
}

impl DispatchError {
    /// The controller the error belongs to.
    pub fn controller(&self) -> &str {
        match self {
            Self::UndefinedAction { controller, .. }
            | Self::Reentrant { controller, .. }
            | Self::Step { controller, .. } => controller,
        }
    }

    /// The action involved, if one was known.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::UndefinedAction { action, .. } | Self::Step { action, .. } => Some(action),
            Self::Reentrant { action, .. } => action.as_deref(),
        }
    }

    /// The failing step, for [`DispatchError::Step`].
    pub fn phase(&self) -> Option<&Phase> {
        match self {
            Self::Step { phase, .. } => Some(phase),
            _ => None,
        }
    }
}

/// A failure inside a single hook or action body.
#[derive(Error, Debug)]
pub enum StepFailure {
    /// The body returned an error.
    #[error(transparent)]
    Error(BoxError),

    /// The body panicked.
    #[error("panicked: {0}")]
    Panic(String),
}

impl From<BoxError> for StepFailure {
    fn from(err: BoxError) -> Self {
        StepFailure::Error(err)
    }
}
