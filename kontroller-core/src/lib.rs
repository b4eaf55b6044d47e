//! # kontroller-core
//!
//! Controller model and dispatch engine for the Kontroller request pipeline.
//!
//! This crate has no configuration language and no registry; it is what a
//! routing layer needs to run controllers. The script evaluator and the
//! registry live in `kontroller-std`.
//!
//! # Pipeline
//!
//! A controller class ([`ControllerClass`]) holds actions and before/after
//! hooks. Serving a request builds a queue for the requested action:
//!
//! ```text
//! before hooks (filtered, deduplicated) → action → after hooks
//! ```
//!
//! and runs it one step at a time. Each step receives a [`Scope`] and
//! advances the pipeline explicitly through [`Next::resume`], which allows a
//! step to finish asynchronous work before the rest of the queue runs.
//!
//! # Error Types
//!
//! - [`ConfigError`] - Configuration failures
//! - [`DispatchError`] - Dispatch failures, attributed to the failing step

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod class;
mod context;
mod controller;
mod error;
mod filter;
mod namespace;
mod render;
mod scope;
mod step;

// Re-exports
pub use class::{ActionRegistrar, ControllerClass, DispatchOptions, HookEntry, HookList, Layout};
pub use context::{
    Locals, RenderCall, Request, Response, ResponseInfo, SharedResponse, lock_response,
};
pub use controller::{Controller, Next, OuterNext, RunState};
pub use error::{BoxError, ConfigError, DispatchError, StepFailure};
pub use filter::{HookFilter, Skip};
pub use namespace::{Binding, HelperFn, Namespace};
pub use render::Renderer;
pub use scope::Scope;
pub use step::{Phase, QueuedStep, StepBody, StepFn};
