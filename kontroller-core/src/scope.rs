//! # Step scope
//!
//! [`Scope`] is what a hook or action body sees while it runs: the request,
//! the response, the locals record and the continuation for the current
//! dispatch. It borrows everything from the engine for the duration of one
//! step body and cannot outlive it; keep the [`Next`] from
//! [`Scope::next`] to resume the pipeline later.

use crate::{
    class::ControllerClass,
    context::{Locals, Request, Response, SharedResponse, lock_response},
    controller::{Controller, Next},
    step::Phase,
};
use serde_json::{Map, Value};
use std::sync::{Arc, MutexGuard};

/// Per-step view of a controller instance.
pub struct Scope<'a> {
    pub(crate) controller: &'a Controller,
    pub(crate) request: &'a Arc<Request>,
    pub(crate) response: &'a SharedResponse,
    pub(crate) action: &'a str,
    pub(crate) phase: &'a Phase,
    pub(crate) locals: &'a mut Locals,
    pub(crate) next: Next,
}

impl<'a> Scope<'a> {
    /// The controller instance running this step.
    pub fn controller(&self) -> &Controller {
        self.controller
    }

    /// The controller name.
    pub fn controller_name(&self) -> &str {
        self.controller.controller_name()
    }

    /// The controller class.
    pub fn class(&self) -> &ControllerClass {
        self.controller.class()
    }

    /// The action being dispatched.
    pub fn action_name(&self) -> &str {
        self.action
    }

    /// The step currently running.
    pub fn phase(&self) -> &Phase {
        self.phase
    }

    /// Whether the running step is the action rather than a hook.
    pub fn in_action(&self) -> bool {
        self.request.in_action()
    }

    /// The request.
    pub fn request(&self) -> &Arc<Request> {
        self.request
    }

    /// Request parameters.
    pub fn params(&self) -> &std::collections::HashMap<String, String> {
        &self.request.params
    }

    /// A single request parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params.get(name).map(String::as_str)
    }

    /// Session data.
    pub fn session(&self) -> &Map<String, Value> {
        &self.request.session
    }

    /// Parsed request body.
    pub fn body(&self) -> Option<&Value> {
        self.request.body.as_ref()
    }

    /// Lock the response for writing.
    ///
    /// Drop the guard before resuming; the next step may want it.
    pub fn response(&self) -> MutexGuard<'_, Response> {
        lock_response(self.response)
    }

    /// The shared response handle, for use outside the step body.
    pub fn shared_response(&self) -> SharedResponse {
        Arc::clone(self.response)
    }

    /// Locals filled in so far.
    pub fn locals(&self) -> &Locals {
        self.locals
    }

    /// Mutable access to the locals.
    pub fn locals_mut(&mut self) -> &mut Locals {
        self.locals
    }

    /// Set one local.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.locals.insert(key.into(), value.into());
    }

    /// Continuation for this dispatch.
    pub fn next(&self) -> Next {
        self.next.clone()
    }
}
