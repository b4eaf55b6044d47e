//! # Request context
//!
//! The request and response a controller works on. Both are owned by the
//! transport layer; the controller only holds shared handles to them while a
//! request is being served.
//!
//! - [`Request`] is shared read-only (`Arc<Request>`), apart from the
//!   `in_action` marker the engine maintains.
//! - [`Response`] is shared mutably ([`SharedResponse`]) so the engine,
//!   steps and the rendering capability can all write to it.

use crate::step::Phase;
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Per-request scratch record filled in by hooks and actions.
pub type Locals = Map<String, Value>;

/// A response shared between the transport, the controller and its steps.
pub type SharedResponse = Arc<Mutex<Response>>;

/// Lock a shared response, recovering from poisoning.
pub fn lock_response(response: &SharedResponse) -> MutexGuard<'_, Response> {
    response.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An incoming request as seen by a controller.
#[derive(Debug, Default)]
pub struct Request {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Route and query parameters.
    pub params: HashMap<String, String>,
    /// Session data.
    pub session: Map<String, Value>,
    /// Parsed body, if any.
    pub body: Option<Value>,
    in_action: AtomicBool,
}

impl Request {
    /// Create a request with no parameters, session or body.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a session entry.
    pub fn with_session(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether the step currently running for this request is the action.
    pub fn in_action(&self) -> bool {
        self.in_action.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_action(&self, value: bool) {
        self.in_action.store(value, Ordering::Release);
    }
}

/// Bookkeeping the controller attaches to the response.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    /// Controller serving the request.
    pub controller: String,
    /// Action being dispatched, once known.
    pub action: Option<String>,
    /// When the controller took over the request.
    pub started_at: Instant,
}

impl ResponseInfo {
    /// Time since the controller took over the request.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// A render call recorded for the templating backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCall {
    /// View template path.
    pub view: String,
    /// Layout template path, `None` for no layout.
    pub layout: Option<String>,
    /// Locals at the time of the call.
    pub locals: Locals,
}

/// An outgoing response.
#[derive(Debug)]
pub struct Response {
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Controller bookkeeping, set by `initialize`.
    pub info: Option<ResponseInfo>,
    /// Every step executed for this request, in order.
    pub action_history: Vec<Phase>,
    /// The last render call, if any.
    pub rendered: Option<RenderCall>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            info: None,
            action_history: Vec::new(),
            rendered: None,
        }
    }
}

impl Response {
    /// Create an empty `200` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the response for sharing with a controller.
    pub fn into_shared(self) -> SharedResponse {
        Arc::new(Mutex::new(self))
    }
}
