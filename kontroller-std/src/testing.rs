//! Testing utilities for Kontroller.
//!
//! This module provides utilities to make testing controllers easier.
//!
//! # Features
//!
//! - [`OrderLog`]: Steps that record the order they ran in
//! - [`OuterProbe`]: An outer continuation that captures dispatch results
//! - [`ParkedNext`]: A step that suspends and hands its continuation to the test
//! - [`failing_step`] / [`panicking_step`]: Steps that fail on purpose
//! - [`serve`]: Run one action against a fresh request and response

use kontroller_core::{
    BoxError, Controller, DispatchError, Next, OuterNext, Request, Response, SharedResponse,
    StepFn,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Order Log
// ============================================================================

/// A shared log of step names, in execution order.
///
/// # Example
///
/// ```rust,ignore
/// let log = OrderLog::new();
/// class.before(None, log.step("auth"), None);
/// class.action(None, log.step("index"))?;
///
/// serve(&Controller::from(class), "index");
/// assert_eq!(log.entries(), ["auth", "index"]);
/// ```
#[derive(Clone, Default)]
pub struct OrderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A named step that records `name` and resumes.
    pub fn step(&self, name: &str) -> StepFn {
        let log = self.clone();
        let label = name.to_string();
        StepFn::named(name.to_string(), move |cx| {
            log.push(&label);
            cx.next().resume();
            Ok(())
        })
    }

    /// A named step that records `name` but never resumes.
    pub fn halting_step(&self, name: &str) -> StepFn {
        let log = self.clone();
        let label = name.to_string();
        StepFn::named(name.to_string(), move |_cx| {
            log.push(&label);
            Ok(())
        })
    }

    /// Record an entry.
    pub fn push(&self, entry: &str) {
        lock(&self.entries).push(entry.to_string());
    }

    /// Everything recorded so far.
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Clear the log.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

// ============================================================================
// Outer Probe
// ============================================================================

/// Captures every result delivered to an outer continuation.
#[derive(Clone, Default)]
pub struct OuterProbe {
    results: Arc<Mutex<Vec<Result<(), DispatchError>>>>,
}

impl OuterProbe {
    /// Create a probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// An outer continuation feeding this probe.
    pub fn outer(&self) -> OuterNext {
        let results = Arc::clone(&self.results);
        Box::new(move |result| lock(&results).push(result))
    }

    /// How many times the continuation has been called.
    pub fn calls(&self) -> usize {
        lock(&self.results).len()
    }

    /// Whether exactly one result arrived and it was a success.
    pub fn completed(&self) -> bool {
        matches!(lock(&self.results).as_slice(), [Ok(())])
    }

    /// Take the recorded results, leaving the probe empty.
    pub fn take(&self) -> Vec<Result<(), DispatchError>> {
        std::mem::take(&mut *lock(&self.results))
    }

    /// Take the only recorded error.
    ///
    /// # Panics
    ///
    /// If the probe did not receive exactly one result, or it was a success.
    pub fn take_error(&self) -> DispatchError {
        match self.take().as_mut_slice() {
            [result] => match std::mem::replace(result, Ok(())) {
                Err(err) => err,
                Ok(()) => panic!("dispatch succeeded"),
            },
            other => panic!("expected one result, got {}", other.len()),
        }
    }
}

// ============================================================================
// Parked Next
// ============================================================================

/// A slot that a [`ParkedNext::step`] fills with its continuation.
///
/// Lets a test play the part of an asynchronous operation: the step
/// suspends, the test inspects the controller mid-dispatch, then resumes.
#[derive(Clone, Default)]
pub struct ParkedNext {
    slot: Arc<Mutex<Vec<Next>>>,
}

impl ParkedNext {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// A named step that parks its continuation and returns without resuming.
    pub fn step(&self, name: &str) -> StepFn {
        let slot = Arc::clone(&self.slot);
        StepFn::named(name.to_string(), move |cx| {
            lock(&slot).push(cx.next());
            Ok(())
        })
    }

    /// Number of continuations waiting.
    pub fn waiting(&self) -> usize {
        lock(&self.slot).len()
    }

    /// Take the oldest waiting continuation.
    pub fn take(&self) -> Option<Next> {
        let mut slot = lock(&self.slot);
        (!slot.is_empty()).then(|| slot.remove(0))
    }

    /// Resume the oldest waiting continuation. Returns false if none waited.
    pub fn resume(&self) -> bool {
        match self.take() {
            Some(next) => {
                next.resume();
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Failing Steps
// ============================================================================

/// A named step that returns an error with `message`.
pub fn failing_step(name: &str, message: &str) -> StepFn {
    let message = message.to_string();
    StepFn::named(name.to_string(), move |_cx| {
        Err::<(), BoxError>(message.clone().into())
    })
}

/// A named step that panics with `message`.
pub fn panicking_step(name: &str, message: &str) -> StepFn {
    let message = message.to_string();
    StepFn::named(name.to_string(), move |_cx| -> Result<(), BoxError> {
        panic!("{message}")
    })
}

// ============================================================================
// Serving
// ============================================================================

/// Perform `action` with a fresh `GET /` request.
///
/// Returns the response and a probe holding the outer continuation's result.
pub fn serve(controller: &Controller, action: &str) -> (SharedResponse, OuterProbe) {
    serve_request(controller, action, Request::new("GET", "/"))
}

/// Perform `action` with the given request.
pub fn serve_request(
    controller: &Controller,
    action: &str,
    request: Request,
) -> (SharedResponse, OuterProbe) {
    let response = Response::new().into_shared();
    let probe = OuterProbe::new();
    controller.perform(action, Arc::new(request), Arc::clone(&response), probe.outer());
    (response, probe)
}
