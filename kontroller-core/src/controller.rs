//! # Dispatch engine
//!
//! A [`Controller`] is one instance of a [`ControllerClass`]. It serves one
//! request at a time: [`Controller::perform`] installs the request context,
//! builds the step queue for the action and starts running it.
//!
//! # Continuations
//!
//! Steps advance the pipeline explicitly with [`Next::resume`]. A step may
//! resume before returning, or hand its [`Next`] to an asynchronous
//! operation and resume later, possibly from another thread. The engine
//! never advances on its own.
//!
//! Advancing is trampolined: a resume issued while a step body is running
//! only marks the run as ready, and the engine starts the next step after the
//! body returns. Steps therefore never nest on the stack, and internal state
//! is never locked while user code runs.
//!
//! # Completion and failure
//!
//! The outer continuation given to `perform` receives `Ok(())` once the
//! queue is exhausted, or the [`DispatchError`] that ended the run. The
//! guard ([`Controller::occupied`]) is released before the continuation is
//! called.

use crate::{
    class::ControllerClass,
    context::{Locals, Request, ResponseInfo, SharedResponse, lock_response},
    error::{DispatchError, StepFailure},
    scope::Scope,
    step::QueuedStep,
};
use std::{
    any::Any,
    collections::VecDeque,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};

/// Caller-supplied callback reporting the outcome of each dispatch.
pub type OuterNext = Box<dyn FnMut(Result<(), DispatchError>) + Send>;

/// Lifecycle of the most recent dispatch on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing dispatched yet.
    #[default]
    Idle,
    /// The queue is being built.
    Building,
    /// Steps are running or waiting for a resume.
    Running,
    /// The queue ran to the end.
    Completed,
    /// A step, or queue construction, failed.
    Failed,
}

/// A controller instance.
///
/// Cheap to clone; clones share the same instance, including its guard.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Instance>,
}

struct Instance {
    class: Arc<ControllerClass>,
    occupied: AtomicBool,
    counter: AtomicU64,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    state: RunState,
    context: Option<Context>,
    run: Option<Run>,
}

struct Context {
    id: u64,
    request: Arc<Request>,
    response: SharedResponse,
    action: Option<String>,
    outer: Option<OuterNext>,
    locals: Locals,
}

struct Run {
    id: u64,
    context: u64,
    queue: VecDeque<QueuedStep>,
    driving: bool,
    resume: bool,
}

/// Everything a step needs, taken out of the slot while it runs.
struct Prepared {
    context: u64,
    queued: QueuedStep,
    request: Arc<Request>,
    response: SharedResponse,
    action: String,
    locals: Locals,
}

enum Advance {
    Step(Box<Prepared>),
    Finished(u64),
    Idle,
}

impl Controller {
    /// Create an instance of `class`.
    pub fn new(class: Arc<ControllerClass>) -> Self {
        Self {
            inner: Arc::new(Instance {
                class,
                occupied: AtomicBool::new(false),
                counter: AtomicU64::new(0),
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Whether `self` and `other` are the same instance.
    pub fn ptr_eq(&self, other: &Controller) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The class this instance belongs to.
    pub fn class(&self) -> &Arc<ControllerClass> {
        &self.inner.class
    }

    /// The controller name.
    pub fn controller_name(&self) -> &str {
        self.inner.class.name()
    }

    /// Whether a dispatch is in progress.
    pub fn occupied(&self) -> bool {
        self.inner.occupied.load(Ordering::Acquire)
    }

    /// State of the most recent dispatch.
    pub fn state(&self) -> RunState {
        self.slot().state
    }

    /// Whether the class has an action of this name.
    pub fn responds_to(&self, name: &str) -> bool {
        self.inner.class.responds_to(name)
    }

    /// The request being served, if a context is installed.
    pub fn request(&self) -> Option<Arc<Request>> {
        self.slot().context.as_ref().map(|c| Arc::clone(&c.request))
    }

    /// The response being written, if a context is installed.
    pub fn response(&self) -> Option<SharedResponse> {
        self.slot().context.as_ref().map(|c| Arc::clone(&c.response))
    }

    /// The action most recently dispatched in the current context.
    pub fn action_name(&self) -> Option<String> {
        self.slot().context.as_ref().and_then(|c| c.action.clone())
    }

    /// Serve `action` for a request: [`initialize`](Self::initialize) then
    /// [`dispatch`](Self::dispatch).
    ///
    /// The instance is claimed in the same critical section that installs
    /// the context, so two overlapping calls can never share one. If the
    /// instance is busy, the running dispatch is left untouched and `outer`
    /// receives [`DispatchError::Reentrant`].
    pub fn perform(
        &self,
        action: &str,
        request: Arc<Request>,
        response: SharedResponse,
        outer: OuterNext,
    ) {
        let mut slot = self.slot();
        if !self.claim() {
            drop(slot);
            self.refuse(Some(action), outer);
            return;
        }
        self.install(&mut slot, request, Arc::clone(&response), outer);
        drop(slot);

        reset_response(&response, self.controller_name());
        self.start(self.slot(), action);
    }

    /// Install a fresh request context.
    ///
    /// Resets the locals, writes [`ResponseInfo`] onto the response and clears
    /// its action history. Refused with [`DispatchError::Reentrant`] on
    /// `outer` while a dispatch is in progress.
    pub fn initialize(&self, request: Arc<Request>, response: SharedResponse, outer: OuterNext) {
        let mut slot = self.slot();
        if self.occupied() {
            drop(slot);
            self.refuse(None, outer);
            return;
        }
        self.install(&mut slot, request, Arc::clone(&response), outer);
        drop(slot);

        reset_response(&response, self.controller_name());
    }

    /// Run `action` in the installed context.
    ///
    /// Every outcome, including an undefined action or a busy instance, is
    /// reported through the context's outer continuation. Without an
    /// installed context there is nobody to report to and the call is
    /// ignored.
    pub fn dispatch(&self, action: &str) {
        let slot = self.slot();
        let Some(context_id) = slot.context.as_ref().map(|c| c.id) else {
            drop(slot);
            tracing::warn!(
                controller = %self.controller_name(),
                action,
                "dispatch without an initialized context ignored"
            );
            return;
        };

        if !self.claim() {
            drop(slot);
            tracing::warn!(controller = %self.controller_name(), action, "controller busy, dispatch refused");
            self.notify(
                context_id,
                Err(DispatchError::Reentrant {
                    controller: self.controller_name().to_string(),
                    action: Some(action.to_string()),
                }),
            );
            return;
        }
        self.start(slot, action);
    }

    /// Set the guard. Only called with the slot locked, so claiming and
    /// installing or reading the context happen together.
    fn claim(&self) -> bool {
        self.inner
            .occupied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn refuse(&self, action: Option<&str>, mut outer: OuterNext) {
        tracing::warn!(
            controller = %self.controller_name(),
            action = action.unwrap_or_default(),
            "controller busy, request refused"
        );
        outer(Err(DispatchError::Reentrant {
            controller: self.controller_name().to_string(),
            action: action.map(str::to_owned),
        }));
    }

    fn install(
        &self,
        slot: &mut Slot,
        request: Arc<Request>,
        response: SharedResponse,
        outer: OuterNext,
    ) {
        slot.context = Some(Context {
            id: self.inner.counter.fetch_add(1, Ordering::Relaxed),
            request,
            response,
            action: None,
            outer: Some(outer),
            locals: Locals::new(),
        });
        slot.run = None;
        slot.state = RunState::Idle;
    }

    /// Build the queue for `action` and start running it. The guard must
    /// already be claimed by the caller.
    fn start(&self, mut guard: MutexGuard<'_, Slot>, action: &str) {
        let slot = &mut *guard;
        let Some(context) = slot.context.as_mut() else {
            slot.state = RunState::Idle;
            self.inner.occupied.store(false, Ordering::Release);
            return;
        };
        let context_id = context.id;
        context.action = Some(action.to_string());
        let response = Arc::clone(&context.response);
        slot.state = RunState::Building;

        let queue = match self.inner.class.build_queue(action) {
            Ok(queue) => queue,
            Err(err) => {
                slot.state = RunState::Failed;
                self.inner.occupied.store(false, Ordering::Release);
                drop(guard);
                set_info_action(&response, action);
                tracing::warn!(error = %err, "dispatch failed");
                self.notify(context_id, Err(err));
                return;
            }
        };

        let run_id = self.inner.counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            controller = %self.controller_name(),
            action,
            steps = queue.len(),
            "dispatch started"
        );
        slot.run = Some(Run {
            id: run_id,
            context: context_id,
            queue,
            driving: false,
            resume: false,
        });
        slot.state = RunState::Running;
        drop(guard);

        set_info_action(&response, action);
        self.advance(run_id);
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_handle(&self, run: u64) -> Next {
        Next {
            controller: self.clone(),
            run,
        }
    }

    fn advance(&self, run_id: u64) {
        let mut slot = self.slot();
        let mut prepared = match self.begin_step(&mut slot, run_id) {
            Advance::Step(prepared) => prepared,
            Advance::Finished(context) => {
                drop(slot);
                self.complete(context);
                return;
            }
            Advance::Idle => return,
        };
        drop(slot);

        loop {
            let outcome = self.execute(&mut prepared, run_id);

            let mut slot = self.slot();
            if let Some(context) = slot.context.as_mut().filter(|c| c.id == prepared.context) {
                context.locals = std::mem::take(&mut prepared.locals);
            }

            if let Err(failure) = outcome {
                self.fail(slot, *prepared, failure);
                return;
            }

            let Some(run) = slot.run.as_mut().filter(|r| r.id == run_id) else {
                return;
            };
            run.driving = false;
            if !std::mem::take(&mut run.resume) {
                // suspended until someone resumes
                return;
            }

            prepared = match self.begin_step(&mut slot, run_id) {
                Advance::Step(next) => next,
                Advance::Finished(context) => {
                    drop(slot);
                    self.complete(context);
                    return;
                }
                Advance::Idle => return,
            };
        }
    }

    fn begin_step(&self, slot: &mut Slot, run_id: u64) -> Advance {
        let Some(run) = slot.run.as_mut().filter(|r| r.id == run_id) else {
            tracing::trace!(controller = %self.controller_name(), "stale continuation ignored");
            return Advance::Idle;
        };
        if run.driving {
            run.resume = true;
            return Advance::Idle;
        }

        let Some(queued) = run.queue.pop_front() else {
            let context = run.context;
            slot.run = None;
            slot.state = RunState::Completed;
            self.inner.occupied.store(false, Ordering::Release);
            return Advance::Finished(context);
        };

        let Some(context) = slot.context.as_mut().filter(|c| c.id == run.context) else {
            return Advance::Idle;
        };
        run.driving = true;

        Advance::Step(Box::new(Prepared {
            context: context.id,
            queued,
            request: Arc::clone(&context.request),
            response: Arc::clone(&context.response),
            action: context.action.clone().unwrap_or_default(),
            locals: std::mem::take(&mut context.locals),
        }))
    }

    fn execute(&self, prepared: &mut Prepared, run_id: u64) -> Result<(), StepFailure> {
        let options = self.inner.class.options();
        let phase = &prepared.queued.phase;

        prepared.request.set_in_action(phase.is_action());
        if options.record_history {
            lock_response(&prepared.response)
                .action_history
                .push(phase.clone());
        }
        tracing::trace!(controller = %self.controller_name(), step = %phase, "running step");

        let mut scope = Scope {
            controller: self,
            request: &prepared.request,
            response: &prepared.response,
            action: &prepared.action,
            phase,
            locals: &mut prepared.locals,
            next: self.next_handle(run_id),
        };
        let body = &prepared.queued.step;

        if options.catch_panics {
            match catch_unwind(AssertUnwindSafe(|| body.call(&mut scope))) {
                Ok(result) => result.map_err(StepFailure::Error),
                Err(payload) => Err(StepFailure::Panic(panic_message(payload.as_ref()))),
            }
        } else {
            body.call(&mut scope).map_err(StepFailure::Error)
        }
    }

    fn complete(&self, context: u64) {
        tracing::debug!(
            controller = %self.controller_name(),
            elapsed = ?self.elapsed(),
            "dispatch completed"
        );
        self.notify(context, Ok(()));
    }

    fn fail(&self, mut slot: MutexGuard<'_, Slot>, prepared: Prepared, failure: StepFailure) {
        slot.run = None;
        slot.state = RunState::Failed;
        self.inner.occupied.store(false, Ordering::Release);
        drop(slot);

        let err = DispatchError::Step {
            controller: self.controller_name().to_string(),
            action: prepared.action,
            phase: prepared.queued.phase,
            source: failure,
        };
        tracing::warn!(error = %err, "dispatch failed");
        self.notify(prepared.context, Err(err));
    }

    fn elapsed(&self) -> Option<std::time::Duration> {
        let response = self.response()?;
        let res = lock_response(&response);
        res.info.as_ref().map(ResponseInfo::elapsed)
    }

    /// Hand `result` to the outer continuation of context `id`.
    ///
    /// The continuation is taken out of the slot while it runs, so it may
    /// call back into this controller.
    fn notify(&self, id: u64, result: Result<(), DispatchError>) {
        let outer = self
            .slot()
            .context
            .as_mut()
            .filter(|c| c.id == id)
            .and_then(|c| c.outer.take());

        let Some(mut outer) = outer else {
            tracing::warn!(
                controller = %self.controller_name(),
                "outer continuation unavailable, result dropped"
            );
            return;
        };
        outer(result);

        if let Some(context) = self
            .slot()
            .context
            .as_mut()
            .filter(|c| c.id == id && c.outer.is_none())
        {
            context.outer = Some(outer);
        }
    }
}

impl From<ControllerClass> for Controller {
    fn from(class: ControllerClass) -> Self {
        Controller::new(Arc::new(class))
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.controller_name())
            .field("occupied", &self.occupied())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Controller {}", self.controller_name())
    }
}

fn reset_response(response: &SharedResponse, controller: &str) {
    let mut res = lock_response(response);
    res.info = Some(ResponseInfo {
        controller: controller.to_string(),
        action: None,
        started_at: Instant::now(),
    });
    res.action_history.clear();
}

fn set_info_action(response: &SharedResponse, action: &str) {
    if let Some(info) = lock_response(response).info.as_mut() {
        info.action = Some(action.to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Continuation handle for one dispatch.
///
/// Cloneable and `Send`; resuming a finished or superseded dispatch does
/// nothing.
#[derive(Clone)]
pub struct Next {
    controller: Controller,
    run: u64,
}

impl Next {
    /// Advance the pipeline to the next step.
    ///
    /// Called from inside a step body, the next step starts once the body
    /// returns; a body resumes the pipeline at most once, however often it
    /// calls this.
    pub fn resume(&self) {
        self.controller.advance(self.run);
    }

    /// The controller this continuation belongs to.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("controller", &self.controller.controller_name())
            .field("run", &self.run)
            .finish()
    }
}
