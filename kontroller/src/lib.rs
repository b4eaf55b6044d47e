//! # kontroller - Web Controllers with Explicit Continuations
//!
//! `kontroller` runs web controller actions wrapped in before and after
//! hooks. Every step resumes the pipeline explicitly, so a hook can finish
//! asynchronous work (a database lookup, a remote call) before the action
//! runs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kontroller::prelude::*;
//!
//! fn index(cx: &mut Scope<'_>) -> Result<(), BoxError> {
//!     cx.set("posts", json!([]));
//!     cx.render(None);
//!     cx.next().resume();
//!     Ok(())
//! }
//!
//! let mut methods = Namespace::new();
//! methods.define("index", named!(index));
//!
//! let registry = RegistryBuilder::new()
//!     .global("log_request", log_request())
//!     .controller("posts", "before(log_request); action(index)", methods)
//!     .build();
//!
//! let controller = registry.instance("posts")?;
//! perform_async(&controller, "index", request, response).await?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Steps
pub use kontroller_core::{Phase, QueuedStep, StepBody, StepFn, named};

// Class tables
pub use kontroller_core::{
    ActionRegistrar, Binding, ControllerClass, DispatchOptions, HelperFn, HookEntry, HookFilter,
    HookList, Layout, Namespace, Skip,
};

// Dispatch
pub use kontroller_core::{Controller, Next, OuterNext, RunState};

// Context and rendering
pub use kontroller_core::{
    Locals, RenderCall, Renderer, Request, Response, ResponseInfo, Scope, SharedResponse,
    lock_response,
};

// Errors
pub use kontroller_core::{BoxError, ConfigError, DispatchError, StepFailure};

// Registry
pub use kontroller_std::{
    Completion, CompletionError, ControllerRegistry, RegistryBuilder, RegistryError,
    perform_async,
};

/// Configuration language.
pub mod dsl {
    pub use kontroller_std::dsl::{Call, Expr, ScriptLibrary, Word, evaluate, parse};
}

/// Standard hook implementations.
pub mod hooks {
    pub use kontroller_std::hooks::{log_request, traced};
}

/// Testing utilities.
pub mod testing {
    pub use kontroller_std::testing::{
        OrderLog, OuterProbe, ParkedNext, failing_step, panicking_step, serve, serve_request,
    };
}

/// Prelude module - common imports for Kontroller.
///
/// # Usage
///
/// ```rust,ignore
/// use kontroller::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ActionRegistrar, BoxError, Controller, ControllerRegistry, DispatchError, HookFilter,
        Layout, Namespace, Next, RegistryBuilder, Renderer, Request, Response, Scope, Skip,
        StepFn, hooks::log_request, named, perform_async,
    };
    pub use serde_json::{Value, json};
}
