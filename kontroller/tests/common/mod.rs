#![allow(dead_code)]

use kontroller::{
    BoxError, Controller, ControllerRegistry, Namespace, Phase, RegistryBuilder, SharedResponse,
    StepFn, lock_response, testing::OrderLog,
};

// ============================================================================
// Namespaces
// ============================================================================

/// A namespace binding each name to a step that logs it and resumes.
pub fn logged_steps(log: &OrderLog, names: &[&str]) -> Namespace {
    let mut ns = Namespace::new();
    for name in names {
        ns.define(*name, log.step(name));
    }
    ns
}

/// A step that fails with `message`, bound under `name` but declared anonymous.
pub fn anonymous_failure(message: &'static str) -> StepFn {
    StepFn::anonymous(move |_cx| Err::<(), BoxError>(message.into()))
}

// ============================================================================
// Controllers
// ============================================================================

/// A registry holding one controller called `name`.
pub fn registry(name: &str, script: &str, methods: Namespace) -> ControllerRegistry {
    RegistryBuilder::new()
        .controller(name, script, methods)
        .build()
}

/// A fresh instance of a one-off controller.
pub fn controller(name: &str, script: &str, methods: Namespace) -> Controller {
    registry(name, script, methods)
        .instance(name)
        .expect("controller configures")
}

// ============================================================================
// Responses
// ============================================================================

/// The action history as `hook:name` / `action:name` strings.
pub fn history(response: &SharedResponse) -> Vec<String> {
    lock_response(response)
        .action_history
        .iter()
        .map(|phase| match phase {
            Phase::Hook(name) => format!("hook:{}", name.as_deref().unwrap_or("-")),
            Phase::Action(name) => format!("action:{name}"),
        })
        .collect()
}
