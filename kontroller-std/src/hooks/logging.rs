//! Request logging hook.

use kontroller_core::StepFn;

/// A before hook named `log_request` that logs the request at `info` level.
///
/// ```rust,ignore
/// class.prepend_before(None, log_request(), None);
/// ```
pub fn log_request() -> StepFn {
    StepFn::named("log_request", |cx| {
        let request = cx.request();
        tracing::info!(
            controller = %cx.controller_name(),
            action = %cx.action_name(),
            method = %request.method,
            path = %request.path,
            "processing request"
        );
        cx.next().resume();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontroller_core::{
        ActionRegistrar, Controller, ControllerClass, OuterNext, Phase, Request, Response,
        lock_response,
    };
    use std::sync::Arc;

    #[test]
    fn test_log_request_resumes() {
        let mut class = ControllerClass::new("Posts");
        class.before(None, log_request(), None);
        class
            .action(
                None,
                StepFn::named("index", |cx| {
                    cx.next().resume();
                    Ok(())
                }),
            )
            .unwrap();
        let controller = Controller::from(class);

        let response = Response::new().into_shared();
        let outer: OuterNext = Box::new(|result| assert!(result.is_ok()));
        controller.perform(
            "index",
            Arc::new(Request::new("GET", "/posts")),
            Arc::clone(&response),
            outer,
        );

        assert_eq!(
            lock_response(&response).action_history[0],
            Phase::Hook(Some("log_request".into()))
        );
        assert!(!controller.occupied());
    }
}
