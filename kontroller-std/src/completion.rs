//! Awaiting a dispatch.
//!
//! [`perform_async`] runs a controller with an outer continuation that
//! completes a future, so async routing code can simply `.await` the
//! outcome while steps resume from whatever task or thread finishes their
//! work.

use futures::channel::oneshot;
use kontroller_core::{Controller, DispatchError, OuterNext, Request, SharedResponse};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;

/// Why a [`Completion`] resolved without a result.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The controller was dropped before the dispatch finished.
    #[error("dispatch abandoned before completion")]
    Abandoned,
}

/// Future returned by [`perform_async`].
#[must_use = "futures do nothing unless polled"]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), DispatchError>>,
}

impl Future for Completion {
    type Output = Result<(), CompletionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result.map_err(CompletionError::Dispatch),
            Err(oneshot::Canceled) => Err(CompletionError::Abandoned),
        })
    }
}

/// An outer continuation that completes the returned future on first call.
pub fn completion() -> (OuterNext, Completion) {
    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);
    let outer: OuterNext = Box::new(move |result| {
        if let Some(tx) = tx.take() {
            let _ = tx.send(result);
        } else {
            tracing::debug!("completion already delivered, result dropped");
        }
    });
    (outer, Completion { rx })
}

/// [`Controller::perform`] as a future.
///
/// Steps that resume synchronously have already run when this returns; the
/// future resolves once the last step resumes or a step fails.
pub fn perform_async(
    controller: &Controller,
    action: &str,
    request: Arc<Request>,
    response: SharedResponse,
) -> Completion {
    let (outer, completion) = completion();
    controller.perform(action, request, response, outer);
    completion
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use kontroller_core::{ActionRegistrar, ControllerClass, Response, StepFn};
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_after_async_resume() {
        let mut class = ControllerClass::new("Posts");
        class.before(
            None,
            StepFn::named("fetch", |cx| {
                let next = cx.next();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    next.resume();
                });
                Ok(())
            }),
            None,
        );
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

        let mut pending = perform_async(
            &controller,
            "index",
            Arc::new(Request::new("GET", "/")),
            Response::new().into_shared(),
        );
        assert!((&mut pending).now_or_never().is_none());

        pending.await.unwrap();
        assert!(!controller.occupied());
    }

    #[tokio::test]
    async fn test_dispatch_error_surfaces() {
        let controller = Controller::from(ControllerClass::new("Posts"));
        let err = perform_async(
            &controller,
            "missing",
            Arc::new(Request::new("GET", "/")),
            Response::new().into_shared(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Dispatch(DispatchError::UndefinedAction { .. })
        ));
    }

    #[tokio::test]
    async fn test_abandoned_when_controller_dropped() {
        let mut class = ControllerClass::new("Posts");
        class
            .action(None, StepFn::named("stall", |_cx| Ok(())))
            .unwrap();
        let controller = Controller::from(class);

        let pending = perform_async(
            &controller,
            "stall",
            Arc::new(Request::new("GET", "/")),
            Response::new().into_shared(),
        );
        drop(controller);

        assert!(matches!(pending.await, Err(CompletionError::Abandoned)));
    }
}
