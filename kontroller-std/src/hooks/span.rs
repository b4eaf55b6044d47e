//! Span instrumentation for steps.

use kontroller_core::StepFn;

/// Wrap `step` so its body runs inside an `info` span named after it.
///
/// The span covers the synchronous body only; work finished after the body
/// returns is outside it. The wrapper keeps the step's name, so it can be
/// registered, deduplicated and skipped like the original.
pub fn traced(step: StepFn) -> StepFn {
    let name = step.name().unwrap_or_default().to_owned();
    let label = step.name().unwrap_or("anonymous").to_owned();
    StepFn::named(name, move |cx| {
        let span = tracing::info_span!(
            "step",
            name = %label,
            controller = %cx.controller_name(),
            action = %cx.action_name(),
        );
        let _entered = span.enter();
        step.call(cx)
    })
}
