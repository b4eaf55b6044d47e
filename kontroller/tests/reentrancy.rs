use kontroller::{
    DispatchError, Namespace, OuterNext, Request, Response, RunState, lock_response,
    testing::{OrderLog, OuterProbe, ParkedNext, serve},
};
use std::sync::Arc;

mod common;
use common::{history, logged_steps, registry};

fn parked_controller(log: &OrderLog, parked: &ParkedNext) -> kontroller::Controller {
    let mut ns = logged_steps(log, &["index", "audit"]);
    ns.define("fetch", parked.step("fetch"));
    common::controller("posts", "before(fetch); action(index); after(audit)", ns)
}

#[test]
fn test_overlapping_perform_is_refused() {
    let log = OrderLog::new();
    let parked = ParkedNext::new();
    let controller = parked_controller(&log, &parked);

    let (first_response, first) = serve(&controller, "index");
    assert!(controller.occupied());

    let (second_response, second) = serve(&controller, "index");
    let err = second.take_error();
    assert!(matches!(
        err,
        DispatchError::Reentrant { action: Some(ref a), .. } if a == "index"
    ));
    // the second run never started a step and never touched the first run
    assert_eq!(parked.waiting(), 1);
    assert!(history(&second_response).is_empty());
    assert_eq!(history(&first_response), vec!["hook:fetch"]);
    assert_eq!(first.calls(), 0);

    parked.resume();
    assert!(first.completed());
    assert_eq!(log.entries(), vec!["index", "audit"]);
    assert!(!controller.occupied());
}

#[test]
fn test_perform_claims_instance_before_writing_response() {
    let log = OrderLog::new();
    let controller = common::controller("posts", "action(index)", logged_steps(&log, &["index"]));
    let first = OuterProbe::new();
    let first_response = Response::new().into_shared();

    // the first perform stalls on the response while it owns the instance
    let held = lock_response(&first_response);
    let worker = {
        let controller = controller.clone();
        let response = Arc::clone(&first_response);
        let outer = first.outer();
        std::thread::spawn(move || {
            controller.perform("index", Arc::new(Request::new("GET", "/a")), response, outer);
        })
    };
    while !controller.occupied() {
        std::thread::yield_now();
    }

    let (second_response, second) = serve(&controller, "index");
    assert!(matches!(
        second.take_error(),
        DispatchError::Reentrant { action: Some(ref a), .. } if a == "index"
    ));
    assert!(history(&second_response).is_empty());
    assert_eq!(controller.request().unwrap().path, "/a");

    drop(held);
    worker.join().unwrap();
    assert!(first.completed());
    assert_eq!(second.calls(), 0);
    assert_eq!(log.entries(), vec!["index"]);
    assert_eq!(history(&first_response), vec!["action:index"]);
    assert!(!controller.occupied());
}

#[test]
fn test_initialize_refused_while_busy() {
    let log = OrderLog::new();
    let parked = ParkedNext::new();
    let controller = parked_controller(&log, &parked);
    let (_response, first) = serve(&controller, "index");

    let probe = OuterProbe::new();
    controller.initialize(
        Arc::new(Request::new("GET", "/other")),
        Response::new().into_shared(),
        probe.outer(),
    );
    assert!(matches!(
        probe.take_error(),
        DispatchError::Reentrant { action: None, .. }
    ));
    assert_eq!(controller.request().unwrap().path, "/");

    parked.resume();
    assert!(first.completed());
}

#[test]
fn test_shared_instance_serves_sequential_requests() {
    let log = OrderLog::new();
    let registry = registry("posts", "action(index)", logged_steps(&log, &["index"]));
    let shared = registry.shared_instance("posts").unwrap();

    for _ in 0..3 {
        let (_response, probe) = serve(&registry.shared_instance("posts").unwrap(), "index");
        assert!(probe.completed());
    }
    assert_eq!(log.entries().len(), 3);
    assert!(!shared.occupied());
}

#[test]
fn test_fresh_instances_do_not_block_each_other() {
    let log = OrderLog::new();
    let parked = ParkedNext::new();
    let mut ns = logged_steps(&log, &["index", "audit"]);
    ns.define("fetch", parked.step("fetch"));
    let registry = registry("posts", "before(fetch); action(index)", ns);

    let a = registry.instance("posts").unwrap();
    let b = registry.instance("posts").unwrap();
    let (_ra, pa) = serve(&a, "index");
    let (_rb, pb) = serve(&b, "index");
    assert_eq!(parked.waiting(), 2);

    parked.resume();
    parked.resume();
    assert!(pa.completed());
    assert!(pb.completed());
}

#[test]
fn test_repeated_dispatch_in_one_context() {
    let log = OrderLog::new();
    let controller = common::controller(
        "posts",
        "action(index); action(show)",
        logged_steps(&log, &["index", "show"]),
    );

    let probe = OuterProbe::new();
    let response = Response::new().into_shared();
    controller.initialize(
        Arc::new(Request::new("GET", "/")),
        Arc::clone(&response),
        probe.outer(),
    );
    controller.dispatch("index");
    controller.dispatch("show");

    let results = probe.take();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(history(&response), vec!["action:index", "action:show"]);
    assert_eq!(controller.state(), RunState::Completed);
}

#[test]
fn test_outer_may_start_next_request() {
    let log = OrderLog::new();
    let controller = common::controller("posts", "action(index)", logged_steps(&log, &["index"]));

    let again = controller.clone();
    let probe = OuterProbe::new();
    let inner = probe.outer();
    let mut inner = Some(inner);
    let outer: OuterNext = Box::new(move |result| {
        assert!(result.is_ok());
        assert!(!again.occupied());
        if let Some(inner) = inner.take() {
            again.perform(
                "index",
                Arc::new(Request::new("GET", "/again")),
                Response::new().into_shared(),
                inner,
            );
        }
    });
    controller.perform(
        "index",
        Arc::new(Request::new("GET", "/")),
        Response::new().into_shared(),
        outer,
    );

    assert!(probe.completed());
    assert_eq!(log.entries(), vec!["index", "index"]);
    assert_eq!(controller.request().unwrap().path, "/again");
}

#[test]
fn test_dispatch_without_context_is_ignored() {
    let controller = common::controller("posts", "", Namespace::new());
    controller.dispatch("index");
    assert_eq!(controller.state(), RunState::Idle);
    assert!(!controller.occupied());
}
