use kontroller::{
    ConfigError, Layout, RegistryError, lock_response,
    prelude::*,
    testing::{OrderLog, serve},
};

mod common;
use common::logged_steps;

fn index(cx: &mut Scope<'_>) -> Result<(), BoxError> {
    cx.set("posts", json!(["first", "second"]));
    cx.render(None);
    cx.next().resume();
    Ok(())
}

fn posts_methods() -> Namespace {
    let mut ns = Namespace::new();
    ns.define("index", named!(index)).define(
        "show",
        named!(fn show(cx) {
            let id = cx.param("id").unwrap_or("0").to_string();
            cx.set("id", id);
            cx.render(Some("posts/detail"));
            cx.next().resume();
            Ok(())
        }),
    );
    ns
}

#[test]
fn test_registry_builds_classes_once() {
    let registry = RegistryBuilder::new()
        .controller("posts", "action(index); action(show)", posts_methods())
        .build();

    let a = registry.instance("posts").unwrap();
    let b = registry.instance("posts").unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(std::sync::Arc::ptr_eq(a.class(), b.class()));
    assert_eq!(registry.build_count(), 1);
    assert!(registry.contains("posts"));
}

#[test]
fn test_registry_rebuilds_on_new_source() {
    let log = OrderLog::new();
    let registry = RegistryBuilder::new()
        .controller("posts", "action(index)", logged_steps(&log, &["index", "audit"]))
        .build();
    serve(&registry.instance("posts").unwrap(), "index");

    registry.define(
        "posts",
        "action(index); after(audit)",
        logged_steps(&log, &["index", "audit"]),
    );
    serve(&registry.instance("posts").unwrap(), "index");

    assert_eq!(log.entries(), vec!["index", "index", "audit"]);
    assert_eq!(registry.build_count(), 2);
}

#[test]
fn test_render_uses_class_layout() {
    let registry = RegistryBuilder::new()
        .default_layout("site")
        .controller("posts", "action(index); action(show)", posts_methods())
        .controller("admin", "layout('admin'); action(index)", posts_methods())
        .controller("api", "layout(false); action(index)", posts_methods())
        .build();

    let (response, probe) = serve(&registry.instance("posts").unwrap(), "index");
    assert!(probe.completed());
    let rendered = lock_response(&response).rendered.clone().unwrap();
    assert_eq!(rendered.view, "posts/index");
    assert_eq!(rendered.layout.as_deref(), Some("layouts/site_layout"));
    assert_eq!(rendered.locals["posts"], json!(["first", "second"]));

    let controller = registry.instance("posts").unwrap();
    let request = Request::new("GET", "/posts/3").with_param("id", "3");
    let (response, _probe) = kontroller::testing::serve_request(&controller, "show", request);
    let rendered = lock_response(&response).rendered.clone().unwrap();
    assert_eq!(rendered.view, "posts/detail");
    assert_eq!(rendered.locals["id"], "3");

    let (response, _probe) = serve(&registry.instance("admin").unwrap(), "index");
    let rendered = lock_response(&response).rendered.clone().unwrap();
    assert_eq!(rendered.view, "admin/index");
    assert_eq!(rendered.layout.as_deref(), Some("layouts/admin_layout"));

    let api = registry.class("api").unwrap();
    assert_eq!(api.layout(), &Layout::Disabled);
    let (response, _probe) = serve(&registry.instance("api").unwrap(), "index");
    assert_eq!(lock_response(&response).rendered.as_ref().unwrap().layout, None);
}

#[test]
fn test_shared_scripts_and_globals() {
    let log = OrderLog::new();
    let registry = RegistryBuilder::new()
        .global("authenticate", log.step("authenticate"))
        .global("log_request", log_request())
        .script(
            "application",
            "prependBefore(log_request)\nbefore(authenticate, {except: ['index']})",
        )
        .controller(
            "posts",
            "load('application')\naction(index)\naction(show)",
            logged_steps(&log, &["index", "show"]),
        )
        .controller(
            "sessions",
            "load('application')\nskipBefore('authenticate')\naction(index)\naction(show)",
            logged_steps(&log, &["index", "show"]),
        )
        .build();

    serve(&registry.instance("posts").unwrap(), "show");
    serve(&registry.instance("posts").unwrap(), "index");
    serve(&registry.instance("sessions").unwrap(), "show");
    assert_eq!(
        log.entries(),
        vec!["authenticate", "show", "index", "show"]
    );
}

#[test]
fn test_class_methods_shadow_globals() {
    let log = OrderLog::new();
    let registry = RegistryBuilder::new()
        .global("index", log.step("global_index"))
        .controller("posts", "action(index)", logged_steps(&log, &["index"]))
        .build();

    serve(&registry.instance("posts").unwrap(), "index");
    assert_eq!(log.entries(), vec!["index"]);
}

#[test]
fn test_helpers_configure_the_class() {
    let registry = RegistryBuilder::new()
        .helper("admin_only", |class| {
            class.set_layout(Layout::Named("admin".into()));
            class.before(
                Some("require_admin"),
                StepFn::named("require_admin", |cx| {
                    if cx.session().get("admin") != Some(&json!(true)) {
                        cx.response().status = 403;
                        return Ok(());
                    }
                    cx.next().resume();
                    Ok(())
                }),
                None,
            );
            Ok(())
        })
        .controller("admin", "admin_only()\naction(index)", posts_methods())
        .build();
    let controller = registry.instance("admin").unwrap();

    let (response, probe) = serve(&controller, "index");
    assert_eq!(lock_response(&response).status, 403);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn test_configuration_errors() {
    let registry = RegistryBuilder::new()
        .controller("syntax", "action(index", posts_methods())
        .controller("callee", "index()", posts_methods())
        .controller("cycle", "load('self')", posts_methods())
        .script("self", "load('self')")
        .build();

    let err = registry.instance("syntax").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Config {
            source: ConfigError::Syntax { line: 1, .. },
            ..
        }
    ));
    assert!(matches!(
        registry.instance("callee"),
        Err(RegistryError::Config {
            source: ConfigError::NotCallable { .. },
            ..
        })
    ));
    assert!(matches!(
        registry.instance("cycle"),
        Err(RegistryError::Config {
            source: ConfigError::RecursiveLoad { .. },
            ..
        })
    ));
    assert!(matches!(
        registry.instance("missing"),
        Err(RegistryError::UnknownController(_))
    ));
}
