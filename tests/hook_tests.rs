mod common;

use active_probe::config::ProbeConfig;
use active_probe::discovery::{find_method, find_type, MethodDescriptor};
use active_probe::hooks::{watched_post, watched_pre, Callback, HookError, HookManager};
use active_probe::host::sim::MethodDef;
use active_probe::host::{CallSite, Host, Value};
use active_probe::kernel::context::ProbeContext;
use active_probe::kernel::telemetry::{EventSink, Tag};
use active_probe::locator::{classify, Provenance};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn context() -> Arc<ProbeContext> {
    Arc::new(ProbeContext::new(ProbeConfig::default(), EventSink::in_memory(1_000)))
}

fn descriptor(world: &common::World, type_name: &str, method: &str) -> MethodDescriptor {
    let host = world.host.as_ref();
    let ty = find_type(host, type_name).unwrap();
    MethodDescriptor::new(find_method(host, &ty, method).unwrap())
}

fn counting(hits: Arc<AtomicUsize>) -> Callback {
    Arc::new(move |_: &CallSite<'_>| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_hook_sees_native_and_reflective_calls() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());
    let hits = Arc::new(AtomicUsize::new(0));

    let method = descriptor(&world, "MapMarker", "Ping");
    let info = method.info.clone();
    let record = hooks.install(method, "ping", counting(hits.clone()), None).unwrap();
    assert!(record.method.is_installed());

    // 1. Host's own control flow
    world.host.call(&world.marker, "Ping", &[]).unwrap();
    // 2. Reflective path
    world.host.invoke(&world.marker, &info, vec![]).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2, "Whole-process interception");
}

#[test]
fn test_install_failure_is_isolated() {
    let world = common::world();
    let ty = world.host.add_type("Assembly-CSharp", "", "Sealed");
    world
        .host
        .add_method(ty, MethodDef::new("Locked").unhookable())
        .unwrap();
    world.host.add_method(ty, MethodDef::new("Open")).unwrap();

    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());
    let noop: Callback = Arc::new(|_: &CallSite<'_>| Ok(()));

    let err = hooks
        .install(descriptor(&world, "Sealed", "Locked"), "locked", noop.clone(), None)
        .unwrap_err();
    assert!(matches!(err, HookError::Install { .. }));

    hooks
        .install(descriptor(&world, "Sealed", "Open"), "open", noop, None)
        .expect("Other methods still install");
    assert_eq!(hooks.len(), 1);
    let record = &hooks.records()[0];
    assert_eq!(record.label, "open");
    assert!(record.method.is_installed());
}

#[test]
fn test_duplicate_label_rejected_but_second_label_allowed() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx);
    let noop: Callback = Arc::new(|_: &CallSite<'_>| Ok(()));

    hooks
        .install(descriptor(&world, "ExtractionPoint", "OnClick"), "EP.OnClick", noop.clone(), None)
        .unwrap();
    let dup = hooks.install(
        descriptor(&world, "ExtractionPoint", "OnClick"),
        "EP.OnClick",
        noop.clone(),
        None,
    );
    assert!(matches!(dup, Err(HookError::AlreadyInstalled { .. })));

    hooks
        .install(
            descriptor(&world, "ExtractionPoint", "OnClick"),
            "ExtractionPoint.OnClick",
            noop,
            None,
        )
        .expect("Watched and candidate hooks may share a method");
    assert_eq!(world.host.hook_count(), 2);
    let labels: Vec<&str> = hooks.records().iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["EP.OnClick", "ExtractionPoint.OnClick"]);
    assert_ne!(hooks.records()[0].id, hooks.records()[1].id);
}

#[test]
fn test_uninstall_all_is_idempotent() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx);
    let hits = Arc::new(AtomicUsize::new(0));

    hooks
        .install(descriptor(&world, "MapMarker", "Ping"), "ping", counting(hits.clone()), None)
        .unwrap();
    assert_eq!(world.host.hook_count(), 1);

    assert_eq!(hooks.uninstall_all(), 1);
    assert_eq!(hooks.uninstall_all(), 0);
    assert!(hooks.is_empty());
    assert_eq!(world.host.hook_count(), 0);

    world.host.call(&world.marker, "Ping", &[]).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0, "Removed hooks no longer fire");

    let mut empty = HookManager::new(world.host.clone(), context());
    assert_eq!(empty.uninstall_all(), 0);
}

#[test]
fn test_dropping_manager_removes_hooks() {
    let world = common::world();
    {
        let mut hooks = HookManager::new(world.host.clone(), context());
        let noop: Callback = Arc::new(|_: &CallSite<'_>| Ok(()));
        hooks
            .install(descriptor(&world, "MapMarker", "Ping"), "ping", noop, None)
            .unwrap();
        assert_eq!(world.host.hook_count(), 1);
    }
    assert_eq!(world.host.hook_count(), 0);
}

#[test]
fn test_callback_failures_never_reach_the_host() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());

    let failing: Callback =
        Arc::new(|_: &CallSite<'_>| -> anyhow::Result<()> { anyhow::bail!("renderer gone") });
    let panicking: Callback =
        Arc::new(|_: &CallSite<'_>| -> anyhow::Result<()> { panic!("bad cast") });
    hooks
        .install(descriptor(&world, "MapMarker", "Ping"), "ping", failing, Some(panicking))
        .unwrap();

    let result = world.host.call(&world.marker, "Ping", &[]);
    assert_eq!(result, Ok(Value::Null), "Host call completes normally");

    let errors = common::messages(&ctx.sink, Tag::Err);
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors[0].contains("hook ping failed: renderer gone"));
    assert!(errors[1].contains("hook ping panicked: bad cast"));
}

#[test]
fn test_watched_pre_on_main_thread_logs_object_details() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());
    hooks
        .install(
            descriptor(&world, "ExtractionPoint", "StateSet"),
            "EP.StateSet",
            watched_pre(world.host.clone(), ctx.clone()),
            Some(watched_post(ctx.clone())),
        )
        .unwrap();

    world.host.call(&world.eps[1], "StateSet", &[Value::Int(3)]).unwrap();

    let lines = common::messages(&ctx.sink, Tag::Ep);
    assert_eq!(
        lines,
        vec![
            "PRE ExtractionPoint.StateSet go=EP near pos=(1.00, 1.00, 0.00) argsLen=1 args=[3]"
                .to_string(),
            "POST ExtractionPoint.StateSet".to_string(),
        ]
    );
}

#[test]
fn test_watched_pre_off_main_thread_skips_host_objects() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());
    hooks
        .install(
            descriptor(&world, "ExtractionPoint", "StateSet"),
            "EP.StateSet",
            watched_pre(world.host.clone(), ctx.clone()),
            None,
        )
        .unwrap();

    let host = world.host.clone();
    let ep = world.eps[0];
    std::thread::spawn(move || {
        host.call(&ep, "StateSet", &[Value::Int(1)]).unwrap();
    })
    .join()
    .unwrap();

    let lines = common::messages(&ctx.sink, Tag::Ep);
    assert_eq!(lines, vec!["PRE ExtractionPoint.StateSet argsLen=1".to_string()]);
    assert!(!lines[0].contains("go="));
    assert!(!lines[0].contains("pos="));
}

#[test]
fn test_stack_dump_classifies_origin() {
    let world = common::world();
    let ctx = context();
    let mut hooks = HookManager::new(world.host.clone(), ctx.clone());
    hooks
        .install(
            descriptor(&world, "ExtractionPoint", "ButtonPress"),
            "EP.ButtonPress",
            watched_pre(world.host.clone(), ctx.clone()),
            None,
        )
        .unwrap();

    // Native: host update loop calls ButtonPress
    world.host.call(&world.eps[0], "ButtonPress", &[]).unwrap();
    // Reflective: OnClick forced through invoke, which then presses the button
    let on_click = descriptor(&world, "ExtractionPoint", "OnClick").info;
    world.host.invoke(&world.eps[0], &on_click, vec![]).unwrap();

    let stacks: Vec<String> = common::messages(&ctx.sink, Tag::Ep)
        .into_iter()
        .filter(|l| l.starts_with("STACK "))
        .collect();
    assert_eq!(
        stacks,
        vec![
            "STACK ButtonPress origin=NATIVE".to_string(),
            "STACK ButtonPress origin=REFLECT".to_string(),
        ]
    );
    assert!(common::has_message(
        &ctx.sink,
        "      System.Reflection.RuntimeMethodInfo.Invoke"
    ));
}

#[test]
fn test_classify_markers() {
    let markers = vec!["RuntimeMethodInfo.Invoke".to_string()];
    let native = vec!["Game.Update".to_string(), "Host.Update".to_string()];
    let reflective = vec![
        "ExtractionPoint.OnClick".to_string(),
        "System.Reflection.RuntimeMethodInfo.Invoke".to_string(),
    ];

    assert_eq!(classify(&native, &markers), Provenance::Native);
    assert_eq!(classify(&reflective, &markers), Provenance::Reflective);
    assert_eq!(classify(&[], &markers), Provenance::Native);
}
