//! The process-wide fallback error hook.
//!
//! Every test here touches global state, so they run one at a time.

use nodent_runtime::bind::async_bind;
use nodent_runtime::value::arg;
use nodent_runtime::{
    HookVerdict, Runtime, RuntimeFault, Value, reset_fallback_error_hook, set_fallback_error_hook,
};
use std::sync::{Arc, Mutex, MutexGuard};

static HOOK_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset_fallback_error_hook();
    guard
}

fn recording_hook(verdict: HookVerdict) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    set_fallback_error_hook(move |reason| {
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reason.to_display_string());
        verdict
    });
    seen
}

#[test]
fn test_unobserved_rejection_escalates_by_default() {
    let _guard = serial();
    let rt = Runtime::default();
    let _cell = rt.rejected(Value::string("nobody listened"));

    match rt.run_until_idle() {
        Err(RuntimeFault::UnhandledRejection { reason }) => {
            assert_eq!(reason, "nobody listened")
        }
        other => panic!("expected escalation, got {other:?}"),
    }
}

#[test]
fn test_hook_can_handle_orphaned_rejection() {
    let _guard = serial();
    let seen = recording_hook(HookVerdict::Handled);
    let rt = Runtime::default();
    let _cell = rt.rejected(Value::string("quiet"));

    let stats = rt.run_until_idle().expect("handled by hook");
    assert_eq!(stats.orphans_reported, 1);
    assert_eq!(*seen.lock().expect("seen"), vec!["quiet"]);
    reset_fallback_error_hook();
}

#[test]
fn test_rejection_observed_before_idle_is_not_reported() {
    let _guard = serial();
    let seen = recording_hook(HookVerdict::Escalate);
    let rt = Runtime::default();
    let cell = rt.rejected(Value::string("caught later"));
    cell.on_settle(Value::Undefined, Value::native("catch", |_, _| Ok(Value::Undefined)));

    rt.run_until_idle().expect("no orphan");
    assert!(seen.lock().expect("seen").is_empty());
    reset_fallback_error_hook();
}

#[test]
fn test_callback_caller_without_error_continuation_reaches_hook() {
    let _guard = serial();
    let seen = recording_hook(HookVerdict::Handled);
    let rt = Runtime::default();
    let body = Value::native("body", |_, args| {
        arg(args, 1).call(Value::Undefined, &[Value::string("lost error")])
    });
    let on_return = Value::native("ok", |_, _| Ok(Value::Undefined));

    async_bind(&rt, Value::Undefined, body, on_return, Value::Undefined).expect("bind");
    assert_eq!(*seen.lock().expect("seen"), vec!["lost error"]);
    rt.run_until_idle().expect("hook handled it");
    reset_fallback_error_hook();
}

#[test]
fn test_escalated_orphan_from_bind_surfaces_on_drain() {
    let _guard = serial();
    let rt = Runtime::default();
    let body = Value::native("body", |_, _| Err(Value::string("thrown")));
    let on_return = Value::native("ok", |_, _| Ok(Value::Undefined));

    async_bind(&rt, Value::Undefined, body, on_return, Value::Undefined).expect("bind");
    assert!(matches!(
        rt.run_until_idle(),
        Err(RuntimeFault::UnhandledRejection { .. })
    ));
}
