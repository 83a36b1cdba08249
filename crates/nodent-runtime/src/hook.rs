//! Process-wide fallback error hook.
//!
//! Errors that reach no error continuation and no observing reaction end up
//! here. The slot is set once at startup and read thereafter; generated code
//! never touches it. With no hook installed the error is escalated, which
//! makes `Runtime::run_until_idle` return a fault.

use crate::value::Value;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookVerdict {
    /// The hook dealt with the error; execution carries on.
    Handled,
    /// Re-raise as an unrecoverable fault.
    Escalate,
}

pub type FallbackErrorHook = Arc<dyn Fn(&Value) -> HookVerdict + Send + Sync>;

static FALLBACK_HOOK: Lazy<RwLock<Option<FallbackErrorHook>>> = Lazy::new(|| RwLock::new(None));

/// Install `hook` as the fallback error handler, replacing any previous one.
pub fn set_fallback_error_hook(hook: impl Fn(&Value) -> HookVerdict + Send + Sync + 'static) {
    let mut slot = FALLBACK_HOOK
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(Arc::new(hook));
}

/// Restore the default behaviour (escalate).
pub fn reset_fallback_error_hook() {
    let mut slot = FALLBACK_HOOK
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = None;
}

pub fn has_fallback_error_hook() -> bool {
    FALLBACK_HOOK
        .read()
        .map(|slot| slot.is_some())
        .unwrap_or(false)
}

pub(crate) fn dispatch(reason: &Value) -> HookVerdict {
    // Clone the handler out so it runs without the lock held.
    let hook = FALLBACK_HOOK
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    match hook {
        Some(hook) => hook(reason),
        None => {
            tracing::error!(reason = %reason.to_display_string(), "unhandled async error");
            HookVerdict::Escalate
        }
    }
}
