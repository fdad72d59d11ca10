//! Stack capture at the point of a panic.
//!
//! Once `catch_unwind` returns, the frames that panicked are gone. The hook
//! installed here records a backtrace while they still exist and keeps it
//! per thread; the decorator collects it on the same thread right after the
//! unwind is caught.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

thread_local! {
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Puts the stack-recording hook in front of the current panic hook.
///
/// Idempotent. The previous hook still runs for every panic.
pub(crate) fn install_stack_capture() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            let _ = PANIC_STACK.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(stack);
                }
            });
            previous(info);
        }));
    });
}

/// Takes the stack recorded for the latest panic on this thread.
pub(crate) fn take_panic_stack() -> Option<String> {
    PANIC_STACK
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}
