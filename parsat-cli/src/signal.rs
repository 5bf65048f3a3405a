//! SIGINT handling.
//!
//! The first SIGINT raises the solver's interrupt flag so the workers wind
//! down gracefully; a second SIGINT aborts the process.
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;

/// The interrupt flag, reachable from the signal handler.
static INTERRUPT: AtomicPtr<AtomicBool> = AtomicPtr::new(ptr::null_mut());

extern "C" fn handle_sigint(_signum: libc::c_int) {
    let flag = INTERRUPT.load(Ordering::Acquire);
    if flag.is_null() {
        return;
    }
    // Only atomics here; everything else is off limits in a signal handler.
    if unsafe { &*flag }.swap(true, Ordering::Relaxed) {
        std::process::abort();
    }
}

/// Route SIGINT to the given interrupt flag.
///
/// The flag is intentionally leaked, as the handler stays installed for the
/// rest of the process.
pub fn install(interrupt: Arc<AtomicBool>) {
    INTERRUPT.store(Arc::into_raw(interrupt) as *mut AtomicBool, Ordering::Release);

    let handler: extern "C" fn(libc::c_int) = handle_sigint;

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        libc::sigaction(libc::SIGINT, &action, ptr::null_mut());
    }
}
