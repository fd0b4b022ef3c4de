extern crate nix;

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const SLEEP_SLICE: std::time::Duration = std::time::Duration::from_millis(200);

extern "C" fn handle_interrupt(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// SIGINT and SIGTERM only raise a flag; the poll loop checks it between
/// steps and exits cleanly.
pub fn install_handlers() -> nix::Result<()> {
    let action = signal::SigAction::new(
        signal::SigHandler::Handler(handle_interrupt),
        signal::SaFlags::empty(),
        signal::SigSet::empty());

    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        signal::sigaction(signal::Signal::SIGINT, &action)?;
        signal::sigaction(signal::Signal::SIGTERM, &action)?;
    }
    return Ok(());
}

/// The flag raised by the installed handlers. Tests hand their own flag to
/// the poll loop and the resolver instead.
pub fn process_flag() -> &'static AtomicBool {
    return &INTERRUPTED;
}

pub fn is_set(flag: &AtomicBool) -> bool {
    return flag.load(Ordering::SeqCst);
}

/// Sleeps in short slices so an interrupt cuts the wait short. Returns false
/// if interrupted.
pub fn sleep_unless_interrupted(flag: &AtomicBool, duration: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + duration;
    loop {
        if is_set(flag) {
            return false;
        }
        let now = std::time::Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(std::cmp::min(SLEEP_SLICE, deadline - now));
    }
}
