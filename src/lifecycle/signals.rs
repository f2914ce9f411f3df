//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate either signal into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - The handler only stores to an atomic; logging happens in the server loop
//! - Handlers are process-wide, so only one `Shutdown` can be bound

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::lifecycle::Shutdown;

static SIGNALLED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn on_signal(_signum: libc::c_int) {
    if let Some(flag) = SIGNALLED.get() {
        flag.store(true, Ordering::Release);
    }
}

/// Trigger `shutdown` on SIGINT or SIGTERM. Fails if already installed.
pub fn install_signal_handlers(shutdown: &Shutdown) -> io::Result<()> {
    SIGNALLED
        .set(shutdown.flag())
        .map_err(|_| io::Error::new(io::ErrorKind::AlreadyExists, "signal handlers already installed"))?;

    for signum in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the action is fully initialized and the handler is async-signal-safe.
        let res = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signum, &action, std::ptr::null_mut())
        };
        if res != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    tracing::debug!("Signal handlers installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigterm_triggers_shutdown() {
        let shutdown = Shutdown::new();
        install_signal_handlers(&shutdown).unwrap();
        assert!(!shutdown.is_triggered());

        assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
        assert!(shutdown.is_triggered());

        let err = install_signal_handlers(&Shutdown::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }
}
