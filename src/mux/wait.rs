//! Readiness wait primitive.
//!
//! [`ReadinessWait`] is the seam to the caller's event loop. [`PollWaiter`]
//! is a `poll(2)` implementation for callers that don't bring their own.

use std::io;
use std::time::{Duration, Instant};

use libc::{pollfd, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT};

use crate::mux::aggregator::{Interest, WaitResult, WaitSet};

/// Blocks until a descriptor in the set is ready or the timeout expires.
pub trait ReadinessWait {
    /// `None` waits without limit. A timeout yields an empty [`WaitResult`].
    fn wait(&mut self, set: &WaitSet, timeout: Option<Duration>) -> io::Result<WaitResult>;
}

/// `poll(2)`-backed wait.
#[derive(Debug, Default)]
pub struct PollWaiter {
    fds: Vec<pollfd>,
}

impl PollWaiter {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Milliseconds for `poll`, rounded up so a sub-millisecond budget still waits.
fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_micros().div_ceil(1000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

fn events_for(interest: Interest) -> libc::c_short {
    let mut events = 0;
    if interest.contains(Interest::READ) {
        events |= POLLIN;
    }
    if interest.contains(Interest::WRITE) {
        events |= POLLOUT;
    }
    events
}

impl ReadinessWait for PollWaiter {
    fn wait(&mut self, set: &WaitSet, timeout: Option<Duration>) -> io::Result<WaitResult> {
        self.fds.clear();
        self.fds.extend(set.entries().iter().map(|(fd, interest)| pollfd {
            fd: *fd,
            events: events_for(*interest),
            revents: 0,
        }));

        let deadline = timeout.map(|d| Instant::now() + d);
        let mut poll_timeout = timeout_ms(timeout);
        loop {
            let res = unsafe {
                libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, poll_timeout)
            };
            if res >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
            if let Some(d) = deadline {
                match d.checked_duration_since(Instant::now()) {
                    Some(remaining) => poll_timeout = timeout_ms(Some(remaining)),
                    // we've timed out
                    None => return Ok(WaitResult::default()),
                }
            }
        }

        let mut result = WaitResult::default();
        for pfd in self.fds.iter().filter(|pfd| pfd.revents != 0) {
            if pfd.revents & (POLLIN | POLLHUP) != 0 {
                result.readable.insert(pfd.fd);
            }
            if pfd.revents & POLLOUT != 0 {
                result.writable.insert(pfd.fd);
            }
            if pfd.revents & (POLLERR | POLLHUP | POLLNVAL) != 0 {
                result.errored.insert(pfd.fd);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn timeout_rounds_up() {
        assert_eq!(timeout_ms(None), -1);
        assert_eq!(timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_ms(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_ms(Some(Duration::from_millis(250))), 250);
    }

    #[test]
    fn readable_after_peer_writes() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut set = WaitSet::new();
        set.insert(ours.as_raw_fd(), Interest::READ);

        let mut waiter = PollWaiter::new();
        let idle = waiter.wait(&set, Some(Duration::from_millis(10))).unwrap();
        assert!(idle.is_empty());

        theirs.write_all(b"ping").unwrap();
        let ready = waiter.wait(&set, Some(Duration::from_secs(1))).unwrap();
        assert!(ready.is_readable(ours.as_raw_fd()));
        assert!(!ready.is_writable(ours.as_raw_fd()));
    }

    #[test]
    fn fresh_socket_is_writable() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let mut set = WaitSet::new();
        set.insert(ours.as_raw_fd(), Interest::WRITE);

        let result = PollWaiter::new().wait(&set, Some(Duration::from_secs(1))).unwrap();
        assert!(result.is_writable(ours.as_raw_fd()));
    }

    #[test]
    fn hangup_reports_errored() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        drop(theirs);
        let mut set = WaitSet::new();
        set.insert(ours.as_raw_fd(), Interest::READ);

        let result = PollWaiter::new().wait(&set, Some(Duration::from_secs(1))).unwrap();
        assert!(result.is_readable(ours.as_raw_fd()));
        assert!(!result.is_empty());
    }
}
