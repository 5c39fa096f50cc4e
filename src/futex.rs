//! Wait-for-value primitive over a 32-bit word.
//!
//! Thin wrappers around the Linux `futex(2)` syscall plus a
//! [`wait_for_value`] loop that hides spurious wakeups, interrupted
//! syscalls and stale expected values from the caller. The task state
//! word is the only futex this crate ever waits on, but the primitive is
//! generic over any `AtomicU32`.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::error::Error;

/// Wakes up to `count` threads waiting on `addr`. Returns the number of
/// threads actually woken.
pub fn wake(addr: &AtomicU32, count: i32) -> usize {
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
            0usize,
            0usize,
            0u32,
        )
    };
    debug_assert!(rc >= 0, "futex wake failed: {}", io::Error::last_os_error());
    rc.max(0) as usize
}

/// Wakes every thread waiting on `addr`.
pub fn wake_all(addr: &AtomicU32) -> usize {
    wake(addr, i32::MAX)
}

/// Sleeps while `*addr == expected`, for at most `timeout` if given.
///
/// Returns `Ok(())` when woken by [`wake`]. Fails with `EAGAIN` when the
/// word no longer holds `expected`, `EINTR` on signal delivery and
/// `ETIMEDOUT` on deadline expiry. Callers that need a clean contract
/// should use [`wait_for_value`] instead.
pub fn wait(addr: &AtomicU32, expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: d.subsec_nanos() as _,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |t| t as *const libc::timespec);

    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            0usize,
            0u32,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Blocks until `*addr == target`, observed with a totally ordered load.
///
/// Unlike raw [`wait`], this never returns spuriously: wakeups for other
/// value changes, interrupted syscalls and stale expected values are all
/// looped internally. The only outcomes are value-reached (`Ok`) and
/// deadline-exceeded ([`Error::Timeout`]).
///
/// The deadline is measured against a monotonic clock from the moment of
/// the call; each iteration re-waits for whatever remains of `timeout`.
///
/// Note that no userspace lock is held: nothing prevents the word from
/// changing again after a successful return.
pub fn wait_for_value(addr: &AtomicU32, target: u32, timeout: Option<Duration>) -> Result<(), Error> {
    let start = Instant::now();

    loop {
        // The barrier wanted here is LoadLoad+StoreLoad: if the word already
        // holds the target, everything the setter did must be visible. There
        // is no such standalone barrier, so totally order the load.
        let current = addr.load(Ordering::SeqCst);
        if current == target {
            return Ok(());
        }

        let remaining = match timeout {
            Some(limit) => match limit.checked_sub(start.elapsed()) {
                Some(left) => Some(left),
                None => return Err(Error::Timeout),
            },
            None => None,
        };

        match wait(addr, current, remaining) {
            // The word changed; loop to see whether it changed to `target`.
            Ok(()) => {}
            Err(e) => match e.raw_os_error() {
                // `current` was stale or a signal interrupted the sleep.
                Some(libc::EAGAIN) | Some(libc::EINTR) => {}
                Some(libc::ETIMEDOUT) => return Err(Error::Timeout),
                _ => panic!("futex wait failed: {e}"),
            },
        }
    }
}
