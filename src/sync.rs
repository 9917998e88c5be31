//! Interrupt-safe critical section abstraction.
//!
//! All kernel collections (task table, ready set, mutexes) are touched
//! only from inside the two kernel traps or from thread-mode code before
//! [`crate::kernel::start`] runs; any call made from thread mode after
//! start goes through this helper instead of relying on trap priority
//! alone.
//!
//! On the real target this disables interrupts for the duration of the
//! closure. On host builds (used by `cargo test`) there is no interrupt
//! controller to disable — the mock port runs the closure directly,
//! which is sound because host tests are single-threaded.

#[cfg(target_arch = "arm")]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    cortex_m::interrupt::free(|_| f())
}

#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}
