//! Architecture abstraction layer.
//!
//! The real Cortex-M4 port (trap handlers, SysTick, PendSV-equivalent
//! context switch) only builds for `target_arch = "arm"`. Everywhere
//! else — in particular on the host, where `cargo test` runs — the mock
//! port stands in, so every module above this layer can be exercised
//! without target hardware.
//!
//! Both ports expose the same free functions under `current`:
//! [`pend_context_switch`], [`configure_tick`], [`set_trap_priorities`],
//! [`raise_supervisor_call`] and [`start_first_task`]. Nothing above
//! this module matches on which port is active.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;
#[cfg(target_arch = "arm")]
pub use cortex_m4 as current;

#[cfg(not(target_arch = "arm"))]
pub mod mock;
#[cfg(not(target_arch = "arm"))]
pub use mock as current;

/// A kernel entry point, raised through `svc` on target and through a
/// direct call on the host. One variant per dispatch rule in
/// `SPEC_FULL.md` §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// A task became eligible to run (fresh activation or a promoted
    /// mutex waiter).
    Activate,
    /// A task became ineligible to run (explicit terminate, a timed
    /// wait being armed, or blocking on a held mutex).
    Terminate,
    /// One or more timed waits expired this tick.
    WaitTimeout,
    /// A task became a mutex's holder.
    AcquireMutex,
    /// A mutex was released with no waiter to promote.
    ReleaseMutex,
}
