//! Kernel error taxonomy.

use core::fmt;

/// Every way a fallible kernel entry point can fail.
///
/// Variants map onto the three categories described in the crate's
/// top-level docs: construction-time failures the caller must act on,
/// invariant violations that indicate a kernel bug, and user misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No error occurred. Present so call sites that always return a
    /// `KernelError` (rather than `Result`) have a success value.
    NoError,
    /// The ready set could not be initialized to the requested capacity.
    ReadyQueueInitError,
    /// A new task's stack does not fit in the remaining arena.
    TaskExceededStack,
    /// The task table was found out of order after a sort. Unreachable
    /// in correct code; indicates a kernel bug.
    BubbleSortError,
    /// The periodic tick could not be started.
    TickStartError,
    /// A second task attempted to block on a mutex that already has a
    /// pending waiter.
    ManyUsersOnMutex,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::NoError => "no error",
            KernelError::ReadyQueueInitError => "ready queue failed to initialize",
            KernelError::TaskExceededStack => "task stack does not fit in remaining arena",
            KernelError::BubbleSortError => "task table sort invariant violated",
            KernelError::TickStartError => "periodic tick failed to start",
            KernelError::ManyUsersOnMutex => "mutex already has a pending waiter",
        };
        f.write_str(msg)
    }
}

impl defmt::Format for KernelError {
    fn format(&self, fmt: defmt::Formatter) {
        let msg = match self {
            KernelError::NoError => "NoError",
            KernelError::ReadyQueueInitError => "ReadyQueueInitError",
            KernelError::TaskExceededStack => "TaskExceededStack",
            KernelError::BubbleSortError => "BubbleSortError",
            KernelError::TickStartError => "TickStartError",
            KernelError::ManyUsersOnMutex => "ManyUsersOnMutex",
        };
        defmt::write!(fmt, "{}", msg)
    }
}

/// Convenience alias used throughout the kernel.
pub type KernelResult<T> = Result<T, KernelError>;
