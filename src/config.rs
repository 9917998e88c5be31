//! Compile-time constants governing the kernel's geometry and timing.
//!
//! All limits are fixed at compile time — the kernel never allocates
//! dynamically and every collection is sized from these constants.

/// Maximum number of tasks the task table can hold, idle task included.
pub const MAX_TASKS: usize = 100;

/// Reserved stack for exception handlers and kernel code running on MSP.
pub const MAIN_STACK_SIZE: usize = 3072;

/// Bytes left untouched between the bottom of one task's stack and the
/// top of the next, so a one-word misaligned store cannot corrupt a
/// neighboring task.
pub const GUARD_GAP: usize = 8;

/// Longest task/mutex name the kernel will store, including no
/// terminator (names are fixed-size byte buffers, not C strings).
pub const NAME_LEN: usize = 30;

/// Priority value reserved for the idle task. Numerically larger than
/// any priority a user task may request, so the idle task always sorts
/// last in the task table.
pub const IDLE_TASK_PRIORITY: u8 = 255;

/// SysTick frequency in Hz: one tick is the kernel's unit of blocking
/// time and round-robin slice length.
pub const TICK_HZ: u32 = 1000;

/// Default core clock feeding SysTick, matched to the 8 MHz reference
/// clock used to derive the 1 ms tick.
pub const SYSTEM_CLOCK_HZ: u32 = 8_000_000;

/// Required alignment of every stack pointer the kernel hands to the
/// hardware (the AAPCS stack alignment for Cortex-M).
pub const STACK_ALIGN: usize = 8;

/// Size of the idle task's private stack. The idle task only ever
/// executes a `wfi` loop, so it needs very little.
pub const IDLE_STACK_SIZE: usize = 256;

/// Size of the region handed to the arena allocator for task stacks,
/// not counting [`MAIN_STACK_SIZE`]. Both architecture ports back the
/// arena with a statically-allocated region of this size.
pub const HEAP_SIZE: usize = 8192;
