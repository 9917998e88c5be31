//! # taskkernel
//!
//! A small preemptive real-time task kernel for single-core Cortex-M4
//! targets: fixed-capacity task control blocks, a priority-ordered ready
//! set, a naked-handler context switch, time-based blocking, and a
//! single-holder mutex.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · task_init() · create_task() · activate()     │
//! │   terminate() · wait() · acquire() · release() · start()│
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Task table  │   Ready set        │  Dispatcher       │
//! │  table.rs    │   ready_queue.rs   │  dispatcher.rs    │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │     Task model (task.rs) · Mutex (mutex.rs)             │
//! │     Stack arena (arena.rs) · Initial frame (frame.rs)    │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs, arch/mock.rs)   │
//! │    SVCall · PendSV · SysTick · Context Switch            │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory model
//!
//! - **No heap, no `alloc`**: every collection is fixed-capacity,
//!   backed by [`heapless`].
//! - **One stack arena**: task stacks are carved out of a single linear
//!   RAM region by a descending bump allocator ([`arena`]); there is no
//!   deallocation.
//! - **Critical sections**: [`sync::critical_section`], `cortex-m`'s
//!   `interrupt::free` on target, a no-op on host.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod arena;
pub mod config;
pub mod dispatcher;
pub mod error;
mod log;
pub mod mutex;
pub mod ready_queue;
pub mod sync;
pub mod table;
pub mod frame;
pub mod kernel;
pub mod task;
