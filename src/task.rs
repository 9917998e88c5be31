//! Task control block: the kernel's view of one schedulable thread.

use heapless::String;

use crate::config::NAME_LEN;

/// Execution state of a task.
///
/// ```text
///  Suspended ──activate()──► Waiting ──dispatch()──► Ready ──dispatch()──► Running
///      ▲                                                                      │
///      └───────────────── terminate() / wait() / mutex block ─────────────────┘
/// ```
///
/// `Waiting` and `Ready` are both "eligible to run" — `Waiting` means the
/// task has been activated since the last ready-set rebuild, `Ready` means
/// it is currently sitting in the ready set. The rebuild in
/// [`crate::ready_queue`] normalizes both into `Ready` as it enqueues them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not eligible to run: never activated, time-blocked, mutex-blocked,
    /// or terminated.
    Suspended,
    /// Activated since the last rebuild; will be picked up and enqueued
    /// the next time the ready set is rebuilt.
    Waiting,
    /// Sitting in the ready set, eligible for dispatch.
    Ready,
    /// Currently executing.
    Running,
}

/// A non-owning reference to a task control block.
///
/// Task control blocks are owned by the caller (typically `'static`
/// storage in the application) for the life of the program. The kernel's
/// own collections — the task table, the ready set, a mutex's holder and
/// pending waiter — never own a [`TaskControlBlock`]; they hold this
/// raw-pointer alias instead, dereferenced only from inside a kernel trap
/// or behind [`crate::sync::critical_section`].
pub type TaskRef = *mut TaskControlBlock;

/// One schedulable task.
///
/// # Safety
///
/// `TaskControlBlock` holds raw pointers (`stack_top`, `stack_bottom`,
/// `saved_sp`) and is stored in kernel collections that outlive any
/// single stack frame. There is no real multi-threading on this target —
/// at most one context is ever executing kernel code at a time, and the
/// trap priority scheme in [`crate::arch`] ensures the task table, ready
/// set, and a task's own `saved_sp` are never touched from two contexts
/// concurrently. That single-writer discipline, not interior mutability,
/// is what makes `Send`/`Sync` sound here.
pub struct TaskControlBlock {
    /// Human-readable name, for logging only.
    pub name: String<NAME_LEN>,
    /// Scheduling priority. Smaller is more important; the idle task uses
    /// [`crate::config::IDLE_TASK_PRIORITY`]. Immutable after creation.
    pub priority: u8,
    /// Entry point, invoked once the first time the task is dispatched.
    pub entry: Option<extern "C" fn() -> !>,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Inclusive top (highest address) of this task's private stack.
    pub stack_top: *mut u32,
    /// Inclusive bottom (lowest address) of this task's private stack.
    pub stack_bottom: *mut u32,
    /// Saved stack pointer. Defined only while `state != Running`.
    pub saved_sp: *mut u32,
    /// Requested stack size in bytes, recorded at
    /// [`TaskControlBlock::init`] time and consumed by
    /// [`crate::kernel::create_task`] when it allocates from the arena.
    pub stack_size: usize,
    /// Set by [`crate::kernel::wait`]; cleared once the countdown expires.
    pub blocking: bool,
    /// Ticks remaining until a timed wait expires. Zero when not blocking.
    pub ticks_remaining: u32,
}

unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// A placeholder control block for fixed-capacity array initializers.
    /// Never scheduled: priority is the idle priority and `entry` is
    /// `None`, but callers must still run [`TaskControlBlock::init`]
    /// before handing a slot to [`crate::table::TaskTable::insert`].
    pub const fn empty() -> Self {
        TaskControlBlock {
            name: String::new(),
            priority: crate::config::IDLE_TASK_PRIORITY,
            entry: None,
            state: TaskState::Suspended,
            stack_top: core::ptr::null_mut(),
            stack_bottom: core::ptr::null_mut(),
            saved_sp: core::ptr::null_mut(),
            stack_size: 0,
            blocking: false,
            ticks_remaining: 0,
        }
    }

    /// Populate a task control block. Does not touch any kernel
    /// collection or allocate a stack; the caller still has to go
    /// through [`crate::kernel::create_task`] for that.
    pub fn init(
        &mut self,
        name: &str,
        stack_size: usize,
        entry: extern "C" fn() -> !,
        priority: u8,
    ) {
        self.name = String::try_from(name).unwrap_or_default();
        self.priority = priority;
        self.entry = Some(entry);
        self.stack_size = stack_size;
        self.state = TaskState::Suspended;
        self.blocking = false;
        self.ticks_remaining = 0;
    }

    /// A task is eligible to be considered by the ready-set rebuild iff
    /// it is not [`TaskState::Suspended`].
    pub fn is_runnable(&self) -> bool {
        self.state != TaskState::Suspended
    }

    /// Arm a timed wait. A zero-tick wait is a no-op: the task stays
    /// exactly as it is (see `SPEC_FULL.md` §9, decided open question c).
    pub fn arm_wait(&mut self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        self.state = TaskState::Suspended;
        self.blocking = true;
        self.ticks_remaining = ticks;
    }

    /// Advance the wait countdown by one tick. Returns `true` the instant
    /// the countdown reaches zero (the caller must then route the task
    /// through the WaitTimeout path so its wake-up goes through the same
    /// rebuild as every other state change).
    pub fn tick_wait(&mut self) -> bool {
        if !self.blocking || self.ticks_remaining == 0 {
            return false;
        }
        self.ticks_remaining -= 1;
        if self.ticks_remaining == 0 {
            self.blocking = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy() -> ! {
        loop {}
    }

    #[test]
    fn empty_is_suspended_and_not_runnable() {
        let tcb = TaskControlBlock::empty();
        assert_eq!(tcb.state, TaskState::Suspended);
        assert!(!tcb.is_runnable());
    }

    #[test]
    fn init_sets_fields_and_stays_suspended() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init("worker", 1024, dummy, 3);
        assert_eq!(tcb.name.as_str(), "worker");
        assert_eq!(tcb.priority, 3);
        assert_eq!(tcb.state, TaskState::Suspended);
        assert!(tcb.entry.is_some());
    }

    #[test]
    fn arm_wait_zero_is_noop() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init("w", 1024, dummy, 1);
        tcb.state = TaskState::Running;
        tcb.arm_wait(0);
        assert_eq!(tcb.state, TaskState::Running);
        assert_eq!(tcb.ticks_remaining, 0);
    }

    #[test]
    fn tick_wait_expires_after_exact_count() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init("w", 1024, dummy, 1);
        tcb.arm_wait(3);
        assert!(!tcb.tick_wait());
        assert!(!tcb.tick_wait());
        assert!(tcb.tick_wait());
        assert!(!tcb.blocking);
        assert_eq!(tcb.ticks_remaining, 0);
    }
}
