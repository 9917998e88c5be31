//! Kernel singleton: the public API and supervisor-call dispatch.
//!
//! Everything here runs inside a [`critical_section`] or inside one of
//! the two kernel traps, so the task table, ready set, and the
//! singleton's own bookkeeping are never observed half-updated — see
//! `SPEC_FULL.md` §5.
//!
//! ## Startup sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()         create the idle task
//!         ├─► kernel::task_init()    × N, then create_task() × N
//!         └─► kernel::start()        never returns
//! ```

use crate::arch::{self, Service};
use crate::arena::Arena;
use crate::config::{IDLE_STACK_SIZE, IDLE_TASK_PRIORITY};
use crate::dispatcher;
use crate::error::KernelResult;
use crate::frame;
use crate::log;
use crate::mutex::Mutex;
use crate::ready_queue::{self, ReadySet};
use crate::sync::critical_section;
use crate::table::TaskTable;
use crate::task::{TaskControlBlock, TaskRef, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OsState {
    Suspended,
    Running,
}

/// The kernel singleton, per `SPEC_FULL.md` §3. Zeroed (const-default)
/// at image load; [`init`] prepares the arena and idle task, [`start`]
/// flips `os_state` to `Running` and never returns.
struct Kernel {
    main_stack_top: *mut u8,
    main_stack_bottom: *mut u8,
    arena: Arena,
    table: TaskTable,
    ready: ReadySet,
    current: Option<TaskRef>,
    next: Option<TaskRef>,
    os_state: OsState,
    idle: Option<TaskRef>,
}

unsafe impl Send for Kernel {}

impl Kernel {
    const fn new() -> Self {
        Kernel {
            main_stack_top: core::ptr::null_mut(),
            main_stack_bottom: core::ptr::null_mut(),
            arena: Arena::new(core::ptr::null_mut(), core::ptr::null_mut()),
            table: TaskTable::new(),
            ready: ReadySet::new(),
            current: None,
            next: None,
            os_state: OsState::Suspended,
            idle: None,
        }
    }
}

static mut KERNEL: Kernel = Kernel::new();
static mut IDLE_TCB: TaskControlBlock = TaskControlBlock::empty();

#[inline]
unsafe fn kernel_mut() -> &'static mut Kernel {
    &mut *core::ptr::addr_of_mut!(KERNEL)
}

extern "C" fn idle_entry() -> ! {
    #[allow(clippy::empty_loop)]
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Initialize the kernel singleton and install the idle task. Must run
/// before any other kernel call.
pub fn init() {
    critical_section(|| unsafe {
        let k = kernel_mut();
        let (main_bottom, main_top) = arch::current::main_stack_bounds();
        let (arena_bottom, arena_top) = arch::current::arena_bounds();
        k.main_stack_top = main_top;
        k.main_stack_bottom = main_bottom;
        k.arena = Arena::new(arena_bottom, arena_top);
        k.table = TaskTable::new();
        k.ready = ReadySet::new();
        k.current = None;
        k.next = None;
        k.os_state = OsState::Suspended;

        let idle = &mut *core::ptr::addr_of_mut!(IDLE_TCB);
        idle.init("idle", IDLE_STACK_SIZE, idle_entry, IDLE_TASK_PRIORITY);
        let idle_ref: TaskRef = idle as *mut _;
        allocate_and_frame(k, idle_ref).expect("idle task stack must fit the arena");
        k.table.insert(idle_ref).expect("idle task must fit in the task table");
        k.idle = Some(idle_ref);
    });
}

/// A non-owning reference to a [`Mutex`], mirroring [`TaskRef`].
pub type MutexRef = *mut Mutex;

/// Populate a user-allocated task control block. Does not touch any
/// kernel collection or allocate a stack — [`create_task`] does that.
pub fn task_init(
    tcb: &mut TaskControlBlock,
    stack_size: usize,
    entry: extern "C" fn() -> !,
    priority: u8,
    name: &str,
) {
    tcb.init(name, stack_size, entry, priority);
}

/// Allocate the task's stack from the arena, lay down its synthetic
/// initial frame, and append it to the task table in `Suspended`.
///
/// # Safety
/// `task` must point at a `'static` control block already populated by
/// [`task_init`].
pub fn create_task(task: TaskRef) -> KernelResult<()> {
    critical_section(|| unsafe {
        let k = kernel_mut();
        allocate_and_frame(k, task)?;
        k.table.insert(task)?;
        log::trace!("task created: {}", (*task).name.as_str());
        Ok(())
    })
}

/// Mark the task `Waiting` and raise the `Activate` supervisor call.
///
/// # Safety
/// `task` must point at a live control block previously passed to
/// [`create_task`].
pub unsafe fn activate(task: TaskRef) {
    (*task).state = TaskState::Waiting;
    log::trace!("activate: {}", (*task).name.as_str());
    arch::current::raise_supervisor_call(Service::Activate);
}

/// Mark the task `Suspended` and raise the `Terminate` supervisor call.
///
/// # Safety
/// `task` must point at a live control block previously passed to
/// [`create_task`].
pub unsafe fn terminate(task: TaskRef) {
    (*task).state = TaskState::Suspended;
    log::trace!("terminate: {}", (*task).name.as_str());
    arch::current::raise_supervisor_call(Service::Terminate);
}

/// Block the task for `ticks` system ticks. `wait(0, _)` is a no-op
/// (the task stays exactly as it is — `SPEC_FULL.md` §9, decided open
/// question c); otherwise this suspends the task the same way
/// [`terminate`] does, through the same supervisor call.
///
/// # Safety
/// `task` must point at a live control block previously passed to
/// [`create_task`].
pub unsafe fn wait(ticks: u32, task: TaskRef) {
    if ticks == 0 {
        return;
    }
    (*task).arm_wait(ticks);
    log::trace!("wait armed: {} for {} ticks", (*task).name.as_str(), ticks);
    arch::current::raise_supervisor_call(Service::Terminate);
}

/// Zero a mutex's holder/pending and mark it `Released`.
pub fn mutex_init(m: &mut Mutex, payload: *mut u8, size: usize, name: &str) {
    m.init(name, payload, size);
}

/// Attempt to acquire the mutex on behalf of `task`. If the mutex is
/// free, `task` becomes the holder immediately. If it is held, `task`
/// becomes the pending waiter, is suspended, and is context-switched
/// away via the same path [`terminate`] uses. Returns
/// [`crate::error::KernelError::ManyUsersOnMutex`] if a waiter is
/// already pending — the kernel does not queue a third task.
///
/// # Safety
/// `task` and `mutex` must point at live, `'static` objects.
pub unsafe fn acquire(task: TaskRef, mutex: MutexRef) -> KernelResult<()> {
    let m = &mut *mutex;
    let t = &mut *task;
    let became_holder = m.acquire(task)?;
    if became_holder {
        log::trace!("mutex acquired: {} by {}", m.name.as_str(), t.name.as_str());
        arch::current::raise_supervisor_call(Service::AcquireMutex);
    } else {
        log::trace!("mutex blocked: {} on {}", t.name.as_str(), m.name.as_str());
        t.state = TaskState::Suspended;
        arch::current::raise_supervisor_call(Service::Terminate);
    }
    Ok(())
}

/// Release the mutex. If a waiter is pending, it is promoted to holder
/// and woken through the activate path (`SPEC_FULL.md` §9, decided open
/// question b: the end state is what matters, not the order the source
/// re-marks it in). Otherwise the mutex goes `Released`.
///
/// # Safety
/// `mutex` must point at a live, `'static` object.
pub unsafe fn release(mutex: MutexRef) {
    let m = &mut *mutex;
    match m.release() {
        Some(promoted) => {
            (*promoted).state = TaskState::Waiting;
            log::trace!("mutex released: {}, promoting waiter", m.name.as_str());
            arch::current::raise_supervisor_call(Service::Activate);
        }
        None => {
            log::trace!("mutex released: {}, no waiter", m.name.as_str());
            arch::current::raise_supervisor_call(Service::ReleaseMutex);
        }
    }
}

/// Mark the OS running, rebuild the ready set, and make idle the current
/// task without discarding any user task the rebuild surfaced. Returns
/// idle's saved stack pointer and entry for the caller to launch.
///
/// Split out of [`start`] so the decision of whether to pop idle back
/// out of the ready set is unit-testable without going through
/// [`crate::arch::current::start_first_task`], which never returns.
fn launch_idle(k: &mut Kernel) -> (*mut u32, extern "C" fn() -> !) {
    k.os_state = OsState::Running;
    let idle_ref = k.idle.expect("kernel::init must run before kernel::start");
    k.current = Some(idle_ref);
    let idle = unsafe { &mut *idle_ref };
    idle.state = TaskState::Waiting;
    handle_supervisor_call_locked(k, Service::Activate);
    // The rebuild enqueues the highest-priority runnable group. If any
    // user task is Waiting, idle is excluded from it entirely and the
    // real tasks must stay queued so the first SysTick preempts idle
    // with them; only pop idle out when the rebuild put it at the head
    // itself (no user task was runnable yet).
    if k.ready.front() == Some(idle_ref) {
        k.ready.pop_front();
    }
    idle.state = TaskState::Running;
    (idle.saved_sp, idle.entry.expect("idle task has an entry point"))
}

/// Begin scheduling. Configures the tick and trap priorities, launches
/// the idle task, and never returns.
pub fn start() -> ! {
    let (first_sp, entry) =
        critical_section(|| unsafe { launch_idle(kernel_mut()) });

    arch::current::set_trap_priorities();
    if arch::current::configure_tick().is_err() {
        log::error!("tick failed to start");
        #[allow(clippy::empty_loop)]
        loop {}
    }

    unsafe { arch::current::start_first_task(first_sp, entry) }
}

// ---------------------------------------------------------------------------
// Supervisor-call dispatch (SPEC_FULL.md §4.F)
// ---------------------------------------------------------------------------

/// Demultiplex a supervisor call. Called from the real `SVCall` trap
/// (with the immediate decoded from the trapping instruction) or
/// directly by the mock port's [`crate::arch::mock::raise_supervisor_call`]
/// standing in for that trap on the host.
pub fn handle_supervisor_call(service: Service) {
    critical_section(|| unsafe { handle_supervisor_call_locked(kernel_mut(), service) });
}

fn handle_supervisor_call_locked(k: &mut Kernel, service: Service) {
    match service {
        Service::Activate | Service::Terminate => {
            sort_rebuild(k);
            maybe_redispatch(k);
        }
        Service::WaitTimeout => sort_rebuild(k),
        Service::AcquireMutex | Service::ReleaseMutex => rebuild_only(k),
    }
}

fn sort_rebuild(k: &mut Kernel) {
    k.table.sort();
    if !k.table.is_sorted() {
        log::error!("task table sort invariant violated");
        #[allow(clippy::empty_loop)]
        loop {}
    }
    rebuild_only(k);
}

fn rebuild_only(k: &mut Kernel) {
    if ready_queue::rebuild(&k.table, &mut k.ready).is_err() {
        log::error!("ready set rebuild found a priority inversion");
        #[allow(clippy::empty_loop)]
        loop {}
    }
}

/// Re-dispatch, but only when the OS is running and the caller isn't
/// the idle task — calling through idle while the system is still
/// warming up (i.e. from [`start`]) must not context-switch.
fn maybe_redispatch(k: &mut Kernel) {
    if k.os_state != OsState::Running {
        return;
    }
    let Some(cur) = k.current else { return };
    if Some(cur) == k.idle {
        return;
    }
    let next = unsafe { dispatcher::dispatch(cur, &mut k.ready) };
    k.next = Some(next);
    log::debug!("context switch pended");
    arch::current::pend_context_switch();
}

// ---------------------------------------------------------------------------
// Tick (SPEC_FULL.md §4.F)
// ---------------------------------------------------------------------------

/// Periodic tick entry point, called at [`crate::config::TICK_HZ`]. Per
/// the spec: decrement every time-blocked task's countdown, routing any
/// expiry through the same `WaitTimeout` path a user call would use;
/// then unconditionally dispatch and pend a context switch (round-robin
/// among equal-priority tasks requires a switch every tick even when
/// nothing expired).
pub fn tick() {
    let expired = critical_section(|| unsafe {
        let k = kernel_mut();
        let mut expired = false;
        for i in 0..k.table.len() {
            let r = k.table.get(i).expect("i < table.len()");
            let t = &mut *r;
            if t.blocking && t.tick_wait() {
                t.state = TaskState::Waiting;
                log::trace!("wait expired: {}", t.name.as_str());
                expired = true;
            }
        }
        expired
    });

    if expired {
        handle_supervisor_call(Service::WaitTimeout);
    }

    critical_section(|| unsafe {
        let k = kernel_mut();
        if let Some(cur) = k.current {
            let next = dispatcher::dispatch(cur, &mut k.ready);
            k.next = Some(next);
        }
    });
    arch::current::pend_context_switch();
}

// ---------------------------------------------------------------------------
// Context switch commit (SPEC_FULL.md §4.E, steps 1-3 of the protocol
// are asm; this is the pure-logic middle step the naked handler calls)
// ---------------------------------------------------------------------------

/// Called from the `PendSV` trap after it has pushed R4-R11 onto the
/// outgoing task's stack. Commits `current <- next` and returns the
/// incoming task's saved stack pointer for the trap to restore from.
///
/// # Safety
/// Only valid when called from the `PendSV` handler with `outgoing_psp`
/// the just-updated process stack pointer.
#[no_mangle]
pub unsafe extern "C" fn commit_context_switch(outgoing_psp: *mut u32) -> *mut u32 {
    let k = kernel_mut();
    if let Some(cur) = k.current {
        (*cur).saved_sp = outgoing_psp;
    }
    if let Some(next) = k.next.take() {
        k.current = Some(next);
    }
    let cur = k
        .current
        .expect("context switch committed with no current task");
    (*cur).saved_sp
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn allocate_and_frame(k: &mut Kernel, task: TaskRef) -> KernelResult<()> {
    let t = unsafe { &mut *task };
    let (top, bottom) = k.arena.allocate(t.stack_size)?;
    t.stack_top = top as *mut u32;
    t.stack_bottom = bottom as *mut u32;
    let entry = t
        .entry
        .expect("task_init must be called before create_task");
    t.saved_sp = unsafe { frame::synthesize_initial_frame(t.stack_top, entry) };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::mock::take_pend_requested;

    // The kernel singleton is process-wide; these tests run serially
    // within this module's own test binary partition and each resets
    // it before asserting, per `SPEC_FULL.md` §9 ("Global singleton").
    fn reset() {
        unsafe {
            KERNEL = Kernel::new();
            IDLE_TCB = TaskControlBlock::empty();
        }
        init();
    }

    extern "C" fn dummy() -> ! {
        loop {}
    }

    fn make_task(name: &'static str, priority: u8) -> TaskRef {
        let tcb = Box::leak(Box::new(TaskControlBlock::empty()));
        task_init(tcb, 512, dummy, priority, name);
        tcb as *mut _
    }

    #[test]
    fn init_installs_idle_task_last() {
        reset();
        let k = unsafe { kernel_mut() };
        assert_eq!(k.table.len(), 1);
        let idle = k.idle.unwrap();
        assert_eq!(unsafe { (*idle).priority }, IDLE_TASK_PRIORITY);
    }

    #[test]
    fn create_and_activate_enters_ready_after_sort() {
        reset();
        let t1 = make_task("t1", 3);
        create_task(t1).unwrap();
        unsafe { activate(t1) };
        let k = unsafe { kernel_mut() };
        assert_eq!(unsafe { (*t1).state }, TaskState::Ready);
        assert!(k.table.is_sorted());
    }

    #[test]
    fn terminate_suspends_and_rebuilds() {
        reset();
        let t1 = make_task("t1", 3);
        create_task(t1).unwrap();
        unsafe {
            activate(t1);
            terminate(t1);
        }
        assert_eq!(unsafe { (*t1).state }, TaskState::Suspended);
    }

    #[test]
    fn tick_advances_and_wakes_a_timed_wait() {
        reset();
        let t1 = make_task("t1", 3);
        create_task(t1).unwrap();
        unsafe {
            activate(t1);
            wait(2, t1);
        }
        assert_eq!(unsafe { (*t1).state }, TaskState::Suspended);
        assert!(unsafe { (*t1).blocking });

        tick();
        assert!(unsafe { (*t1).blocking });
        assert_eq!(unsafe { (*t1).ticks_remaining }, 1);

        tick();
        assert!(!unsafe { (*t1).blocking });
        assert_eq!(unsafe { (*t1).state }, TaskState::Ready);
    }

    #[test]
    fn acquire_and_release_hand_off_the_mutex() {
        reset();
        let m = Box::leak(Box::new(Mutex::empty()));
        mutex_init(m, core::ptr::null_mut(), 0, "m");
        let m_ref: MutexRef = m as *mut _;
        let t1 = make_task("t1", 2);
        let t2 = make_task("t2", 2);
        create_task(t1).unwrap();
        create_task(t2).unwrap();
        unsafe {
            activate(t1);
            activate(t2);

            acquire(t1, m_ref).unwrap();
        }
        assert_eq!(m.holder().unwrap(), t1);

        unsafe { acquire(t2, m_ref).unwrap() };
        assert_eq!(unsafe { (*t2).state }, TaskState::Suspended);
        assert_eq!(m.pending().unwrap(), t2);

        unsafe { release(m_ref) };
        assert_eq!(unsafe { (*t2).state }, TaskState::Ready);
        assert_eq!(m.holder().unwrap(), t2);
    }

    #[test]
    fn launch_idle_leaves_a_waiting_user_task_in_the_ready_set() {
        reset();
        let t1 = make_task("t1", 3);
        create_task(t1).unwrap();
        unsafe { activate(t1) };

        let k = unsafe { kernel_mut() };
        let (sp, _entry) = launch_idle(k);

        assert_eq!(k.current, k.idle);
        assert_eq!(unsafe { (*k.idle.unwrap()).state }, TaskState::Running);
        // t1 must still be queued so the first tick preempts idle with it.
        assert_eq!(k.ready.front(), Some(t1));
        assert_eq!(unsafe { (*t1).state }, TaskState::Ready);
        assert_eq!(sp, unsafe { (*k.idle.unwrap()).saved_sp });
    }

    #[test]
    fn launch_idle_pops_itself_when_no_user_task_is_runnable() {
        reset();
        let k = unsafe { kernel_mut() };
        launch_idle(k);
        assert!(k.ready.is_empty());
        assert_eq!(unsafe { (*k.idle.unwrap()).state }, TaskState::Running);
    }

    #[test]
    fn redispatch_is_suppressed_while_calling_through_idle() {
        reset();
        let k = unsafe { kernel_mut() };
        k.os_state = OsState::Running;
        k.current = k.idle;
        let t1 = make_task("t1", 3);
        create_task(t1).unwrap();
        let _ = take_pend_requested();
        unsafe { activate(t1) };
        assert!(!take_pend_requested());
    }

    #[test]
    fn round_robin_among_equal_priority_tasks_stays_fair() {
        reset();
        let t1 = make_task("t1", 4);
        let t2 = make_task("t2", 4);
        create_task(t1).unwrap();
        create_task(t2).unwrap();
        unsafe {
            activate(t1);
            activate(t2);
        }
        let k = unsafe { kernel_mut() };
        k.os_state = OsState::Running;
        let first = k.ready.pop_front().unwrap();
        unsafe { (*first).state = TaskState::Running };
        k.current = Some(first);

        let mut runs = [0u32; 2];
        let mut cur = first;
        for _ in 0..20 {
            runs[if cur == t1 { 0 } else { 1 }] += 1;
            tick();
            unsafe { commit_context_switch(core::ptr::null_mut()) };
            cur = unsafe { kernel_mut() }.current.unwrap();
        }

        assert!(
            runs[0].abs_diff(runs[1]) <= 1,
            "expected near-even split, got {runs:?}"
        );
    }

    #[test]
    fn redispatch_pends_a_switch_once_running() {
        reset();
        let t0 = make_task("t0", 1);
        create_task(t0).unwrap();
        unsafe { activate(t0) };
        let k = unsafe { kernel_mut() };
        k.os_state = OsState::Running;
        k.current = Some(t0);
        unsafe { (*t0).state = TaskState::Running };

        let t1 = make_task("t1", 0);
        create_task(t1).unwrap();
        let _ = take_pend_requested();
        unsafe { activate(t1) };
        assert!(take_pend_requested());
    }
}
