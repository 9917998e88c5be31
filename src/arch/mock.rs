//! Host port: a stand-in for the Cortex-M4 trap/register layer so the
//! kernel's logic (task table, ready set, dispatcher, mutex, tick
//! countdown) can be exercised with `cargo test` on the development
//! machine, without real silicon.
//!
//! There is no NVIC and no hardware exception mechanism here, so the
//! things the real port does with `svc`/naked asm/register writes are
//! done directly: raising a supervisor call is just a function call
//! into [`crate::kernel::handle_supervisor_call`], and pending a context
//! switch has nothing to preempt, so it is a no-op. `start_first_task`
//! keeps the real signature (and really does call `entry`, which never
//! returns) so it type-checks identically, but no test calls it.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::Service;
use crate::config::{GUARD_GAP, HEAP_SIZE, MAIN_STACK_SIZE};
use crate::error::KernelError;

/// 8-byte-aligned backing store, matching the real port's alignment
/// guarantee so stack tops satisfy `frame::synthesize_initial_frame`'s
/// alignment assertion on host tests too.
#[repr(align(8))]
#[allow(dead_code)]
struct KernelRam([u8; MAIN_STACK_SIZE + HEAP_SIZE]);

static mut KERNEL_RAM: KernelRam = KernelRam([0; MAIN_STACK_SIZE + HEAP_SIZE]);

/// Set whenever [`pend_context_switch`] runs, so tests can assert a
/// switch was requested without a real NVIC to observe.
static PEND_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Consume and return whether a context switch has been pended since
/// the last call. Test-only; the real port has no equivalent because
/// the NVIC's pending bit is directly observable.
pub fn take_pend_requested() -> bool {
    PEND_REQUESTED.swap(false, Ordering::SeqCst)
}

pub fn arena_bounds() -> (*mut u8, *mut u8) {
    unsafe {
        let (_, main_stack_bottom) = main_stack_bounds();
        let arena_top = main_stack_bottom.sub(GUARD_GAP);
        let arena_bottom = core::ptr::addr_of_mut!(KERNEL_RAM) as *mut u8;
        (arena_bottom, arena_top)
    }
}

pub fn main_stack_bounds() -> (*mut u8, *mut u8) {
    unsafe {
        let base = core::ptr::addr_of_mut!(KERNEL_RAM) as *mut u8;
        let top = base.add(MAIN_STACK_SIZE + HEAP_SIZE);
        let bottom = top.sub(MAIN_STACK_SIZE);
        (bottom, top)
    }
}

pub fn configure_tick() -> Result<(), KernelError> {
    Ok(())
}

pub fn set_trap_priorities() {}

pub fn pend_context_switch() {
    PEND_REQUESTED.store(true, Ordering::SeqCst);
}

/// No real trap to raise: call straight into the same dispatch the real
/// `SVCall` handler would, as if the `svc` had trapped immediately.
pub fn raise_supervisor_call(service: Service) {
    crate::kernel::handle_supervisor_call(service);
}

/// # Safety
/// Identical contract to the real port: `saved_sp` must come from
/// [`crate::frame::synthesize_initial_frame`] for `entry`. Calling this
/// invokes `entry`, which never returns — no test should call it.
pub unsafe fn start_first_task(saved_sp: *mut u32, entry: extern "C" fn() -> !) -> ! {
    let _ = saved_sp.add(8);
    entry()
}
