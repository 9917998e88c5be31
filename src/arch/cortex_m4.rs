//! Cortex-M4 port layer.
//!
//! Hardware-specific half of the kernel: the two naked exception
//! handlers (`SVCall`, `PendSV`), the `SysTick` handler, NVIC priority
//! setup, and the first-task launch sequence. Everything here exists
//! because the normal calling convention cannot be trusted across a
//! context switch or across "returning" into a task that never called
//! in — see `SPEC_FULL.md` §4.E and §9 ("Naked handlers").
//!
//! The split-stack model: MSP holds the kernel's own stack (used by
//! these handlers and by thread-mode code before [`start_first_task`]
//! runs); PSP holds whichever task is current. On exception entry the
//! hardware auto-stacks R0-R3, R12, LR, PC, xPSR onto the active stack;
//! `PendSV` additionally saves/restores R4-R11 by hand, which completes
//! the context.

use core::arch::asm;

use cortex_m::peripheral::syst::SystClkSource;

use crate::arch::Service;
use crate::config::{GUARD_GAP, HEAP_SIZE, MAIN_STACK_SIZE, SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::error::KernelError;

// ---------------------------------------------------------------------------
// Backing RAM for the arena allocator
// ---------------------------------------------------------------------------

/// 8-byte-aligned backing store, so every stack top the arena hands out
/// satisfies the AAPCS/PSP alignment requirement `frame::synthesize_initial_frame`
/// asserts on — a `[u8; N]` alone only guarantees 1-byte alignment.
#[repr(align(8))]
#[allow(dead_code)]
struct KernelRam([u8; MAIN_STACK_SIZE + HEAP_SIZE]);

/// The single linear RAM region the kernel carves task stacks out of.
/// The out-of-scope linker-provided stack/heap symbols this crate
/// otherwise relies on (`SPEC_FULL.md` §1) are stood in here by a plain
/// statically-sized region, so the port doesn't depend on a specific
/// board's memory layout.
static mut KERNEL_RAM: KernelRam = KernelRam([0; MAIN_STACK_SIZE + HEAP_SIZE]);

/// Bounds of the region the arena allocator may hand out, per
/// `SPEC_FULL.md` §4.A: the cursor starts [`GUARD_GAP`] bytes below the
/// main stack's bottom.
pub fn arena_bounds() -> (*mut u8, *mut u8) {
    unsafe {
        let (_, main_stack_bottom) = main_stack_bounds();
        let arena_top = main_stack_bottom.sub(GUARD_GAP);
        let arena_bottom = core::ptr::addr_of_mut!(KERNEL_RAM) as *mut u8;
        (arena_bottom, arena_top)
    }
}

/// Bounds of the main stack reserved at the top of [`KERNEL_RAM`].
pub fn main_stack_bounds() -> (*mut u8, *mut u8) {
    unsafe {
        let base = core::ptr::addr_of_mut!(KERNEL_RAM) as *mut u8;
        let top = base.add(MAIN_STACK_SIZE + HEAP_SIZE);
        let bottom = top.sub(MAIN_STACK_SIZE);
        (bottom, top)
    }
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at [`TICK_HZ`], sourced from the core clock.
pub fn configure_tick() -> Result<(), KernelError> {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ;
    if reload == 0 || reload > 0x00FF_FFFF {
        return Err(KernelError::TickStartError);
    }
    let mut syst = unsafe { cortex_m::Peripherals::steal().SYST };
    syst.set_reload(reload - 1);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
    Ok(())
}

// ---------------------------------------------------------------------------
// NVIC priority layout
// ---------------------------------------------------------------------------

/// Priority layout per `SPEC_FULL.md` §4.E: `SVCall` highest (so the
/// kernel entry never observes a half-completed switch), `SysTick` in
/// the middle, `PendSV` lowest (so a pended switch always tail-chains
/// after whichever trap requested it).
const PRIO_SVCALL: u8 = 0x00;
const PRIO_SYSTICK: u8 = 0x80;
const PRIO_PENDSV: u8 = 0xF0;

pub fn set_trap_priorities() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;
        scb.set_priority(cortex_m::peripheral::scb::SystemHandler::SVCall, PRIO_SVCALL);
        scb.set_priority(cortex_m::peripheral::scb::SystemHandler::SysTick, PRIO_SYSTICK);
        scb.set_priority(cortex_m::peripheral::scb::SystemHandler::PendSV, PRIO_PENDSV);
    }
}

// ---------------------------------------------------------------------------
// Context-switch pend
// ---------------------------------------------------------------------------

/// Set `PendSV`'s pending bit in the Interrupt Control and State
/// Register, so the switch runs as soon as the current, higher-priority
/// trap returns.
#[inline]
pub fn pend_context_switch() {
    cortex_m::peripheral::SCB::set_pendsv();
}

// ---------------------------------------------------------------------------
// Supervisor call
// ---------------------------------------------------------------------------

/// Raise the supervisor call selecting `service`. The `svc` immediate
/// must be a compile-time constant, so each service gets its own
/// instruction rather than a parameterized one.
#[inline(always)]
pub fn raise_supervisor_call(service: Service) {
    unsafe {
        match service {
            Service::Activate => asm!("svc 1", options(nomem, nostack, preserves_flags)),
            Service::Terminate => asm!("svc 2", options(nomem, nostack, preserves_flags)),
            Service::WaitTimeout => asm!("svc 3", options(nomem, nostack, preserves_flags)),
            Service::AcquireMutex => asm!("svc 4", options(nomem, nostack, preserves_flags)),
            Service::ReleaseMutex => asm!("svc 5", options(nomem, nostack, preserves_flags)),
        }
    }
}

/// `SVCall` exception handler.
///
/// Unlike `PendSV` this does not need to be naked: it never changes
/// PSP itself, so the compiler-generated prologue/epilogue is harmless.
/// It reads the immediate operand out of the two-byte `svc` instruction
/// that trapped (the stacked `PC` points just past it) and demultiplexes
/// into [`crate::kernel::handle_supervisor_call`].
#[no_mangle]
pub unsafe extern "C" fn SVCall() {
    let psp = cortex_m::register::psp::read() as *const u32;
    // Hardware frame: R0, R1, R2, R3, R12, LR, PC, xPSR.
    let pc = *psp.add(6) as *const u16;
    let svc_instruction = *pc.offset(-1);
    let imm = (svc_instruction & 0x00FF) as u8;
    let service = match imm {
        1 => Service::Activate,
        2 => Service::Terminate,
        3 => Service::WaitTimeout,
        4 => Service::AcquireMutex,
        5 => Service::ReleaseMutex,
        _ => return,
    };
    crate::kernel::handle_supervisor_call(service);
}

// ---------------------------------------------------------------------------
// PendSV: the context switch
// ---------------------------------------------------------------------------

/// `PendSV` exception handler — the context switch itself.
///
/// Runs the six-step protocol from `SPEC_FULL.md` §4.E: save R4-R11 onto
/// the outgoing task's stack, hand the updated stack pointer to
/// [`crate::kernel::commit_context_switch`] (which commits `current <-
/// next` and returns the incoming task's saved stack pointer), restore
/// R4-R11 from the incoming stack, and return from exception. Naked
/// because the compiler's own prologue would clobber PSP before step 1
/// completes.
///
/// # Safety
/// Only valid as the `PendSV` vector. Must run at the lowest trap
/// priority so no other kernel work is outstanding when it fires.
#[naked]
#[no_mangle]
pub unsafe extern "C" fn PendSV() {
    asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {commit}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",
        "bx r0",
        commit = sym crate::kernel::commit_context_switch,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// SysTick: the periodic tick
// ---------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    crate::kernel::tick();
}

// ---------------------------------------------------------------------------
// First-task launch
// ---------------------------------------------------------------------------

/// Launch the very first task. Unlike every later switch this one does
/// not go through `PendSV`: the caller ([`crate::kernel::start`]) is
/// still running in thread mode on MSP with interrupts not yet enabled,
/// so it can set PSP and the stack-selector/privilege bits directly and
/// then simply call `entry`. `saved_sp` is the synthetic frame's saved
/// pointer ([`crate::frame::synthesize_initial_frame`]); the eight
/// software-saved registers it encodes are skipped since `entry` is
/// called, not "returned into".
///
/// # Safety
/// Must be called at most once, with a `saved_sp` produced by
/// [`crate::frame::synthesize_initial_frame`] for `entry`.
pub unsafe fn start_first_task(saved_sp: *mut u32, entry: extern "C" fn() -> !) -> ! {
    let psp = saved_sp.add(8);
    asm!(
        "msr psp, {psp}",
        "movs r0, #3", // SPSEL=1 (use PSP), nPRIV=1 (unprivileged thread mode)
        "msr control, r0",
        "isb",
        psp = in(reg) psp,
        out("r0") _,
        options(nostack),
    );
    entry()
}
