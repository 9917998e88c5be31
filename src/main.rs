//! Demo firmware: three periodic tasks and a mutex-guarded counter.
//!
//! | Task | Priority | Behavior |
//! |------|----------|----------|
//! | `producer` | 1 | Holds the shared counter's mutex, increments it, sleeps |
//! | `consumer` | 2 | Takes the mutex, reads the counter, sleeps |
//! | `heartbeat` | 3 | Runs every tick, does nothing but demonstrate preemption |

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use taskkernel::kernel::{self, MutexRef};
use taskkernel::mutex::Mutex;
use taskkernel::task::{TaskControlBlock, TaskRef};

static mut PRODUCER_TCB: TaskControlBlock = TaskControlBlock::empty();
static mut CONSUMER_TCB: TaskControlBlock = TaskControlBlock::empty();
static mut HEARTBEAT_TCB: TaskControlBlock = TaskControlBlock::empty();

static mut COUNTER: u32 = 0;
static mut COUNTER_MUTEX: Mutex = Mutex::empty();

extern "C" fn producer() -> ! {
    loop {
        let mutex: MutexRef = unsafe { core::ptr::addr_of_mut!(COUNTER_MUTEX) };
        let task: TaskRef = unsafe { core::ptr::addr_of_mut!(PRODUCER_TCB) };
        unsafe {
            kernel::acquire(task, mutex).expect("producer holds the only pending slot");
            COUNTER = COUNTER.wrapping_add(1);
            kernel::release(mutex);
            kernel::wait(10, task);
        }
    }
}

extern "C" fn consumer() -> ! {
    loop {
        let mutex: MutexRef = unsafe { core::ptr::addr_of_mut!(COUNTER_MUTEX) };
        let task: TaskRef = unsafe { core::ptr::addr_of_mut!(CONSUMER_TCB) };
        unsafe {
            kernel::acquire(task, mutex).expect("consumer holds the only pending slot");
            let _value = COUNTER;
            kernel::release(mutex);
            kernel::wait(15, task);
        }
    }
}

extern "C" fn heartbeat() -> ! {
    let task: TaskRef = unsafe { core::ptr::addr_of_mut!(HEARTBEAT_TCB) };
    loop {
        unsafe { kernel::wait(1, task) };
    }
}

#[entry]
fn main() -> ! {
    kernel::init();

    let producer_tcb = unsafe { &mut *core::ptr::addr_of_mut!(PRODUCER_TCB) };
    let consumer_tcb = unsafe { &mut *core::ptr::addr_of_mut!(CONSUMER_TCB) };
    let heartbeat_tcb = unsafe { &mut *core::ptr::addr_of_mut!(HEARTBEAT_TCB) };
    let counter_mutex = unsafe { &mut *core::ptr::addr_of_mut!(COUNTER_MUTEX) };

    kernel::mutex_init(
        counter_mutex,
        unsafe { core::ptr::addr_of_mut!(COUNTER) as *mut u8 },
        core::mem::size_of::<u32>(),
        "counter",
    );

    kernel::task_init(producer_tcb, 1024, producer, 1, "producer");
    kernel::task_init(consumer_tcb, 1024, consumer, 2, "consumer");
    kernel::task_init(heartbeat_tcb, 512, heartbeat, 3, "heartbeat");

    let producer_ref: TaskRef = producer_tcb as *mut _;
    let consumer_ref: TaskRef = consumer_tcb as *mut _;
    let heartbeat_ref: TaskRef = heartbeat_tcb as *mut _;

    kernel::create_task(producer_ref).expect("producer stack fits the arena");
    kernel::create_task(consumer_ref).expect("consumer stack fits the arena");
    kernel::create_task(heartbeat_ref).expect("heartbeat stack fits the arena");

    unsafe {
        kernel::activate(producer_ref);
        kernel::activate(consumer_ref);
        kernel::activate(heartbeat_ref);
    }

    kernel::start()
}
