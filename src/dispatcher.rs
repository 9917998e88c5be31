//! Dispatcher: decide what runs next.
//!
//! The dispatcher never touches the task table directly — it only
//! consumes the already-rebuilt [`crate::ready_queue::ReadySet`] and the
//! currently running task, and marks its decision on the task states so
//! the context-switch trap ([`crate::arch`]) can pick it up.

use crate::ready_queue::ReadySet;
use crate::task::{TaskRef, TaskState};

/// Decide the next task to run.
///
/// - If the ready set is empty and `current` is still runnable, `current`
///   keeps running (this covers the single-task case where a trap fired
///   mid-task and nothing else is eligible).
/// - Otherwise the head of the ready set becomes the next task. If it is
///   the same priority as `current` and `current` is still runnable,
///   `current` is rotated to the tail of the ready set — the round-robin
///   step.
///
/// Returns the chosen task. `current`'s and the chosen task's `state`
/// fields are updated in place (`Running` for the winner, `Ready` for a
/// rotated-out `current`); the caller is responsible for actually
/// switching stacks.
///
/// # Safety
/// `current` and every reference in `ready` must point at live control
/// blocks.
pub unsafe fn dispatch(current: TaskRef, ready: &mut ReadySet) -> TaskRef {
    let current_tcb = unsafe { &mut *current };
    let current_runnable = current_tcb.is_runnable();

    let next = match ready.pop_front() {
        None => {
            debug_assert!(
                current_runnable,
                "dispatch called with nothing ready and a non-runnable current task"
            );
            current
        }
        Some(head) => {
            let head_tcb = unsafe { &*head };
            if current_runnable && current != head && current_tcb.priority == head_tcb.priority {
                current_tcb.state = TaskState::Ready;
                let _ = ready.push_back(current);
            }
            head
        }
    };

    unsafe { &mut *next }.state = TaskState::Running;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskControlBlock;

    extern "C" fn dummy() -> ! {
        loop {}
    }

    fn tcb(priority: u8, state: TaskState) -> Box<TaskControlBlock> {
        let mut t = Box::new(TaskControlBlock::empty());
        t.init("t", 1024, dummy, priority);
        t.state = state;
        t
    }

    #[test]
    fn empty_ready_set_keeps_current_running() {
        let current = tcb(1, TaskState::Running);
        let current_ref = Box::as_ref(&current) as *const _ as TaskRef;
        let mut ready = ReadySet::new();
        let next = unsafe { dispatch(current_ref, &mut ready) };
        assert_eq!(next, current_ref);
        assert_eq!(unsafe { (*next).state }, TaskState::Running);
    }

    #[test]
    fn higher_priority_arrival_preempts() {
        let current = tcb(5, TaskState::Running);
        let current_ref = Box::as_ref(&current) as *const _ as TaskRef;
        let urgent = tcb(1, TaskState::Ready);
        let urgent_ref = Box::as_ref(&urgent) as *const _ as TaskRef;

        let mut ready = ReadySet::new();
        ready.push_back(urgent_ref).unwrap();

        let next = unsafe { dispatch(current_ref, &mut ready) };
        assert_eq!(next, urgent_ref);
        assert_eq!(unsafe { (*urgent_ref).state }, TaskState::Running);
        // current was strictly lower priority: not rotated back in
        assert!(ready.is_empty());
    }

    #[test]
    fn equal_priority_rotates_current_to_tail() {
        let current = tcb(2, TaskState::Running);
        let current_ref = Box::as_ref(&current) as *const _ as TaskRef;
        let peer = tcb(2, TaskState::Ready);
        let peer_ref = Box::as_ref(&peer) as *const _ as TaskRef;

        let mut ready = ReadySet::new();
        ready.push_back(peer_ref).unwrap();

        let next = unsafe { dispatch(current_ref, &mut ready) };
        assert_eq!(next, peer_ref);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready.pop_front().unwrap(), current_ref);
        assert_eq!(unsafe { (*current_ref).state }, TaskState::Ready);
    }

    #[test]
    fn suspended_current_is_not_rotated_back() {
        let current = tcb(2, TaskState::Suspended);
        let current_ref = Box::as_ref(&current) as *const _ as TaskRef;
        let peer = tcb(2, TaskState::Ready);
        let peer_ref = Box::as_ref(&peer) as *const _ as TaskRef;

        let mut ready = ReadySet::new();
        ready.push_back(peer_ref).unwrap();

        let next = unsafe { dispatch(current_ref, &mut ready) };
        assert_eq!(next, peer_ref);
        assert!(ready.is_empty());
    }
}
