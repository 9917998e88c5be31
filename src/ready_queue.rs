//! The ready set: a bounded FIFO rebuilt from the task table on every
//! scheduling event.
//!
//! The ready set is never the source of truth — [`rebuild`] drains it and
//! refills it from [`crate::table::TaskTable`] every time, which is what
//! lets the dispatcher and the tick handler reason about "who is
//! runnable right now" without tracking incremental state.

use heapless::Deque;

use crate::config::MAX_TASKS;
use crate::error::KernelError;
use crate::task::{TaskRef, TaskState};

/// A bounded FIFO of runnable task references.
pub struct ReadySet {
    queue: Deque<TaskRef, MAX_TASKS>,
}

impl ReadySet {
    pub const fn new() -> Self {
        ReadySet {
            queue: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push_back(&mut self, task: TaskRef) -> Result<(), KernelError> {
        self.queue
            .push_back(task)
            .map_err(|_| KernelError::ReadyQueueInitError)
    }

    pub fn pop_front(&mut self) -> Option<TaskRef> {
        self.queue.pop_front()
    }

    /// The head of the queue, without removing it.
    pub fn front(&self) -> Option<TaskRef> {
        self.queue.front().copied()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    /// Current contents, head first. For tests and logging only.
    pub fn iter(&self) -> impl Iterator<Item = &TaskRef> {
        self.queue.iter()
    }
}

impl Default for ReadySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuild `ready` from `table`, following the algorithm in
/// `SPEC_FULL.md` §4.C: walk the sorted table from the top, enqueueing
/// every non-`Suspended` task (normalizing its state to `Ready`) and
/// stopping as soon as the walk reaches a strictly-lower-priority task,
/// a `Suspended` task, or the end of the table.
///
/// `table` must already be sorted ascending by priority
/// ([`crate::table::TaskTable::sort`]); an inversion found mid-walk is
/// reported as [`KernelError::BubbleSortError`] rather than silently
/// producing a wrong ready set.
pub fn rebuild(
    table: &crate::table::TaskTable,
    ready: &mut ReadySet,
) -> Result<(), KernelError> {
    ready.clear();
    let n = table.len();
    for i in 0..n {
        let cur = table.get(i).expect("i < table.len()");
        let cur_tcb = unsafe { &mut *cur };
        if !cur_tcb.is_runnable() {
            continue;
        }
        cur_tcb.state = TaskState::Ready;
        ready.push_back(cur)?;

        match table.get(i + 1) {
            None => break,
            Some(nxt) => {
                let nxt_tcb = unsafe { &*nxt };
                if !nxt_tcb.is_runnable() {
                    break;
                }
                if cur_tcb.priority < nxt_tcb.priority {
                    break;
                }
                if cur_tcb.priority > nxt_tcb.priority {
                    return Err(KernelError::BubbleSortError);
                }
                // equal priority: continue the walk (round robin group)
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TaskTable;
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

    fn install(table: &mut TaskTable, t: &TaskControlBlock) -> TaskRef {
        let r = t as *const _ as TaskRef;
        table.insert(r).unwrap();
        r
    }

    #[test]
    fn rebuild_stops_at_first_lower_priority_task() {
        let mut table = TaskTable::new();
        let a = tcb(1, TaskState::Waiting);
        let b = tcb(2, TaskState::Waiting);
        install(&mut table, &a);
        install(&mut table, &b);
        table.sort();

        let mut ready = ReadySet::new();
        rebuild(&table, &mut ready).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready.pop_front().unwrap(), &*a as *const _ as TaskRef);
    }

    #[test]
    fn rebuild_includes_whole_equal_priority_group() {
        let mut table = TaskTable::new();
        let a = tcb(2, TaskState::Waiting);
        let b = tcb(2, TaskState::Ready);
        let c = tcb(3, TaskState::Waiting);
        install(&mut table, &a);
        install(&mut table, &b);
        install(&mut table, &c);
        table.sort();

        let mut ready = ReadySet::new();
        rebuild(&table, &mut ready).unwrap();
        assert_eq!(ready.len(), 2);
    }

    #[test]
    fn rebuild_skips_suspended_tasks() {
        let mut table = TaskTable::new();
        let a = tcb(1, TaskState::Suspended);
        let b = tcb(2, TaskState::Waiting);
        install(&mut table, &a);
        install(&mut table, &b);
        table.sort();

        let mut ready = ReadySet::new();
        rebuild(&table, &mut ready).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready.pop_front().unwrap(), &*b as *const _ as TaskRef);
    }

    #[test]
    fn rebuild_on_empty_table_yields_empty_ready_set() {
        let table = TaskTable::new();
        let mut ready = ReadySet::new();
        rebuild(&table, &mut ready).unwrap();
        assert!(ready.is_empty());
    }
}
