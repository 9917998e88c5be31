//! Single-holder mutex with at most one pending waiter.
//!
//! There is no priority inheritance and no multi-waiter queue: a second
//! task attempting to acquire an already-blocked mutex is turned away
//! with [`KernelError::ManyUsersOnMutex`] rather than queued. Acquiring
//! two mutexes in opposite order across two tasks will deadlock; nothing
//! in this module detects or prevents that.

use heapless::String;

use crate::config::NAME_LEN;
use crate::error::KernelError;
use crate::task::TaskRef;

/// Observable state of a [`Mutex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexState {
    /// No holder. `holder` and `pending` are both `None`.
    Released,
    /// A task holds the mutex. `pending` is `Some` iff a second task is
    /// waiting for it.
    Blocked,
}

/// A single-holder lock over an opaque payload.
pub struct Mutex {
    pub name: String<NAME_LEN>,
    payload: *mut u8,
    size: usize,
    holder: Option<TaskRef>,
    pending: Option<TaskRef>,
    state: MutexState,
}

unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub const fn empty() -> Self {
        Mutex {
            name: String::new(),
            payload: core::ptr::null_mut(),
            size: 0,
            holder: None,
            pending: None,
            state: MutexState::Released,
        }
    }

    /// Initialize the mutex over `payload`/`size`. Always starts
    /// `Released`, with no holder and no pending waiter.
    pub fn init(&mut self, name: &str, payload: *mut u8, size: usize) {
        self.name = String::try_from(name).unwrap_or_default();
        self.payload = payload;
        self.size = size;
        self.holder = None;
        self.pending = None;
        self.state = MutexState::Released;
    }

    pub fn state(&self) -> MutexState {
        self.state
    }

    pub fn holder(&self) -> Option<TaskRef> {
        self.holder
    }

    pub fn pending(&self) -> Option<TaskRef> {
        self.pending
    }

    /// Raw access to the guarded payload. Callers must already hold the
    /// mutex; this type does nothing to enforce that beyond the caller
    /// discipline documented on the kernel's public `acquire`/`release`.
    pub fn payload(&self) -> (*mut u8, usize) {
        (self.payload, self.size)
    }

    /// Attempt to acquire the mutex for `task`.
    ///
    /// Returns `Ok(true)` if `task` became the holder immediately,
    /// `Ok(false)` if `task` is now the pending waiter (the caller must
    /// suspend `task` and let [`Mutex::release`] wake it), or
    /// `Err(KernelError::ManyUsersOnMutex)` if a waiter is already
    /// pending.
    pub fn acquire(&mut self, task: TaskRef) -> Result<bool, KernelError> {
        match self.state {
            MutexState::Released => {
                self.holder = Some(task);
                self.state = MutexState::Blocked;
                Ok(true)
            }
            MutexState::Blocked => {
                if self.pending.is_some() {
                    return Err(KernelError::ManyUsersOnMutex);
                }
                self.pending = Some(task);
                Ok(false)
            }
        }
    }

    /// Release the mutex. Promotes the pending waiter to holder, if any;
    /// otherwise the mutex returns to `Released`. Returns the promoted
    /// task, if any, so the caller can move it from `Suspended` to
    /// `Waiting` and re-run the ready-set rebuild.
    pub fn release(&mut self) -> Option<TaskRef> {
        match self.pending.take() {
            Some(next_holder) => {
                self.holder = Some(next_holder);
                self.state = MutexState::Blocked;
                Some(next_holder)
            }
            None => {
                self.holder = None;
                self.state = MutexState::Released;
                None
            }
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_ref(n: u32) -> TaskRef {
        n as usize as TaskRef
    }

    #[test]
    fn first_acquire_succeeds_immediately() {
        let mut m = Mutex::empty();
        m.init("m", core::ptr::null_mut(), 0);
        let t1 = task_ref(1);
        assert_eq!(m.acquire(t1), Ok(true));
        assert_eq!(m.state(), MutexState::Blocked);
        assert_eq!(m.holder(), Some(t1));
    }

    #[test]
    fn second_acquire_becomes_pending_waiter() {
        let mut m = Mutex::empty();
        m.init("m", core::ptr::null_mut(), 0);
        let t1 = task_ref(1);
        let t2 = task_ref(2);
        assert_eq!(m.acquire(t1), Ok(true));
        assert_eq!(m.acquire(t2), Ok(false));
        assert_eq!(m.pending(), Some(t2));
    }

    #[test]
    fn third_acquirer_is_rejected() {
        let mut m = Mutex::empty();
        m.init("m", core::ptr::null_mut(), 0);
        let (t1, t2, t3) = (task_ref(1), task_ref(2), task_ref(3));
        m.acquire(t1).unwrap();
        m.acquire(t2).unwrap();
        assert_eq!(m.acquire(t3), Err(KernelError::ManyUsersOnMutex));
    }

    #[test]
    fn release_promotes_pending_waiter() {
        let mut m = Mutex::empty();
        m.init("m", core::ptr::null_mut(), 0);
        let (t1, t2) = (task_ref(1), task_ref(2));
        m.acquire(t1).unwrap();
        m.acquire(t2).unwrap();
        let promoted = m.release();
        assert_eq!(promoted, Some(t2));
        assert_eq!(m.holder(), Some(t2));
        assert_eq!(m.state(), MutexState::Blocked);
    }

    #[test]
    fn release_with_no_waiter_goes_released() {
        let mut m = Mutex::empty();
        m.init("m", core::ptr::null_mut(), 0);
        let t1 = task_ref(1);
        m.acquire(t1).unwrap();
        assert_eq!(m.release(), None);
        assert_eq!(m.state(), MutexState::Released);
        assert_eq!(m.holder(), None);
    }
}
