//! Descending bump allocator for per-task stacks.
//!
//! The kernel carves task stacks out of a single linear RAM region. The
//! main stack (used by exception handlers) occupies the top
//! [`crate::config::MAIN_STACK_SIZE`] bytes of that region; everything
//! below is handed out to tasks, top-down, separated by
//! [`crate::config::GUARD_GAP`] bytes. There is no deallocation — tasks
//! are never deleted.

use crate::config::GUARD_GAP;
use crate::error::KernelError;

/// A descending bump allocator over `[bottom, top)`.
pub struct Arena {
    /// Lowest address the arena may ever hand out (the heap floor).
    bottom: *mut u8,
    /// Next address to hand out from (always `<=` the last allocation's
    /// bottom, minus the guard gap).
    cursor: *mut u8,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Build an arena spanning `[bottom, top)`. `top` should be the
    /// address just below the main stack's reserved region.
    pub const fn new(bottom: *mut u8, top: *mut u8) -> Self {
        Arena {
            bottom,
            cursor: top,
        }
    }

    /// Carve `size` bytes off the top of the remaining region, returning
    /// `(top, bottom)` — both inclusive word-aligned stack bounds for the
    /// caller to use as a task's `stack_top`/`stack_bottom`.
    ///
    /// Fails with [`KernelError::TaskExceededStack`] if the new bottom
    /// would be at or below the arena floor, leaving the arena unchanged.
    pub fn allocate(&mut self, size: usize) -> Result<(*mut u8, *mut u8), KernelError> {
        let top = self.cursor;
        let bottom = unsafe { top.sub(size) };
        if (bottom as usize) <= (self.bottom as usize) {
            return Err(KernelError::TaskExceededStack);
        }
        self.cursor = unsafe { bottom.sub(GUARD_GAP) };
        Ok((top, bottom))
    }

    /// Bytes remaining between the cursor and the arena floor.
    pub fn remaining(&self) -> usize {
        (self.cursor as usize).saturating_sub(self.bottom as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_of(size: usize) -> (Vec<u8>, Arena) {
        let mut buf = vec![0u8; size];
        let top = unsafe { buf.as_mut_ptr().add(size) };
        let bottom = buf.as_mut_ptr();
        (buf, Arena::new(bottom, top))
    }

    #[test]
    fn allocations_descend_and_respect_guard_gap() {
        let (_buf, mut arena) = arena_of(4096);
        let (top1, bottom1) = arena.allocate(512).unwrap();
        assert_eq!(unsafe { top1.offset_from(bottom1) } as usize, 512);
        let (top2, _bottom2) = arena.allocate(256).unwrap();
        assert_eq!(top2, unsafe { bottom1.sub(GUARD_GAP) });
    }

    #[test]
    fn exhaustion_reports_error_and_does_not_mutate_cursor() {
        let (_buf, mut arena) = arena_of(500);
        let before = arena.remaining();
        let err = arena.allocate(600).unwrap_err();
        assert_eq!(err, KernelError::TaskExceededStack);
        assert_eq!(arena.remaining(), before);
    }

    #[test]
    fn many_small_allocations_stay_disjoint() {
        let (_buf, mut arena) = arena_of(4096);
        let mut regions = Vec::new();
        for _ in 0..20 {
            regions.push(arena.allocate(100).unwrap());
        }
        for i in 0..regions.len() {
            for j in 0..regions.len() {
                if i == j {
                    continue;
                }
                let (top_i, bottom_i) = regions[i];
                let (top_j, bottom_j) = regions[j];
                let disjoint = (top_i as usize) <= (bottom_j as usize)
                    || (top_j as usize) <= (bottom_i as usize);
                assert!(disjoint, "regions {i} and {j} overlap");
            }
        }
    }
}
