//! Heap accounting per isolation context.
//!
//! Each context thread attaches its [`ResourceCounters`] to a thread-local
//! slot for its whole lifetime. [`AccountingAllocator`] charges every
//! allocation made on an attached thread to those counters. Memory that is
//! allocated on one thread and released on another is only credited if the
//! release happens on an attached thread, so live bytes are an estimate.
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: lamtamnix_isolation::AccountingAllocator = lamtamnix_isolation::AccountingAllocator::system();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr;
use std::sync::Arc;

use crate::counters::ResourceCounters;

thread_local! {
    // Const-initialized and destructor-free, so touching it never allocates.
    static CURRENT: Cell<*const ResourceCounters> = const { Cell::new(ptr::null()) };
}

/// Global allocator wrapper that feeds context resource counters.
#[derive(Debug, Default)]
pub struct AccountingAllocator<A = System> {
    inner: A,
}

impl AccountingAllocator<System> {
    /// Wrap the system allocator.
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

impl<A> AccountingAllocator<A> {
    /// Wrap an arbitrary allocator.
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[inline]
fn with_current(f: impl FnOnce(&ResourceCounters)) {
    let _ = CURRENT.try_with(|slot| {
        let counters = slot.get();
        if !counters.is_null() {
            // SAFETY: the pointer is set by `attach` from an `Arc` that the
            // attached thread keeps alive until the guard clears the slot.
            f(unsafe { &*counters });
        }
    });
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for AccountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let block = unsafe { self.inner.alloc(layout) };
        if !block.is_null() {
            with_current(|c| c.record_alloc(layout.size() as u64));
        }
        block
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let block = unsafe { self.inner.alloc_zeroed(layout) };
        if !block.is_null() {
            with_current(|c| c.record_alloc(layout.size() as u64));
        }
        block
    }

    unsafe fn dealloc(&self, block: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(block, layout) };
        with_current(|c| c.record_dealloc(layout.size() as u64));
    }

    unsafe fn realloc(&self, block: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let moved = unsafe { self.inner.realloc(block, layout, new_size) };
        if !moved.is_null() {
            with_current(|c| {
                c.record_dealloc(layout.size() as u64);
                c.record_alloc(new_size as u64);
            });
        }
        moved
    }
}

/// Detaches the counters from the current thread when dropped.
#[derive(Debug)]
pub(crate) struct AttachGuard {
    _counters: Arc<ResourceCounters>,
}

/// Charge allocations on the current thread to `counters` until the guard drops.
pub(crate) fn attach(counters: &Arc<ResourceCounters>) -> AttachGuard {
    let counters = Arc::clone(counters);
    CURRENT.with(|slot| slot.set(Arc::as_ptr(&counters)));
    AttachGuard { _counters: counters }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let _ = CURRENT.try_with(|slot| slot.set(ptr::null()));
    }
}
