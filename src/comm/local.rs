use crate::comm::{
    combine_native, AllocResult, Backend, CombineFn, CommHandle, CommOps, DataType, NativeOp,
    RawGptr, TeamHandle,
};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

struct MyPtr {
    ptr: *mut [u8],
}
unsafe impl Sync for MyPtr {}
unsafe impl Send for MyPtr {}

/// Single unit backend: every address is local, collectives are no-ops.
#[derive(Debug)]
pub(crate) struct LocalComm {
    allocs: Mutex<HashMap<usize, MyPtr>>,
    next_segment: AtomicUsize,
}

impl std::fmt::Debug for MyPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MyPtr({:p})", self.ptr)
    }
}

impl LocalComm {
    pub(crate) fn new() -> LocalComm {
        LocalComm {
            allocs: Mutex::new(HashMap::new()),
            next_segment: AtomicUsize::new(0),
        }
    }

    fn resolve(&self, gptr: RawGptr, len: usize) -> *mut u8 {
        debug_assert!(!gptr.is_null(), "dereferencing a null global pointer");
        debug_assert_eq!(gptr.unit, 0);
        let allocs = self.allocs.lock();
        let data = allocs
            .get(&gptr.segment)
            .unwrap_or_else(|| panic!("unknown segment {}", gptr.segment));
        let size = unsafe { (&*data.ptr).len() };
        debug_assert!(gptr.offset + len <= size);
        unsafe { (data.ptr as *mut u8).add(gptr.offset) }
    }
}

impl CommOps for LocalComm {
    fn my_unit(&self) -> usize {
        0
    }

    fn num_units(&self) -> usize {
        1
    }

    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn barrier(&self, _team: &TeamHandle) {}

    fn team_alloc(&self, team: &TeamHandle, bytes: usize, _align: usize) -> AllocResult<RawGptr> {
        let data = vec![0u8; bytes].into_boxed_slice();
        let data_ptr = Box::into_raw(data);
        let segment = self.next_segment.fetch_add(1, Ordering::SeqCst);
        self.allocs.lock().insert(segment, MyPtr { ptr: data_ptr });
        trace!(segment, bytes, "local team_alloc");
        Ok(RawGptr::new(segment, team.global_unit(0), 0))
    }

    fn team_free(&self, _team: &TeamHandle, segment: usize) {
        if let Some(data) = self.allocs.lock().remove(&segment) {
            unsafe { drop(Box::from_raw(data.ptr)) };
        }
    }

    fn local_addr(&self, gptr: RawGptr) -> *mut u8 {
        self.resolve(gptr, 0)
    }

    fn put_blocking_local(&self, gptr: RawGptr, src: &[u8]) {
        let dst = self.resolve(gptr, src.len());
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) };
    }

    fn get_blocking(&self, gptr: RawGptr, dst: &mut [u8]) {
        let src = self.resolve(gptr, dst.len());
        unsafe { std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) };
    }

    fn put_handle(&self, gptr: RawGptr, src: &[u8]) -> CommHandle {
        self.put_blocking_local(gptr, src);
        CommHandle::ready()
    }

    fn get_handle(&self, gptr: RawGptr, dst: &mut [u8]) -> CommHandle {
        self.get_blocking(gptr, dst);
        CommHandle::ready()
    }

    fn test_local(&self, handle: &CommHandle) -> bool {
        handle.is_complete()
    }

    fn wait(&self, handle: CommHandle) {
        debug_assert!(handle.is_complete());
    }

    fn flush(&self, _gptr: RawGptr) {}

    fn allreduce(
        &self,
        team: &TeamHandle,
        dtype: DataType,
        op: NativeOp,
        src: &[u8],
        dst: &mut [u8],
    ) {
        self.allreduce_custom(team, src, dst, &|s, acc| combine_native(dtype, op, s, acc));
    }

    fn allreduce_custom(
        &self,
        _team: &TeamHandle,
        src: &[u8],
        dst: &mut [u8],
        _combine: &CombineFn<'_>,
    ) {
        // one contribution, nothing to fold
        dst.copy_from_slice(src);
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        let mut allocs = self.allocs.lock();
        for (_, data) in allocs.drain() {
            unsafe { drop(Box::from_raw(data.ptr)) };
        }
    }
}
