use crate::comm::{
    combine_native, AllocError, AllocResult, Backend, CombineFn, CommHandle, CommOps, DataType,
    NativeOp, RawGptr, TeamHandle,
};
use crate::env_var::config;

use parking_lot::{Condvar, Mutex, RwLock};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

lazy_static! {
    // process-wide registry, how units attach to the group that spawned them
    static ref GROUPS: Mutex<HashMap<usize, Arc<ShmemGroup>>> = Mutex::new(HashMap::new());
}

static NEXT_GROUP_ID: AtomicUsize = AtomicUsize::new(0);

struct UnitMem {
    ptr: NonNull<u8>,
    layout: Option<Layout>,
}

unsafe impl Send for UnitMem {}
unsafe impl Sync for UnitMem {}

impl UnitMem {
    fn new(bytes: usize, align: usize) -> AllocResult<UnitMem> {
        if bytes == 0 {
            return Ok(UnitMem {
                ptr: NonNull::dangling(),
                layout: None,
            });
        }
        let layout = Layout::from_size_align(bytes, align.max(1))
            .map_err(|_| AllocError::OutOfMemoryError(bytes))?;
        let raw = unsafe { alloc_zeroed(layout) };
        match NonNull::new(raw) {
            Some(ptr) => Ok(UnitMem {
                ptr,
                layout: Some(layout),
            }),
            None => Err(AllocError::OutOfMemoryError(bytes)),
        }
    }
}

impl Drop for UnitMem {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

struct Segment {
    // keyed by global unit id, sub-team segments hold storage only for members
    per_unit: HashMap<usize, UnitMem>,
    bytes_per_unit: usize,
    owners: usize,
    released: usize,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Phase {
    Arrive,
    Depart,
}

struct CollState {
    phase: Phase,
    arrived: usize,
    departed: usize,
    buf: Vec<u8>,
    out: Option<AllocResult<usize>>,
}

impl CollState {
    fn new() -> CollState {
        CollState {
            phase: Phase::Arrive,
            arrived: 0,
            departed: 0,
            buf: Vec::new(),
            out: None,
        }
    }
}

/// One process group: the symmetric heap and collective rendezvous state
/// shared by every unit (thread) attached to it.
pub(crate) struct ShmemGroup {
    id: usize,
    num_units: usize,
    segments: RwLock<HashMap<usize, Segment>>,
    next_segment: AtomicUsize,
    // bytes of symmetric heap in use per unit, capped by the
    // TESSERA_SEGMENT_SIZE configuration
    heap_used: AtomicUsize,
    coll: Mutex<HashMap<u64, CollState>>,
    coll_cvar: Condvar,
}

impl ShmemGroup {
    fn new(id: usize, num_units: usize) -> ShmemGroup {
        ShmemGroup {
            id,
            num_units,
            segments: RwLock::new(HashMap::new()),
            next_segment: AtomicUsize::new(0),
            heap_used: AtomicUsize::new(0),
            coll: Mutex::new(HashMap::new()),
            coll_cvar: Condvar::new(),
        }
    }

    /// Two-phase generation rendezvous: all members arrive (each folding in
    /// its contribution), the last to arrive completes the operation, and
    /// nobody may start the team's next collective until all have departed.
    fn collective<R>(
        &self,
        team: &TeamHandle,
        mut arrive: impl FnMut(&mut CollState, bool),
        finish: impl FnOnce(&mut CollState),
        read: impl FnOnce(&CollState) -> R,
    ) -> R {
        let size = team.size();
        let timeout = Duration::from_secs_f64(config().deadlock_timeout);
        let mut states = self.coll.lock();
        loop {
            let st = states.entry(team.id).or_insert_with(CollState::new);
            if st.phase == Phase::Arrive {
                break;
            }
            if self.coll_cvar.wait_for(&mut states, timeout).timed_out() {
                warn!(
                    team = team.id,
                    "waiting to enter a collective for over {:?}, possible mismatch", timeout
                );
            }
        }
        {
            let st = states.get_mut(&team.id).unwrap();
            let first = st.arrived == 0;
            arrive(st, first);
            st.arrived += 1;
            if st.arrived == size {
                finish(st);
                st.phase = Phase::Depart;
                st.departed = 0;
                self.coll_cvar.notify_all();
            }
        }
        loop {
            let st = states.get(&team.id).unwrap();
            if st.phase == Phase::Depart {
                break;
            }
            if self.coll_cvar.wait_for(&mut states, timeout).timed_out() {
                warn!(
                    team = team.id,
                    "blocked in a collective for over {:?}, possible mismatch", timeout
                );
            }
        }
        let st = states.get_mut(&team.id).unwrap();
        let result = read(st);
        st.departed += 1;
        if st.departed == size {
            st.phase = Phase::Arrive;
            st.arrived = 0;
            st.buf.clear();
            st.out = None;
            self.coll_cvar.notify_all();
        }
        result
    }

    fn resolve(&self, gptr: RawGptr, len: usize) -> *mut u8 {
        debug_assert!(!gptr.is_null(), "dereferencing a null global pointer");
        let segments = self.segments.read();
        let segment = segments
            .get(&gptr.segment)
            .unwrap_or_else(|| panic!("unknown segment {}", gptr.segment));
        debug_assert!(
            gptr.offset + len <= segment.bytes_per_unit,
            "access past the end of a unit's portion: {} + {} > {}",
            gptr.offset,
            len,
            segment.bytes_per_unit
        );
        let mem = segment
            .per_unit
            .get(&gptr.unit)
            .unwrap_or_else(|| panic!("unit {} holds no storage in segment {}", gptr.unit, gptr.segment));
        unsafe { mem.ptr.as_ptr().add(gptr.offset) }
    }
}

/// Create and register a new group; units attach by id.
pub(crate) fn create_group(num_units: usize) -> Arc<ShmemGroup> {
    let id = NEXT_GROUP_ID.fetch_add(1, Ordering::SeqCst);
    let group = Arc::new(ShmemGroup::new(id, num_units));
    GROUPS.lock().insert(id, group.clone());
    group
}

pub(crate) fn release_group(group: &Arc<ShmemGroup>) {
    GROUPS.lock().remove(&group.id);
}

/// One unit's endpoint into a shmem group.
#[derive(Debug)]
pub(crate) struct ShmemComm {
    my_unit: usize,
    group: Arc<ShmemGroup>,
}

impl std::fmt::Debug for ShmemGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ShmemGroup")
            .field("id", &self.id)
            .field("num_units", &self.num_units)
            .finish()
    }
}

impl ShmemComm {
    pub(crate) fn attach(group_id: usize, my_unit: usize) -> ShmemComm {
        let group = GROUPS
            .lock()
            .get(&group_id)
            .cloned()
            .unwrap_or_else(|| {
                panic!(
                    "shmem group {} does not exist, spawn units through spawn_units \
                     or create the group before attaching",
                    group_id
                )
            });
        assert!(
            my_unit < group.num_units,
            "unit {} out of range for group of {}",
            my_unit,
            group.num_units
        );
        ShmemComm { my_unit, group }
    }

    pub(crate) fn from_group(group: Arc<ShmemGroup>, my_unit: usize) -> ShmemComm {
        ShmemComm { my_unit, group }
    }
}

impl CommOps for ShmemComm {
    fn my_unit(&self) -> usize {
        self.my_unit
    }

    fn num_units(&self) -> usize {
        self.group.num_units
    }

    fn backend(&self) -> Backend {
        Backend::Shmem
    }

    fn barrier(&self, team: &TeamHandle) {
        trace!(unit = self.my_unit, team = team.id, "barrier");
        self.group.collective(team, |_, _| {}, |_| {}, |_| ());
    }

    fn team_alloc(&self, team: &TeamHandle, bytes: usize, align: usize) -> AllocResult<RawGptr> {
        trace!(unit = self.my_unit, team = team.id, bytes, "team_alloc");
        let group = &self.group;
        let result = group.collective(
            team,
            |st, first| {
                if first {
                    if group.heap_used.load(Ordering::SeqCst) + bytes > config().segment_size {
                        st.out = Some(Err(AllocError::OutOfMemoryError(bytes)));
                        return;
                    }
                    let id = group.next_segment.fetch_add(1, Ordering::SeqCst);
                    let mut per_unit = HashMap::new();
                    let mut failed = None;
                    for unit in team.units.iter() {
                        match UnitMem::new(bytes, align) {
                            Ok(mem) => {
                                per_unit.insert(*unit, mem);
                            }
                            Err(e) => {
                                failed = Some(e);
                                break;
                            }
                        }
                    }
                    st.out = Some(match failed {
                        Some(e) => Err(e),
                        None => {
                            group.heap_used.fetch_add(bytes, Ordering::SeqCst);
                            group.segments.write().insert(
                                id,
                                Segment {
                                    per_unit,
                                    bytes_per_unit: bytes,
                                    owners: team.size(),
                                    released: 0,
                                },
                            );
                            Ok(id)
                        }
                    });
                }
            },
            |_| {},
            |st| st.out.clone().unwrap(),
        );
        result.map(|segment| RawGptr::new(segment, team.global_unit(0), 0))
    }

    fn team_free(&self, team: &TeamHandle, segment: usize) {
        trace!(unit = self.my_unit, team = team.id, segment, "team_free");
        // refcounted rather than a rendezvous: the storage must survive
        // until the last participant releases it, but a releasing unit
        // must not block (a release during unwinding would deadlock)
        let mut segments = self.group.segments.write();
        if let Some(seg) = segments.get_mut(&segment) {
            seg.released += 1;
            if seg.released == seg.owners {
                self.group
                    .heap_used
                    .fetch_sub(seg.bytes_per_unit, Ordering::SeqCst);
                segments.remove(&segment);
            }
        }
    }

    fn local_addr(&self, gptr: RawGptr) -> *mut u8 {
        debug_assert_eq!(gptr.unit, self.my_unit);
        self.group.resolve(gptr, 0)
    }

    fn put_blocking_local(&self, gptr: RawGptr, src: &[u8]) {
        trace!(unit = self.my_unit, ?gptr, len = src.len(), "put");
        let dst = self.group.resolve(gptr, src.len());
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) };
    }

    fn get_blocking(&self, gptr: RawGptr, dst: &mut [u8]) {
        trace!(unit = self.my_unit, ?gptr, len = dst.len(), "get");
        let src = self.group.resolve(gptr, dst.len());
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

    fn flush(&self, gptr: RawGptr) {
        trace!(unit = self.my_unit, ?gptr, "flush");
        // transfers complete eagerly; publish them to other threads
        fence(Ordering::SeqCst);
    }

    fn allreduce(
        &self,
        team: &TeamHandle,
        dtype: DataType,
        op: NativeOp,
        src: &[u8],
        dst: &mut [u8],
    ) {
        trace!(unit = self.my_unit, team = team.id, ?dtype, ?op, "allreduce");
        self.allreduce_custom(team, src, dst, &|s, acc| combine_native(dtype, op, s, acc));
    }

    fn allreduce_custom(&self, team: &TeamHandle, src: &[u8], dst: &mut [u8], combine: &CombineFn<'_>) {
        debug_assert_eq!(src.len(), dst.len());
        self.group.collective(
            team,
            |st, first| {
                if first {
                    st.buf.clear();
                    st.buf.extend_from_slice(src);
                } else {
                    combine(src, &mut st.buf);
                }
            },
            |_| {},
            |st| dst.copy_from_slice(&st.buf),
        );
    }
}
