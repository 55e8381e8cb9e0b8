//! Symmetric global memory segments backing the distributed containers.

use crate::comm::{AllocResult, Comm, CommOps, Elem, RawGptr, TeamHandle};
use crate::global_ptr::GlobalPtr;
use crate::team::Team;

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Owner of one symmetric segment: every unit of the team contributes
/// `capacity` elements of local storage. Construction and destruction are
/// collective on the team.
pub(crate) struct GlobalMem<T: Elem> {
    segment: usize,
    capacity: usize,
    handle: TeamHandle,
    comm: Arc<Comm>,
    local: *mut T,
    _marker: PhantomData<T>,
}

unsafe impl<T: Elem> Send for GlobalMem<T> {}
unsafe impl<T: Elem> Sync for GlobalMem<T> {}

impl<T: Elem> GlobalMem<T> {
    /// Collective allocation of `capacity` elements per unit.
    pub(crate) fn new(team: &Team, capacity: usize) -> AllocResult<GlobalMem<T>> {
        let comm = team.comm().clone();
        let handle = team.handle().clone();
        let base = comm.team_alloc(
            &handle,
            capacity * std::mem::size_of::<T>(),
            std::mem::align_of::<T>(),
        )?;
        let local = if capacity > 0 && handle.my_pos.is_some() {
            let mut mine = base;
            mine.set_unit(comm.my_unit());
            mine.set_offset(0);
            comm.local_addr(mine) as *mut T
        } else {
            std::ptr::null_mut()
        };
        debug!(
            segment = base.segment,
            capacity,
            team = handle.id,
            "allocated global memory"
        );
        Ok(GlobalMem {
            segment: base.segment,
            capacity,
            handle,
            comm,
            local,
            _marker: PhantomData,
        })
    }

    /// Raw pointer to element `offset` of the unit at team position `pos`.
    pub(crate) fn raw_at(&self, pos: usize, offset: usize) -> RawGptr {
        debug_assert!(offset <= self.capacity);
        RawGptr::new(
            self.segment,
            self.handle.global_unit(pos),
            offset * std::mem::size_of::<T>(),
        )
    }

    /// Typed pointer to element `offset` of the unit at team position `pos`.
    pub(crate) fn global_ptr(&self, pos: usize, offset: usize) -> GlobalPtr<T> {
        GlobalPtr::new(
            self.raw_at(pos, offset),
            self.capacity,
            self.handle.clone(),
            self.comm.clone(),
        )
    }

    /// Native pointer to the calling unit's local portion.
    pub(crate) fn local_ptr(&self) -> *mut T {
        self.local
    }
}

impl<T: Elem> Drop for GlobalMem<T> {
    fn drop(&mut self) {
        debug!(segment = self.segment, "releasing global memory");
        self.comm.team_free(&self.handle, self.segment);
    }
}
