//! Typed global pointers.
//!
//! A [`GlobalPtr`] names one element of one segment and supports arithmetic
//! along the segment's canonical flattening: advancing past the end of a
//! unit's portion carries into the next unit of the owning team.

use crate::comm::{Comm, CommOps, Elem, RawGptr, TeamHandle};

use std::marker::PhantomData;
use std::sync::Arc;

pub struct GlobalPtr<T: Elem> {
    raw: RawGptr,
    /// elements each unit contributes to the segment
    capacity: usize,
    team: TeamHandle,
    comm: Option<Arc<Comm>>,
    _marker: PhantomData<T>,
}

impl<T: Elem> GlobalPtr<T> {
    pub(crate) fn new(
        raw: RawGptr,
        capacity: usize,
        team: TeamHandle,
        comm: Arc<Comm>,
    ) -> GlobalPtr<T> {
        GlobalPtr {
            raw,
            capacity,
            team,
            comm: Some(comm),
            _marker: PhantomData,
        }
    }

    /// The distinguished null pointer.
    pub fn null() -> GlobalPtr<T> {
        GlobalPtr {
            raw: RawGptr::NULL,
            capacity: 0,
            team: TeamHandle::empty(),
            comm: None,
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    pub fn raw(&self) -> RawGptr {
        self.raw
    }

    pub(crate) fn comm(&self) -> &Arc<Comm> {
        self.comm
            .as_ref()
            .expect("dereferencing a null global pointer")
    }

    /// Whether the referenced element lives on the calling unit.
    pub fn is_local(&self) -> bool {
        match &self.comm {
            Some(comm) => self.raw.unit == comm.my_unit(),
            None => false,
        }
    }

    /// Native address of the referenced element, or null when remote.
    pub fn to_local(&self) -> *mut T {
        if self.is_local() {
            self.comm().local_addr(self.raw) as *mut T
        } else {
            std::ptr::null_mut()
        }
    }

    /// Rebind to a member at a fixed byte offset inside the element.
    pub(crate) fn inc_bytes(&mut self, bytes: usize) {
        self.raw.inc_offset(bytes);
    }

    /// Reinterpret as a pointer to a member type. The result supports no
    /// element arithmetic (its capacity is voided), only dereferencing.
    pub(crate) fn cast<M: Elem>(&self) -> GlobalPtr<M> {
        GlobalPtr {
            raw: self.raw,
            capacity: 0,
            team: self.team.clone(),
            comm: self.comm.clone(),
            _marker: PhantomData,
        }
    }

    /// Position in the segment's canonical flattening.
    fn flat(&self) -> usize {
        debug_assert!(!self.is_null());
        debug_assert!(self.capacity > 0, "pointer arithmetic in an empty segment");
        let pos = self
            .team
            .pos_of(self.raw.unit)
            .expect("pointer's unit is not part of the segment's team");
        pos * self.capacity + self.raw.offset / std::mem::size_of::<T>()
    }

    fn with_flat(&self, flat: usize) -> GlobalPtr<T> {
        let total = self.capacity * self.team.size();
        debug_assert!(flat <= total, "pointer arithmetic past the segment end");
        // the one-past-the-end pointer stays on the last unit
        let pos = (flat / self.capacity).min(self.team.size() - 1);
        let offset = (flat - pos * self.capacity) * std::mem::size_of::<T>();
        GlobalPtr {
            raw: RawGptr::new(self.raw.segment, self.team.global_unit(pos), offset),
            capacity: self.capacity,
            team: self.team.clone(),
            comm: self.comm.clone(),
            _marker: PhantomData,
        }
    }

    /// Advance by `n` elements in canonical order.
    pub fn add(&self, n: usize) -> GlobalPtr<T> {
        self.with_flat(self.flat() + n)
    }

    /// Step back by `n` elements in canonical order.
    pub fn sub(&self, n: usize) -> GlobalPtr<T> {
        self.with_flat(self.flat() - n)
    }

    /// Signed element distance from `other` to `self` within one segment.
    pub fn offset_from(&self, other: &GlobalPtr<T>) -> isize {
        debug_assert_eq!(self.raw.segment, other.raw.segment);
        self.flat() as isize - other.flat() as isize
    }
}

impl<T: Elem> Clone for GlobalPtr<T> {
    fn clone(&self) -> Self {
        GlobalPtr {
            raw: self.raw,
            capacity: self.capacity,
            team: self.team.clone(),
            comm: self.comm.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Elem> PartialEq for GlobalPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: Elem> Eq for GlobalPtr<T> {}

impl<T: Elem> std::fmt::Debug for GlobalPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "GlobalPtr(null)")
        } else {
            write!(
                f,
                "GlobalPtr(segment {}, unit {}, offset {})",
                self.raw.segment, self.raw.unit, self.raw.offset
            )
        }
    }
}

impl<T: Elem> std::ops::Add<usize> for GlobalPtr<T> {
    type Output = GlobalPtr<T>;
    fn add(self, n: usize) -> GlobalPtr<T> {
        GlobalPtr::add(&self, n)
    }
}

impl<T: Elem> std::ops::Sub<usize> for GlobalPtr<T> {
    type Output = GlobalPtr<T>;
    fn sub(self, n: usize) -> GlobalPtr<T> {
        GlobalPtr::sub(&self, n)
    }
}
