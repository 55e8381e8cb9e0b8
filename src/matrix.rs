//! Rank-R distributed matrices.

use crate::comm::{CommOps, Elem};
use crate::global_ref::{GlobalAsyncRef, GlobalRef};
use crate::memory::GlobalMem;
use crate::pattern::{Dist, Pattern, TeamSpec};
use crate::team::Team;

use std::sync::Arc;
use tracing::debug;

/// A logically-single R-dimensional array whose elements are physically
/// partitioned across the units of a team according to a [`Pattern`].
///
/// Construction and destruction are collective on the team; afterwards every
/// unit holds identical metadata. Element access yields [`GlobalRef`]s which
/// dispatch to local memory or one-sided transfers.
pub struct Matrix<T: Elem, const R: usize> {
    team: Arc<Team>,
    pattern: Pattern<R>,
    mem: GlobalMem<T>,
    my_pos: usize,
    local_len: usize,
}

impl<T: Elem, const R: usize> Matrix<T, R> {
    /// Collective constructor; blocks rows over the first dimension.
    pub fn new(team: Arc<Team>, extents: [usize; R]) -> Matrix<T, R> {
        let mut dist = [Dist::None; R];
        dist[0] = Dist::Blocked;
        Matrix::with_dist(team, extents, dist)
    }

    /// Collective constructor with a per-dimension distribution; the team
    /// grid is factorized over the distributed dimensions.
    pub fn with_dist(team: Arc<Team>, extents: [usize; R], dist: [Dist; R]) -> Matrix<T, R> {
        let teamspec = TeamSpec::balanced(&dist, team.size());
        Matrix::with_teamspec(team, extents, dist, teamspec)
    }

    /// Collective constructor with an explicit team grid.
    pub fn with_teamspec(
        team: Arc<Team>,
        extents: [usize; R],
        dist: [Dist; R],
        teamspec: TeamSpec<R>,
    ) -> Matrix<T, R> {
        assert_eq!(
            teamspec.size(),
            team.size(),
            "team grid must arrange exactly the team's units"
        );
        let my_pos = team
            .unit_id()
            .expect("constructing a container on a team this unit is not in");
        let pattern = Pattern::new(extents, dist, teamspec);
        let mem = GlobalMem::new(&team, pattern.max_local_size())
            .unwrap_or_else(|e| panic!("container allocation failed: {}", e));
        let local_len = pattern.local_size(my_pos);
        debug!(?extents, local_len, "constructed matrix");
        let mat = Matrix {
            team,
            pattern,
            mem,
            my_pos,
            local_len,
        };
        // every unit leaves construction with the segment in place
        mat.barrier();
        mat
    }

    pub fn team(&self) -> &Arc<Team> {
        &self.team
    }

    pub fn pattern(&self) -> &Pattern<R> {
        &self.pattern
    }

    pub fn extents(&self) -> [usize; R] {
        self.pattern.extents()
    }

    pub fn extent(&self, d: usize) -> usize {
        self.pattern.extent(d)
    }

    pub fn size(&self) -> usize {
        self.pattern.size()
    }

    /// Number of elements stored on the calling unit.
    pub fn local_size(&self) -> usize {
        self.local_len
    }

    pub fn barrier(&self) {
        self.team.barrier();
    }

    /// Reference to the element at `coords`.
    pub fn at(&self, coords: [usize; R]) -> GlobalRef<T> {
        let owner = self.pattern.unit_at(&coords);
        let offset = self.pattern.local_at(&coords);
        let gptr = self.mem.global_ptr(owner, offset);
        let lptr = if self.team.global_unit(owner) == self.team.comm().my_unit() {
            unsafe { self.mem.local_ptr().add(offset) }
        } else {
            std::ptr::null_mut()
        };
        GlobalRef::from_parts(gptr, lptr)
    }

    /// Write-only asynchronous reference to the element at `coords`.
    pub fn async_at(&self, coords: [usize; R]) -> GlobalAsyncRef<T> {
        let owner = self.pattern.unit_at(&coords);
        let offset = self.pattern.local_at(&coords);
        GlobalAsyncRef::new(self.mem.global_ptr(owner, offset))
    }

    /// Drain outstanding asynchronous stores to this container at every
    /// target unit.
    pub fn flush(&self) {
        for pos in 0..self.team.size() {
            self.team.comm().flush(self.mem.raw_at(pos, 0));
        }
    }

    /// Global iteration in canonical row-major order, independent of the
    /// distribution.
    pub fn iter(&self) -> GlobalIter<'_, T, R> {
        GlobalIter {
            mat: self,
            idx: 0,
            end: self.size(),
        }
    }

    /// The calling unit's local elements, in pattern storage order.
    pub fn local_as_slice(&self) -> &[T] {
        if self.local_len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.mem.local_ptr(), self.local_len) }
        }
    }

    /// Mutable view of the calling unit's local elements.
    ///
    /// # Safety
    /// The caller is responsible for separating its writes from other units'
    /// accesses with barriers or flushes; the runtime does not lock.
    pub unsafe fn local_as_mut_slice(&self) -> &mut [T] {
        if self.local_len == 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(self.mem.local_ptr(), self.local_len)
        }
    }

    /// Native pointer to the first local element.
    pub fn lbegin(&self) -> *mut T {
        self.mem.local_ptr()
    }

    /// Native pointer one past the last local element;
    /// `lend() - lbegin()` equals `local_size()`.
    pub fn lend(&self) -> *mut T {
        unsafe { self.mem.local_ptr().add(self.local_len) }
    }

    pub(crate) fn my_pos(&self) -> usize {
        self.my_pos
    }
}

/// Iterator over every element of a matrix in canonical order; dereferences
/// resolve through the pattern to local or remote references.
pub struct GlobalIter<'a, T: Elem, const R: usize> {
    mat: &'a Matrix<T, R>,
    idx: usize,
    end: usize,
}

impl<'a, T: Elem, const R: usize> Iterator for GlobalIter<'a, T, R> {
    type Item = GlobalRef<T>;

    fn next(&mut self) -> Option<GlobalRef<T>> {
        if self.idx < self.end {
            let coords = self.mat.pattern().coords(self.idx);
            self.idx += 1;
            Some(self.mat.at(coords))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.end - self.idx;
        (rem, Some(rem))
    }
}

impl<'a, T: Elem, const R: usize> ExactSizeIterator for GlobalIter<'a, T, R> {}
