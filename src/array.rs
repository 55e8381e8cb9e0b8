//! Rank-1 distributed arrays.

use crate::comm::Elem;
use crate::global_ref::{GlobalAsyncRef, GlobalRef};
use crate::matrix::{GlobalIter, Matrix};
use crate::pattern::{Dist, Pattern};
use crate::team::Team;

use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// A logically-single sequence partitioned across the units of a team.
///
/// `Array<T>` is the rank-1 container; its view and pattern machinery is
/// shared with [`Matrix`].
pub struct Array<T: Elem> {
    inner: Matrix<T, 1>,
}

impl<T: Elem> Array<T> {
    /// Collective constructor; elements are distributed in contiguous
    /// blocks.
    pub fn new(team: Arc<Team>, size: usize) -> Array<T> {
        Array::with_dist(team, size, Dist::Blocked)
    }

    /// Collective constructor with an explicit distribution.
    pub fn with_dist(team: Arc<Team>, size: usize, dist: Dist) -> Array<T> {
        Array {
            inner: Matrix::with_dist(team, [size], [dist]),
        }
    }

    pub fn team(&self) -> &Arc<Team> {
        self.inner.team()
    }

    pub fn pattern(&self) -> &Pattern<1> {
        self.inner.pattern()
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn local_size(&self) -> usize {
        self.inner.local_size()
    }

    pub fn barrier(&self) {
        self.inner.barrier();
    }

    /// Reference to element `i`.
    pub fn at(&self, i: usize) -> GlobalRef<T> {
        self.inner.at([i])
    }

    /// Write-only asynchronous reference to element `i`.
    pub fn async_at(&self, i: usize) -> GlobalAsyncRef<T> {
        self.inner.async_at([i])
    }

    /// Drain outstanding asynchronous stores at every target unit.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Global iteration in index order.
    pub fn iter(&self) -> GlobalIter<'_, T, 1> {
        self.inner.iter()
    }

    pub fn local_as_slice(&self) -> &[T] {
        self.inner.local_as_slice()
    }

    /// Mutable view of the calling unit's local elements.
    ///
    /// # Safety
    /// See [`Matrix::local_as_mut_slice`].
    pub unsafe fn local_as_mut_slice(&self) -> &mut [T] {
        self.inner.local_as_mut_slice()
    }

    pub fn lbegin(&self) -> *mut T {
        self.inner.lbegin()
    }

    pub fn lend(&self) -> *mut T {
        self.inner.lend()
    }

    /// The rank-1 container as a matrix, the entry point into the view
    /// algebra.
    pub fn as_matrix(&self) -> &Matrix<T, 1> {
        &self.inner
    }

    /// A global index range of this array, consumed by the collective
    /// algorithms.
    pub fn range<B: RangeBounds<usize>>(&self, bounds: B) -> GlobalRange<'_, T> {
        let start = match bounds.start_bound() {
            Bound::Included(i) => *i,
            Bound::Excluded(i) => *i + 1,
            Bound::Unbounded => 0,
        };
        let end = match bounds.end_bound() {
            Bound::Included(i) => *i + 1,
            Bound::Excluded(i) => *i,
            Bound::Unbounded => self.size(),
        };
        debug_assert!(start <= end && end <= self.size());
        GlobalRange {
            array: self,
            start,
            end,
        }
    }
}

/// A `[start, end)` slice of an array's global index space.
pub struct GlobalRange<'a, T: Elem> {
    pub(crate) array: &'a Array<T>,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl<'a, T: Elem> GlobalRange<'a, T> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
