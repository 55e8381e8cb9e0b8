//! The view algebra: lazy, non-owning slices of distributed containers.
//!
//! A view names a rectangular subset of an origin container's global index
//! domain. Views compose without copying data: [`View::sub`] narrows one
//! dimension, [`local`] restricts to the calling unit's elements, and
//! [`index`] exposes the named global linear indices. Iterating a view
//! resolves each index through the origin's pattern to a [`GlobalRef`].

use crate::comm::Elem;
use crate::global_ref::GlobalRef;
use crate::matrix::Matrix;
use crate::pattern::linearize;

use std::ops::Range;

/// Offsets and extents of a rectangular region of a global index domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSpec<const R: usize> {
    offsets: [usize; R],
    extents: [usize; R],
}

impl<const R: usize> ViewSpec<R> {
    pub fn new(offsets: [usize; R], extents: [usize; R]) -> ViewSpec<R> {
        ViewSpec { offsets, extents }
    }

    pub fn offsets(&self) -> [usize; R] {
        self.offsets
    }

    pub fn extents(&self) -> [usize; R] {
        self.extents
    }

    pub fn offset(&self, d: usize) -> usize {
        self.offsets[d]
    }

    pub fn extent(&self, d: usize) -> usize {
        self.extents[d]
    }

    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }
}

/// Anything that behaves as a rectangular view of an origin matrix: the
/// matrix itself (the identity view) or a [`NView`] produced by
/// [`View::sub`].
pub trait View<T: Elem, const R: usize> {
    fn view_origin(&self) -> &Matrix<T, R>;
    fn view_spec(&self) -> ViewSpec<R>;

    fn extents(&self) -> [usize; R] {
        self.view_spec().extents()
    }

    fn offsets(&self) -> [usize; R] {
        self.view_spec().offsets()
    }

    fn extent(&self, d: usize) -> usize {
        self.view_spec().extent(d)
    }

    fn offset(&self, d: usize) -> usize {
        self.view_spec().offset(d)
    }

    fn size(&self) -> usize {
        self.view_spec().size()
    }

    fn ndim(&self) -> usize {
        R
    }

    /// Narrow dimension `D` to the range `range` of this view's extent.
    ///
    /// Sub-views collapse into offsets and extents immediately, so
    /// narrowing different dimensions commutes.
    fn sub<const D: usize>(&self, range: Range<usize>) -> NView<'_, T, R>
    where
        Self: Sized,
    {
        debug_assert!(D < R, "dimension {} out of rank {}", D, R);
        let spec = self.view_spec();
        debug_assert!(
            range.start <= range.end && range.end <= spec.extent(D),
            "sub range {}..{} exceeds extent {} of dimension {}",
            range.start,
            range.end,
            spec.extent(D),
            D
        );
        let mut offsets = spec.offsets();
        let mut extents = spec.extents();
        offsets[D] += range.start;
        extents[D] = range.end - range.start;
        NView {
            origin: self.view_origin(),
            spec: ViewSpec::new(offsets, extents),
        }
    }
}

impl<T: Elem, const R: usize> View<T, R> for Matrix<T, R> {
    fn view_origin(&self) -> &Matrix<T, R> {
        self
    }

    fn view_spec(&self) -> ViewSpec<R> {
        ViewSpec::new([0; R], self.extents())
    }
}

/// A sub-view node: an origin and the rectangle of its domain it names.
///
/// Composition collapses eagerly into offsets and extents, so applying
/// `sub` in either dimension order produces identical views.
pub struct NView<'a, T: Elem, const R: usize> {
    origin: &'a Matrix<T, R>,
    spec: ViewSpec<R>,
}

impl<'a, T: Elem, const R: usize> View<T, R> for NView<'a, T, R> {
    fn view_origin(&self) -> &Matrix<T, R> {
        self.origin
    }

    fn view_spec(&self) -> ViewSpec<R> {
        self.spec
    }
}

impl<'a, T: Elem, const R: usize> NView<'a, T, R> {
    /// Iterate the view's elements in canonical order.
    pub fn iter(&self) -> ViewIter<'a, T, R> {
        ViewIter {
            origin: self.origin,
            spec: self.spec,
            cur: first_coords(&self.spec),
        }
    }
}

fn first_coords<const R: usize>(spec: &ViewSpec<R>) -> Option<[usize; R]> {
    if spec.extents().iter().any(|e| *e == 0) {
        None
    } else {
        Some(spec.offsets())
    }
}

/// The global linear indices (canonical order) a view names.
pub fn index<T: Elem, const R: usize, V: View<T, R>>(view: &V) -> IndexIter<R> {
    IndexIter {
        domain: view.view_origin().extents(),
        spec: view.view_spec(),
        cur: first_coords(&view.view_spec()),
    }
}

/// Restrict a view to the elements owned by the calling unit.
pub fn local<T: Elem, const R: usize, V: View<T, R>>(view: &V) -> LocalView<'_, T, R> {
    let origin = view.view_origin();
    let spec = view.view_spec();
    let pattern = origin.pattern();
    let ucoords = pattern.team_coords(origin.my_pos());
    let mut counts = [0usize; R];
    for d in 0..R {
        counts[d] = pattern.dim_owned_in(d, ucoords[d], spec.offset(d), spec.offset(d) + spec.extent(d));
    }
    LocalView {
        origin,
        spec,
        ucoords,
        counts,
        flat: pattern.has_cyclic_dim(),
    }
}

/// The calling unit's portion of a view.
///
/// For NONE/BLOCKED/BLOCKCYCLIC/TILE patterns the owned elements form a
/// rectangle in local coordinate space and [`extents`](LocalView::extents)
/// reports its per-dimension counts; any CYCLIC dimension flattens the
/// extents to a single local sequence. A view with no owned elements is
/// well-defined and empty.
pub struct LocalView<'a, T: Elem, const R: usize> {
    origin: &'a Matrix<T, R>,
    spec: ViewSpec<R>,
    ucoords: [usize; R],
    counts: [usize; R],
    flat: bool,
}

impl<'a, T: Elem, const R: usize> LocalView<'a, T, R> {
    /// Number of view elements owned by the calling unit.
    pub fn size(&self) -> usize {
        self.counts.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Per-dimension owned counts, flattened to one dimension under a
    /// cyclic layout.
    pub fn extents(&self) -> Vec<usize> {
        if self.flat {
            vec![self.size()]
        } else {
            self.counts.to_vec()
        }
    }

    pub fn ndim(&self) -> usize {
        if self.flat {
            1
        } else {
            R
        }
    }

    /// Iterate the owned elements in canonical order; every yielded
    /// reference is local.
    pub fn iter(&self) -> LocalViewIter<'a, T, R> {
        LocalViewIter {
            origin: self.origin,
            coords: LocalCoords::new(self.origin, self.spec, self.ucoords),
        }
    }

    /// The owned global linear indices in canonical order.
    pub fn indices(&self) -> LocalIndexIter<'a, T, R> {
        LocalIndexIter {
            origin: self.origin,
            coords: LocalCoords::new(self.origin, self.spec, self.ucoords),
        }
    }
}

/// Odometer over the coordinates a view names.
pub struct ViewIter<'a, T: Elem, const R: usize> {
    origin: &'a Matrix<T, R>,
    spec: ViewSpec<R>,
    cur: Option<[usize; R]>,
}

fn advance_rect<const R: usize>(spec: &ViewSpec<R>, coords: &mut [usize; R]) -> bool {
    for d in (0..R).rev() {
        coords[d] += 1;
        if coords[d] < spec.offset(d) + spec.extent(d) {
            return true;
        }
        coords[d] = spec.offset(d);
    }
    false
}

impl<'a, T: Elem, const R: usize> Iterator for ViewIter<'a, T, R> {
    type Item = GlobalRef<T>;

    fn next(&mut self) -> Option<GlobalRef<T>> {
        let coords = self.cur?;
        if !advance_rect(&self.spec, self.cur.as_mut().unwrap()) {
            self.cur = None;
        }
        Some(self.origin.at(coords))
    }
}

/// Canonical global linear indices of a rectangular view.
pub struct IndexIter<const R: usize> {
    domain: [usize; R],
    spec: ViewSpec<R>,
    cur: Option<[usize; R]>,
}

impl<const R: usize> Iterator for IndexIter<R> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let coords = self.cur?;
        if !advance_rect(&self.spec, self.cur.as_mut().unwrap()) {
            self.cur = None;
        }
        Some(linearize(&coords, &self.domain))
    }
}

/// Shared coordinate walk over the owned elements of a view: per dimension,
/// steps through the owned global coordinates inside the view rectangle.
struct LocalCoords<const R: usize> {
    dists: LocalDims<R>,
    firsts: [usize; R],
    cur: Option<[usize; R]>,
}

struct LocalDims<const R: usize> {
    hi: [usize; R],
    ucoords: [usize; R],
}

impl<const R: usize> LocalCoords<R> {
    fn new<T: Elem>(
        origin: &Matrix<T, R>,
        spec: ViewSpec<R>,
        ucoords: [usize; R],
    ) -> LocalCoords<R> {
        let pattern = origin.pattern();
        let mut hi = [0usize; R];
        let mut firsts = [0usize; R];
        let mut empty = false;
        for d in 0..R {
            let lo = spec.offset(d);
            hi[d] = lo + spec.extent(d);
            match pattern
                .dim_next_owned(d, ucoords[d], lo)
                .filter(|c| *c < hi[d])
            {
                Some(first) => firsts[d] = first,
                None => empty = true,
            }
        }
        LocalCoords {
            dists: LocalDims { hi, ucoords },
            firsts,
            cur: if empty { None } else { Some(firsts) },
        }
    }

    fn advance<T: Elem>(&mut self, origin: &Matrix<T, R>) -> Option<[usize; R]> {
        let coords = self.cur?;
        let pattern = origin.pattern();
        let cur = self.cur.as_mut().unwrap();
        let mut carried = true;
        for d in (0..R).rev() {
            let next = pattern
                .dim_next_owned(d, self.dists.ucoords[d], cur[d] + 1)
                .filter(|c| *c < self.dists.hi[d]);
            match next {
                Some(n) => {
                    cur[d] = n;
                    carried = false;
                    break;
                }
                None => cur[d] = self.firsts[d],
            }
        }
        if carried {
            self.cur = None;
        }
        Some(coords)
    }
}

/// Iterator over the calling unit's elements of a view.
pub struct LocalViewIter<'a, T: Elem, const R: usize> {
    origin: &'a Matrix<T, R>,
    coords: LocalCoords<R>,
}

impl<'a, T: Elem, const R: usize> Iterator for LocalViewIter<'a, T, R> {
    type Item = GlobalRef<T>;

    fn next(&mut self) -> Option<GlobalRef<T>> {
        let coords = self.coords.advance(self.origin)?;
        Some(self.origin.at(coords))
    }
}

/// Iterator over the global linear indices of the calling unit's elements
/// of a view.
pub struct LocalIndexIter<'a, T: Elem, const R: usize> {
    origin: &'a Matrix<T, R>,
    coords: LocalCoords<R>,
}

impl<'a, T: Elem, const R: usize> Iterator for LocalIndexIter<'a, T, R> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let coords = self.coords.advance(self.origin)?;
        Some(self.origin.pattern().linear_at(&coords))
    }
}
