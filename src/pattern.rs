//! Distribution patterns: the bijective mapping from global N-D coordinates
//! to (unit, local offset) pairs.
//!
//! A pattern is pure metadata. Every query is integer arithmetic over
//! immutable state; nothing here communicates or allocates.

use crate::view::ViewSpec;

pub mod metrics;

/// Per-dimension distribution of global indices over the units of one
/// team-grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dist {
    /// The dimension is not split.
    None,
    /// One contiguous block per unit, sized `ceil(extent / units)`.
    Blocked,
    /// Round-robin single elements.
    Cyclic,
    /// Round-robin blocks of `k` elements; a unit's elements are stored
    /// row-major over its local bounding box.
    BlockCyclic(usize),
    /// Like `BlockCyclic(k)` but each block is stored contiguously.
    Tile(usize),
}

impl Dist {
    fn is_tile(&self) -> bool {
        matches!(self, Dist::Tile(_))
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, Dist::Cyclic)
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    if a == 0 {
        0
    } else {
        (a - 1) / b + 1
    }
}

fn product(v: &[usize]) -> usize {
    v.iter().product()
}

pub(crate) fn linearize<const R: usize>(coords: &[usize; R], extents: &[usize; R]) -> usize {
    let mut acc = 0;
    for d in 0..R {
        debug_assert!(coords[d] < extents[d].max(1));
        acc = acc * extents[d] + coords[d];
    }
    acc
}

pub(crate) fn delinearize<const R: usize>(mut idx: usize, extents: &[usize; R]) -> [usize; R] {
    let mut coords = [0usize; R];
    for d in (0..R).rev() {
        let e = extents[d].max(1);
        coords[d] = idx % e;
        idx /= e;
    }
    debug_assert_eq!(idx, 0);
    coords
}

/// Arrangement of a team's units as an R-dimensional grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamSpec<const R: usize> {
    extents: [usize; R],
}

impl<const R: usize> TeamSpec<R> {
    pub fn new(extents: [usize; R]) -> TeamSpec<R> {
        assert!(
            extents.iter().all(|e| *e >= 1),
            "team grid extents must be at least 1"
        );
        TeamSpec { extents }
    }

    /// Spread `nunits` over the distributed dimensions of `dist`, largest
    /// prime factors onto the currently least loaded axis. Deterministic.
    pub fn balanced(dist: &[Dist; R], nunits: usize) -> TeamSpec<R> {
        assert!(nunits >= 1);
        let mut extents = [1usize; R];
        let split: Vec<usize> = (0..R).filter(|d| dist[*d] != Dist::None).collect();
        if split.is_empty() {
            assert!(
                nunits == 1,
                "no distributed dimension for a team of {} units",
                nunits
            );
            return TeamSpec { extents };
        }
        let mut factors = prime_factors(nunits);
        factors.sort_unstable_by(|a, b| b.cmp(a));
        for p in factors {
            let d = *split
                .iter()
                .min_by_key(|d| extents[**d])
                .expect("at least one distributed dimension");
            extents[d] *= p;
        }
        TeamSpec { extents }
    }

    pub fn extents(&self) -> [usize; R] {
        self.extents
    }

    pub fn extent(&self, d: usize) -> usize {
        self.extents[d]
    }

    pub fn size(&self) -> usize {
        product(&self.extents)
    }
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// Rank-R distribution pattern over a bounded rectangle of global indices.
///
/// The realized pattern is the per-dimension product of a closed set of
/// distribution shapes; every query dispatches by `match`, never through
/// a virtual call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern<const R: usize> {
    extents: [usize; R],
    dist: [Dist; R],
    team: [usize; R],
    blocksz: [usize; R],
    nblocks: [usize; R],
    nunits: usize,
    tiled: bool,
}

impl<const R: usize> Pattern<R> {
    pub fn new(extents: [usize; R], dist: [Dist; R], teamspec: TeamSpec<R>) -> Pattern<R> {
        assert!(R >= 1, "patterns are at least rank 1");
        let team = teamspec.extents();
        let mut blocksz = [0usize; R];
        let mut nblocks = [0usize; R];
        for d in 0..R {
            match dist[d] {
                Dist::None => assert!(
                    team[d] == 1,
                    "dimension {} is not distributed but the team grid assigns {} units",
                    d,
                    team[d]
                ),
                Dist::BlockCyclic(k) | Dist::Tile(k) => {
                    assert!(k >= 1, "block size in dimension {} must be at least 1", d)
                }
                _ => {}
            }
            blocksz[d] = match dist[d] {
                Dist::None => extents[d].max(1),
                Dist::Blocked => div_ceil(extents[d], team[d]).max(1),
                Dist::Cyclic => 1,
                Dist::BlockCyclic(k) | Dist::Tile(k) => k,
            };
            nblocks[d] = div_ceil(extents[d], blocksz[d]);
        }
        Pattern {
            extents,
            dist,
            team,
            blocksz,
            nblocks,
            nunits: teamspec.size(),
            tiled: dist.iter().any(Dist::is_tile),
        }
    }

    pub fn extents(&self) -> [usize; R] {
        self.extents
    }

    pub fn extent(&self, d: usize) -> usize {
        self.extents[d]
    }

    pub fn size(&self) -> usize {
        product(&self.extents)
    }

    pub fn ndim(&self) -> usize {
        R
    }

    pub fn num_units(&self) -> usize {
        self.nunits
    }

    pub fn dist(&self, d: usize) -> Dist {
        self.dist[d]
    }

    pub fn team_extents(&self) -> [usize; R] {
        self.team
    }

    /// Per-dimension block extent (the trailing block may be smaller).
    pub fn blocksize(&self, d: usize) -> usize {
        self.blocksz[d]
    }

    /// Whether any dimension uses a cyclic (element round-robin) layout.
    pub fn has_cyclic_dim(&self) -> bool {
        self.dist.iter().any(Dist::is_cyclic)
    }

    /// Canonical row-major linearization of global coordinates.
    pub fn linear_at(&self, coords: &[usize; R]) -> usize {
        linearize(coords, &self.extents)
    }

    /// Inverse of [`linear_at`](Self::linear_at).
    pub fn coords(&self, linear: usize) -> [usize; R] {
        debug_assert!(linear < self.size());
        delinearize(linear, &self.extents)
    }

    fn assert_in_bounds(&self, coords: &[usize; R]) {
        for d in 0..R {
            debug_assert!(
                coords[d] < self.extents[d],
                "coordinate {} out of range in dimension {} (extent {})",
                coords[d],
                d,
                self.extents[d]
            );
        }
    }

    // ---- per-dimension shape queries -------------------------------------

    fn dim_unit_coord(&self, d: usize, i: usize) -> usize {
        match self.dist[d] {
            Dist::None => 0,
            Dist::Blocked => i / self.blocksz[d],
            Dist::Cyclic => i % self.team[d],
            Dist::BlockCyclic(_) | Dist::Tile(_) => (i / self.blocksz[d]) % self.team[d],
        }
    }

    /// Rank of global coordinate `i` within its owner's owned set of
    /// dimension `d`.
    fn dim_local_coord(&self, d: usize, i: usize) -> usize {
        let k = self.blocksz[d];
        match self.dist[d] {
            Dist::None => i,
            Dist::Blocked => i % k,
            Dist::Cyclic => i / self.team[d],
            Dist::BlockCyclic(_) | Dist::Tile(_) => (i / (k * self.team[d])) * k + i % k,
        }
    }

    /// Inverse of [`dim_local_coord`]: the global coordinate of local rank
    /// `l` on team-grid coordinate `u`.
    fn dim_global_coord(&self, d: usize, u: usize, l: usize) -> usize {
        let k = self.blocksz[d];
        match self.dist[d] {
            Dist::None => l,
            Dist::Blocked => u * k + l,
            Dist::Cyclic => l * self.team[d] + u,
            Dist::BlockCyclic(_) | Dist::Tile(_) => (l / k * self.team[d] + u) * k + l % k,
        }
    }

    /// Number of coordinates of dimension `d` owned by team-grid
    /// coordinate `u`.
    fn dim_local_extent(&self, d: usize, u: usize) -> usize {
        let e = self.extents[d];
        let k = self.blocksz[d];
        let nu = self.team[d];
        match self.dist[d] {
            Dist::None => e,
            Dist::Blocked => {
                if u * k >= e {
                    0
                } else {
                    (e - u * k).min(k)
                }
            }
            Dist::Cyclic => {
                if u < e {
                    (e - u - 1) / nu + 1
                } else {
                    0
                }
            }
            Dist::BlockCyclic(_) | Dist::Tile(_) => {
                let nb = self.nblocks[d];
                if nb == 0 {
                    return 0;
                }
                let nlb = nb / nu + usize::from(nb % nu > u);
                if nlb == 0 {
                    return 0;
                }
                let last_owner = (nb - 1) % nu;
                let last_extent = e - (nb - 1) * k;
                nlb * k - if last_owner == u { k - last_extent } else { 0 }
            }
        }
    }

    /// Number of blocks of dimension `d` owned by team-grid coordinate `u`.
    fn dim_local_blocks(&self, d: usize, u: usize) -> usize {
        let nu = self.team[d];
        match self.dist[d] {
            Dist::None | Dist::Blocked => usize::from(self.dim_local_extent(d, u) > 0),
            Dist::Cyclic => self.dim_local_extent(d, u),
            Dist::BlockCyclic(_) | Dist::Tile(_) => {
                let nb = self.nblocks[d];
                nb / nu + usize::from(nb % nu > u)
            }
        }
    }

    /// Extent of the local block with per-dimension local block index `c`
    /// on team-grid coordinate `u` (only the globally trailing block may be
    /// partial).
    fn dim_local_block_extent(&self, d: usize, u: usize, c: usize) -> usize {
        let g = self.dim_global_block(d, u, c);
        let off = g * self.blocksz[d];
        debug_assert!(off < self.extents[d].max(1));
        self.blocksz[d].min(self.extents[d] - off)
    }

    /// Global block index of a unit's `c`-th local block in dimension `d`.
    fn dim_global_block(&self, d: usize, u: usize, c: usize) -> usize {
        match self.dist[d] {
            Dist::None => 0,
            Dist::Blocked => u,
            Dist::Cyclic | Dist::BlockCyclic(_) | Dist::Tile(_) => c * self.team[d] + u,
        }
    }

    /// Count of owned coordinates of dimension `d` below `x` for team-grid
    /// coordinate `u`.
    pub(crate) fn dim_owned_before(&self, d: usize, u: usize, x: usize) -> usize {
        let x = x.min(self.extents[d]);
        let k = self.blocksz[d];
        let nu = self.team[d];
        match self.dist[d] {
            Dist::None => x,
            Dist::Blocked => {
                let lo = u * k;
                let hi = (lo + k).min(self.extents[d]).max(lo);
                x.clamp(lo, hi) - lo
            }
            Dist::Cyclic => {
                if x > u {
                    (x - u - 1) / nu + 1
                } else {
                    0
                }
            }
            Dist::BlockCyclic(_) | Dist::Tile(_) => {
                let period = nu * k;
                let full = x / period;
                let rem = x % period;
                full * k + rem.saturating_sub(u * k).min(k)
            }
        }
    }

    /// Count of owned coordinates of dimension `d` within `[lo, hi)`.
    pub(crate) fn dim_owned_in(&self, d: usize, u: usize, lo: usize, hi: usize) -> usize {
        self.dim_owned_before(d, u, hi) - self.dim_owned_before(d, u, lo)
    }

    /// Smallest owned coordinate of dimension `d` at or after `i`, if any.
    pub(crate) fn dim_next_owned(&self, d: usize, u: usize, i: usize) -> Option<usize> {
        let e = self.extents[d];
        let k = self.blocksz[d];
        let nu = self.team[d];
        let c = match self.dist[d] {
            Dist::None => i,
            Dist::Blocked => {
                let lo = u * k;
                if i < lo {
                    lo
                } else if i < lo + k {
                    i
                } else {
                    return None;
                }
            }
            Dist::Cyclic => {
                let r = i % nu;
                i + (u + nu - r) % nu
            }
            Dist::BlockCyclic(_) | Dist::Tile(_) => {
                let period = nu * k;
                let pos = i % period;
                let base = i - pos;
                if pos < u * k {
                    base + u * k
                } else if pos < u * k + k {
                    i
                } else {
                    base + period + u * k
                }
            }
        };
        if c < e {
            Some(c)
        } else {
            None
        }
    }

    // ---- whole-pattern queries -------------------------------------------

    /// The unit owning the element at `coords`, as a team-relative id
    /// (row-major over the team grid).
    pub fn unit_at(&self, coords: &[usize; R]) -> usize {
        self.assert_in_bounds(coords);
        let mut acc = 0;
        for d in 0..R {
            acc = acc * self.team[d] + self.dim_unit_coord(d, coords[d]);
        }
        acc
    }

    /// Team-grid coordinates of a team-relative unit id.
    pub fn team_coords(&self, unit: usize) -> [usize; R] {
        debug_assert!(unit < self.nunits);
        delinearize(unit, &self.team)
    }

    /// Position of the element at `coords` within its owner's local storage.
    pub fn local_at(&self, coords: &[usize; R]) -> usize {
        self.assert_in_bounds(coords);
        let mut u = [0usize; R];
        for d in 0..R {
            u[d] = self.dim_unit_coord(d, coords[d]);
        }
        if !self.tiled {
            let mut ext = [0usize; R];
            let mut loc = [0usize; R];
            for d in 0..R {
                ext[d] = self.dim_local_extent(d, u[d]);
                loc[d] = self.dim_local_coord(d, coords[d]);
            }
            linearize(&loc, &ext)
        } else {
            // block-contiguous layout: all complete local blocks preceding
            // the element's block, then the row-major in-block offset
            let mut before = 0;
            let mut prefix = 1; // product of block extents over chosen dims
            let mut tail = 1; // product of full local extents over trailing dims
            for d in 0..R {
                tail *= self.dim_local_extent(d, u[d]);
            }
            let mut v = [0usize; R];
            let mut o = [0usize; R];
            for d in 0..R {
                let k = self.blocksz[d];
                let c = self.dim_local_coord(d, coords[d]) / k;
                v[d] = self.dim_local_block_extent(d, u[d], c);
                o[d] = coords[d] % k;
                tail /= self.dim_local_extent(d, u[d]).max(1);
                before += prefix * (c * k) * tail;
                prefix *= v[d];
            }
            before + linearize(&o, &v)
        }
    }

    /// Inverse mapping: the global coordinates of `local_offset` within
    /// `unit`'s local storage.
    pub fn global_at(&self, unit: usize, local_offset: usize) -> [usize; R] {
        debug_assert!(unit < self.nunits);
        debug_assert!(local_offset < self.local_size(unit));
        let u = self.team_coords(unit);
        if !self.tiled {
            let mut ext = [0usize; R];
            for d in 0..R {
                ext[d] = self.dim_local_extent(d, u[d]);
            }
            let loc = delinearize(local_offset, &ext);
            let mut coords = [0usize; R];
            for d in 0..R {
                coords[d] = self.dim_global_coord(d, u[d], loc[d]);
            }
            coords
        } else {
            let mut tail = 1;
            for d in 0..R {
                tail *= self.dim_local_extent(d, u[d]);
            }
            let mut rem = local_offset;
            let mut prefix = 1;
            let mut c = [0usize; R];
            let mut v = [0usize; R];
            for d in 0..R {
                let k = self.blocksz[d];
                tail /= self.dim_local_extent(d, u[d]).max(1);
                let divisor = prefix * k * tail;
                let nlb = self.dim_local_blocks(d, u[d]);
                let mut cd = if divisor > 0 { rem / divisor } else { 0 };
                if cd >= nlb {
                    cd = nlb.saturating_sub(1);
                }
                rem -= prefix * (cd * k) * tail;
                c[d] = cd;
                v[d] = self.dim_local_block_extent(d, u[d], cd);
                prefix *= v[d];
            }
            let o = delinearize(rem, &v);
            let mut coords = [0usize; R];
            for d in 0..R {
                coords[d] = self.dim_global_block(d, u[d], c[d]) * self.blocksz[d] + o[d];
            }
            coords
        }
    }

    /// Per-dimension number of blocks.
    pub fn blockspec(&self) -> [usize; R] {
        self.nblocks
    }

    /// Offsets and extents of global block `bi` (row-major block index).
    pub fn block(&self, bi: usize) -> ViewSpec<R> {
        debug_assert!(bi < product(&self.nblocks));
        let b = delinearize(bi, &self.nblocks);
        let mut offsets = [0usize; R];
        let mut extents = [0usize; R];
        for d in 0..R {
            offsets[d] = b[d] * self.blocksz[d];
            extents[d] = self.blocksz[d].min(self.extents[d] - offsets[d]);
        }
        ViewSpec::new(offsets, extents)
    }

    /// Per-dimension number of blocks owned by `unit`.
    pub fn local_blockspec(&self, unit: usize) -> [usize; R] {
        debug_assert!(unit < self.nunits);
        let u = self.team_coords(unit);
        let mut spec = [0usize; R];
        for d in 0..R {
            spec[d] = self.dim_local_blocks(d, u[d]);
        }
        spec
    }

    /// Offsets and extents (in global coordinates) of `unit`'s `lbi`-th
    /// local block, row-major over [`local_blockspec`](Self::local_blockspec).
    pub fn local_block(&self, unit: usize, lbi: usize) -> ViewSpec<R> {
        let u = self.team_coords(unit);
        let spec = self.local_blockspec(unit);
        debug_assert!(lbi < product(&spec));
        let c = delinearize(lbi, &spec);
        let mut offsets = [0usize; R];
        let mut extents = [0usize; R];
        for d in 0..R {
            offsets[d] = self.dim_global_block(d, u[d], c[d]) * self.blocksz[d];
            extents[d] = self.blocksz[d].min(self.extents[d] - offsets[d]);
        }
        ViewSpec::new(offsets, extents)
    }

    /// Per-dimension count of elements owned by `unit` (its local bounding
    /// box).
    pub fn local_extents(&self, unit: usize) -> [usize; R] {
        debug_assert!(unit < self.nunits);
        let u = self.team_coords(unit);
        let mut ext = [0usize; R];
        for d in 0..R {
            ext[d] = self.dim_local_extent(d, u[d]);
        }
        ext
    }

    /// Number of elements owned by `unit`.
    pub fn local_size(&self, unit: usize) -> usize {
        product(&self.local_extents(unit))
    }

    /// Largest local size over all units; the symmetric segment capacity.
    pub fn max_local_size(&self) -> usize {
        (0..self.nunits)
            .map(|u| self.local_size(u))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn check_bijective<const R: usize>(pat: &Pattern<R>) {
        let nunits = pat.num_units();
        let mut seen: Vec<Vec<bool>> = (0..nunits)
            .map(|u| vec![false; pat.local_size(u)])
            .collect();
        for linear in 0..pat.size() {
            let coords = pat.coords(linear);
            assert_eq!(pat.linear_at(&coords), linear);
            let unit = pat.unit_at(&coords);
            assert!(unit < nunits);
            let off = pat.local_at(&coords);
            assert!(
                off < pat.local_size(unit),
                "offset {} past local size {} for {:?} on unit {}",
                off,
                pat.local_size(unit),
                coords,
                unit
            );
            assert!(
                !seen[unit][off],
                "offset {} on unit {} hit twice (coords {:?})",
                off, unit, coords
            );
            seen[unit][off] = true;
            assert_eq!(pat.global_at(unit, off), coords, "inverse mismatch");
        }
        for (unit, slots) in seen.iter().enumerate() {
            assert!(
                slots.iter().all(|s| *s),
                "unit {} has unmapped local storage",
                unit
            );
        }
    }

    fn dist_cases(k: usize) -> Vec<Dist> {
        vec![
            Dist::Blocked,
            Dist::Cyclic,
            Dist::BlockCyclic(k),
            Dist::Tile(k),
        ]
    }

    #[test]
    fn bijective_1d() {
        for nunits in 1..=4 {
            for extent in [1, 2, 5, 7, 12, 13] {
                for k in [1, 2, 3] {
                    for dist in dist_cases(k) {
                        let pat = Pattern::new(
                            [extent],
                            [dist],
                            TeamSpec::balanced(&[dist], nunits),
                        );
                        check_bijective(&pat);
                    }
                }
            }
        }
    }

    #[test]
    fn bijective_2d() {
        for nunits in 1..=4 {
            for d0 in dist_cases(2) {
                for d1 in dist_cases(3) {
                    let dist = [d0, d1];
                    let pat = Pattern::new([7, 9], dist, TeamSpec::balanced(&dist, nunits));
                    check_bijective(&pat);
                }
            }
            // one undistributed dimension
            let dist = [Dist::None, Dist::Blocked];
            let pat = Pattern::new([5, 8], dist, TeamSpec::balanced(&dist, nunits));
            check_bijective(&pat);
        }
    }

    #[test]
    fn bijective_3d_sampled() {
        let mut rng = StdRng::seed_from_u64(0x7e55e7a);
        for _ in 0..40 {
            let dists = [
                *dist_cases(rng.gen_range(1..4)).choose(&mut rng).unwrap(),
                *dist_cases(rng.gen_range(1..4)).choose(&mut rng).unwrap(),
                *dist_cases(rng.gen_range(1..4)).choose(&mut rng).unwrap(),
            ];
            let extents = [
                rng.gen_range(1..8),
                rng.gen_range(1..8),
                rng.gen_range(1..8),
            ];
            let nunits = rng.gen_range(1..7);
            let pat = Pattern::new(extents, dists, TeamSpec::balanced(&dists, nunits));
            check_bijective(&pat);
        }
    }

    #[test]
    fn local_sizes_partition_the_domain() {
        let dist = [Dist::Tile(2), Dist::BlockCyclic(3)];
        let pat = Pattern::new([7, 11], dist, TeamSpec::balanced(&dist, 4));
        let total: usize = (0..pat.num_units()).map(|u| pat.local_size(u)).sum();
        assert_eq!(total, 77);
    }

    #[test]
    fn blocked_rows_ownership() {
        // two units, columns split in halves of 3
        let dist = [Dist::None, Dist::Blocked];
        let pat = Pattern::new([8, 6], dist, TeamSpec::balanced(&dist, 2));
        assert_eq!(pat.blocksize(1), 3);
        for i in 0..8 {
            for j in 0..6 {
                assert_eq!(pat.unit_at(&[i, j]), usize::from(j >= 3));
            }
        }
        assert_eq!(pat.local_extents(0), [8, 3]);
        assert_eq!(pat.local_extents(1), [8, 3]);
    }

    #[test]
    fn tile_uneven_trailing_block() {
        // 7 elements, tiles of 2, 2 units: unit 0 owns blocks {0, 2},
        // unit 1 owns {1, 3} and block 3 is the single trailing element
        let dist = [Dist::Tile(2)];
        let pat = Pattern::new([7], dist, TeamSpec::new([2]));
        assert_eq!(pat.blockspec(), [4]);
        assert_eq!(pat.local_size(0), 4);
        assert_eq!(pat.local_size(1), 3);
        assert_eq!(pat.local_blockspec(1), [2]);
        let last = pat.local_block(1, 1);
        assert_eq!(last.offsets(), [6]);
        assert_eq!(last.extents(), [1]);
        check_bijective(&pat);
    }

    #[test]
    fn tile_2d_block_contiguous_layout() {
        // single unit, 4x4 in 2x2 tiles: each tile occupies 4 consecutive
        // local slots
        let dist = [Dist::Tile(2), Dist::Tile(2)];
        let pat = Pattern::new([4, 4], dist, TeamSpec::new([1, 1]));
        assert_eq!(pat.local_at(&[0, 0]), 0);
        assert_eq!(pat.local_at(&[0, 1]), 1);
        assert_eq!(pat.local_at(&[1, 0]), 2);
        assert_eq!(pat.local_at(&[1, 1]), 3);
        assert_eq!(pat.local_at(&[0, 2]), 4);
        assert_eq!(pat.local_at(&[2, 0]), 8);
        assert_eq!(pat.local_at(&[3, 3]), 15);
        check_bijective(&pat);
    }

    #[test]
    fn local_blocks_partition_local_storage() {
        let dist = [Dist::Tile(2), Dist::BlockCyclic(2)];
        let pat = Pattern::new([6, 7], dist, TeamSpec::balanced(&dist, 4));
        for unit in 0..pat.num_units() {
            let spec = pat.local_blockspec(unit);
            let nlb: usize = spec.iter().product();
            let mut counted = 0;
            for lbi in 0..nlb {
                let block = pat.local_block(unit, lbi);
                for i in 0..block.extent(0) {
                    for j in 0..block.extent(1) {
                        let coords = [block.offset(0) + i, block.offset(1) + j];
                        assert_eq!(pat.unit_at(&coords), unit);
                        counted += 1;
                    }
                }
            }
            assert_eq!(counted, pat.local_size(unit));
        }
    }

    #[test]
    fn global_blocks_cover_domain() {
        let dist = [Dist::BlockCyclic(3), Dist::Blocked];
        let pat = Pattern::new([8, 5], dist, TeamSpec::balanced(&dist, 2));
        let nb: usize = pat.blockspec().iter().product();
        let mut covered = vec![false; pat.size()];
        for bi in 0..nb {
            let block = pat.block(bi);
            for i in 0..block.extent(0) {
                for j in 0..block.extent(1) {
                    let linear = pat.linear_at(&[block.offset(0) + i, block.offset(1) + j]);
                    assert!(!covered[linear]);
                    covered[linear] = true;
                }
            }
        }
        assert!(covered.iter().all(|c| *c));
    }

    #[test]
    fn owned_prefix_counts_match_enumeration() {
        let dist = [Dist::BlockCyclic(3)];
        let pat = Pattern::new([17], dist, TeamSpec::new([3]));
        for u in 0..3 {
            for x in 0..=17 {
                let expect = (0..x).filter(|i| pat.unit_at(&[*i]) == u).count();
                assert_eq!(pat.dim_owned_before(0, u, x), expect, "u={} x={}", u, x);
            }
            let mut i = 0;
            while let Some(next) = pat.dim_next_owned(0, u, i) {
                assert_eq!(pat.unit_at(&[next]), u);
                assert!(next >= i);
                for skipped in i..next {
                    assert_ne!(pat.unit_at(&[skipped]), u);
                }
                i = next + 1;
            }
            assert!((i..17).all(|j| pat.unit_at(&[j]) != u));
        }
    }

    #[test]
    fn balanced_teamspec_factorization() {
        let dist = [Dist::Blocked, Dist::Blocked];
        assert_eq!(TeamSpec::balanced(&dist, 4).extents(), [2, 2]);
        assert_eq!(TeamSpec::balanced(&dist, 6).extents(), [3, 2]);
        let rowwise = [Dist::None, Dist::Blocked];
        assert_eq!(TeamSpec::balanced(&rowwise, 4).extents(), [1, 4]);
    }
}
