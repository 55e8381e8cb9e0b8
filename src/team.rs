//! Teams: immutable ordered sets of units with collective primitives.
//!
//! Lifetimes nest: a sub-team borrows nothing from its parent but must be
//! destructed before it (destruction is collective in program order). The
//! root team spans every unit of the world.

use crate::comm::{Comm, CommOps, TeamHandle};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Invalid unit selection while constructing a sub-team.
#[derive(Debug, Clone, Copy)]
pub struct IdError {
    pub unit: usize,
    pub team_size: usize,
}

impl std::fmt::Display for IdError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "unit {} does not exist in a team of {} units",
            self.unit, self.team_size
        )
    }
}

impl std::error::Error for IdError {}

/// Selects which members of a parent team form a sub-team.
pub trait TeamArch {
    /// Team-relative positions of the selected units, in sub-team order.
    fn select(&self, parent_size: usize) -> Result<Vec<usize>, IdError>;
}

/// A contiguous range of the parent's units: `[start, start + num)`.
#[derive(Debug, Clone, Copy)]
pub struct BlockedArch {
    start: usize,
    num: usize,
}

impl BlockedArch {
    pub fn new(start: usize, num: usize) -> BlockedArch {
        BlockedArch { start, num }
    }
}

impl TeamArch for BlockedArch {
    fn select(&self, parent_size: usize) -> Result<Vec<usize>, IdError> {
        let end = self.start + self.num;
        if end > parent_size || self.num == 0 {
            return Err(IdError {
                unit: end.saturating_sub(1),
                team_size: parent_size,
            });
        }
        Ok((self.start..end).collect())
    }
}

/// Every `stride`-th of the parent's units starting at `start`.
#[derive(Debug, Clone, Copy)]
pub struct StridedArch {
    start: usize,
    stride: usize,
    num: usize,
}

impl StridedArch {
    pub fn new(start: usize, stride: usize, num: usize) -> StridedArch {
        assert!(stride >= 1, "stride must be at least 1");
        StridedArch { start, stride, num }
    }
}

impl TeamArch for StridedArch {
    fn select(&self, parent_size: usize) -> Result<Vec<usize>, IdError> {
        if self.num == 0 {
            return Err(IdError {
                unit: self.start,
                team_size: parent_size,
            });
        }
        let last = self.start + (self.num - 1) * self.stride;
        if last >= parent_size {
            return Err(IdError {
                unit: last,
                team_size: parent_size,
            });
        }
        Ok((0..self.num).map(|i| self.start + i * self.stride).collect())
    }
}

/// Immutable ordered set of units with a barrier.
pub struct Team {
    handle: TeamHandle,
    comm: Arc<Comm>,
    parent: Option<Arc<Team>>,
    next_child: AtomicU64,
}

impl Team {
    /// The root team over every unit of the world.
    pub(crate) fn root(comm: Arc<Comm>) -> Arc<Team> {
        let units: Vec<usize> = (0..comm.num_units()).collect();
        let handle = TeamHandle::new(0, units, comm.my_unit());
        Arc::new(Team {
            handle,
            comm,
            parent: None,
            next_child: AtomicU64::new(0),
        })
    }

    /// Number of units in this team.
    pub fn size(&self) -> usize {
        self.handle.size()
    }

    /// This unit's position within the team, `None` for non-members.
    pub fn unit_id(&self) -> Option<usize> {
        self.handle.my_pos
    }

    /// This unit's global id.
    pub fn global_unit_id(&self) -> usize {
        self.comm.my_unit()
    }

    /// Global unit ids in team order.
    pub fn units(&self) -> &[usize] {
        &self.handle.units
    }

    /// Global id of the unit at team position `pos`.
    pub fn global_unit(&self, pos: usize) -> usize {
        self.handle.global_unit(pos)
    }

    pub fn is_member(&self) -> bool {
        self.handle.my_pos.is_some()
    }

    pub fn parent(&self) -> Option<&Arc<Team>> {
        self.parent.as_ref()
    }

    /// Collective synchronization across the team's members; also publishes
    /// all prior writes.
    pub fn barrier(&self) {
        debug_assert!(self.is_member(), "barrier on a team this unit is not in");
        self.comm.barrier(&self.handle);
    }

    /// Collectively split off a sub-team described by `arch`. Every member
    /// of the parent participates; units outside the selection receive a
    /// team they are not a member of.
    pub fn sub_team(self: &Arc<Team>, arch: &dyn TeamArch) -> Result<Arc<Team>, IdError> {
        let positions = arch.select(self.size())?;
        let units: Vec<usize> = positions
            .iter()
            .map(|pos| self.handle.global_unit(*pos))
            .collect();
        // all members create children in the same program order, so the
        // sequence number (and with it the id) agrees without communication
        let seq = self.next_child.fetch_add(1, Ordering::SeqCst);
        let id = child_team_id(self.handle.id, seq);
        debug!(parent = self.handle.id, id, ?units, "creating sub-team");
        let handle = TeamHandle::new(id, units, self.comm.my_unit());
        let child = Arc::new(Team {
            handle,
            comm: self.comm.clone(),
            parent: Some(self.clone()),
            next_child: AtomicU64::new(0),
        });
        // participation is collective on the parent in program order
        self.barrier();
        Ok(child)
    }

    pub(crate) fn handle(&self) -> &TeamHandle {
        &self.handle
    }

    pub(crate) fn comm(&self) -> &Arc<Comm> {
        &self.comm
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("id", &self.handle.id)
            .field("units", &self.handle.units)
            .finish()
    }
}

/// FNV-style mix of (parent id, creation sequence); collision-free in
/// practice for the shallow team trees real programs build.
fn child_team_id(parent: u64, seq: u64) -> u64 {
    let mut h = parent ^ 0xcbf2_9ce4_8422_2325;
    h = h.wrapping_mul(0x1000_0000_01b3);
    h ^= seq + 1;
    h.wrapping_mul(0x1000_0000_01b3)
}
