//! World construction: the entry point that brings up a comm backend and
//! the root team.

use crate::comm::{create_comm, shmem, Backend, Comm, CommOps};
use crate::team::Team;

use std::sync::Arc;
use tracing::debug;

/// Builder for a [`World`]; the backend defaults to the `TESSERA_BACKEND`
/// environment configuration.
pub struct WorldBuilder {
    backend: Backend,
}

impl WorldBuilder {
    pub fn new() -> WorldBuilder {
        WorldBuilder {
            backend: Default::default(),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> WorldBuilder {
        self.backend = backend;
        self
    }

    pub fn build(self) -> World {
        World::from_comm(create_comm(self.backend))
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        WorldBuilder::new()
    }
}

/// One unit's handle on the runtime: the comm endpoint plus the root team
/// spanning every unit.
pub struct World {
    comm: Arc<Comm>,
    team: Arc<Team>,
}

impl World {
    fn from_comm(comm: Arc<Comm>) -> World {
        let team = Team::root(comm.clone());
        debug!(
            unit = comm.my_unit(),
            units = comm.num_units(),
            backend = ?comm.backend(),
            "world up"
        );
        World { comm, team }
    }

    /// This unit's global id.
    pub fn my_unit(&self) -> usize {
        self.comm.my_unit()
    }

    pub fn num_units(&self) -> usize {
        self.comm.num_units()
    }

    pub fn backend(&self) -> Backend {
        self.comm.backend()
    }

    /// The root team containing all units.
    pub fn team(&self) -> Arc<Team> {
        self.team.clone()
    }

    pub fn barrier(&self) {
        self.team.barrier();
    }
}

/// Run an SPMD closure on `num_units` units of a fresh shmem group, one
/// thread per unit, and collect their results in unit order.
///
/// This is the development harness for multi-unit execution within a single
/// process; distributed fabrics attach through their own backends.
pub fn spawn_units<F, R>(num_units: usize, f: F) -> Vec<R>
where
    F: Fn(World) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    assert!(num_units >= 1);
    let group = shmem::create_group(num_units);
    let f = Arc::new(f);
    let mut handles = Vec::with_capacity(num_units);
    for unit in 0..num_units {
        let group = group.clone();
        let f = f.clone();
        handles.push(
            std::thread::Builder::new()
                .name(format!("unit-{}", unit))
                .spawn(move || {
                    let comm = Arc::new(Comm::Shmem(shmem::ShmemComm::from_group(group, unit)));
                    f(World::from_comm(comm))
                })
                .expect("failed to spawn unit thread"),
        );
    }
    let results: Vec<R> = handles
        .into_iter()
        .map(|h| match h.join() {
            Ok(r) => r,
            Err(panic) => {
                shmem::release_group(&group);
                std::panic::resume_unwind(panic);
            }
        })
        .collect();
    shmem::release_group(&group);
    results
}
