//! Tessera is a PGAS (partitioned global address space) container library:
//! a fixed collective team of units cooperatively allocates logically-single
//! arrays and matrices whose elements are physically partitioned across the
//! units of the team.
//!
//! The library exposes three tightly-coupled subsystems:
//!
//! * **Distribution patterns** ([`Pattern`]) map multi-dimensional global
//!   coordinates to (unit, local offset) pairs and back, for blocked,
//!   cyclic, block-cyclic and tiled layouts composed per dimension.
//! * **The view algebra** ([`view`]) builds lazy, non-owning slices —
//!   [`sub`](view::View::sub), [`local`](view::local),
//!   [`index`](view::index) — whose iterators resolve through the pattern
//!   without copying data.
//! * **Global memory access** ([`GlobalRef`], [`GlobalAsyncRef`],
//!   [`GlobalRefFuture`]) turns a (unit, offset) pair into a direct load or
//!   store when the referent is local and a one-sided transfer otherwise.
//!
//! Data is transfered by a pluggable one-sided comm backend; the in-tree
//! backends are `local` (single unit) and `shmem` (units as threads of one
//! process group, the development harness behind [`spawn_units`]).
//!
//! # Creating and using a distributed array
//!
//! ```no_run
//! use tessera::{spawn_units, Array};
//! use tessera::algorithm::{accumulate, Plus};
//!
//! spawn_units(4, |world| {
//!     let arr = Array::<u64>::new(world.team(), 100);
//!     // every unit initializes its own portion
//!     let base = world.my_unit() as u64;
//!     for (i, elem) in unsafe { arr.local_as_mut_slice() }.iter_mut().enumerate() {
//!         *elem = base + i as u64;
//!     }
//!     arr.barrier();
//!     // collective reduction over the whole array
//!     let total = accumulate(arr.range(..), 0u64, Plus);
//!     println!("unit {} sees total {}", world.my_unit(), total);
//! });
//! ```
//!
//! # Slicing a matrix with views
//!
//! ```no_run
//! use tessera::{spawn_units, Dist, Matrix};
//! use tessera::view::{local, View};
//!
//! spawn_units(2, |world| {
//!     let mat = Matrix::<f64, 2>::with_dist(
//!         world.team(),
//!         [8, 6],
//!         [Dist::None, Dist::Blocked],
//!     );
//!     let rows = mat.sub::<0>(1..3);
//!     assert_eq!(rows.extents(), [2, 6]);
//!     for elem in local(&rows).iter() {
//!         // every reference is local on this unit
//!         let _ = elem.load();
//!     }
//! });
//! ```

#[macro_use]
extern crate lazy_static;

#[doc(hidden)]
pub use memoffset;
#[doc(hidden)]
pub use tracing;

pub mod algorithm;
mod array;
mod comm;
mod env_var;
mod future;
mod global_ptr;
mod global_ref;
mod matrix;
mod memory;
pub mod pattern;
mod shared_counter;
mod team;
pub mod view;
mod world;

pub use crate::array::{Array, GlobalRange};
pub use crate::comm::{AllocError, AllocResult, Backend, DataType, Elem, NativeElem, NativeOp, RawGptr};
pub use crate::env_var::config;
pub use crate::future::GlobalRefFuture;
pub use crate::global_ptr::GlobalPtr;
pub use crate::global_ref::{swap, GlobalAsyncRef, GlobalRef};
pub use crate::matrix::{GlobalIter, Matrix};
pub use crate::pattern::{Dist, Pattern, TeamSpec};
pub use crate::shared_counter::SharedCounter;
pub use crate::team::{BlockedArch, IdError, StridedArch, Team, TeamArch};
pub use crate::world::{spawn_units, World, WorldBuilder};

pub mod prelude {
    //! The common imports of a tessera program.
    pub use crate::algorithm::{accumulate, accumulate_local, Fold, Max, Min, Plus, Prod};
    pub use crate::view::{index, local, View};
    pub use crate::{
        spawn_units, Array, Backend, Dist, GlobalAsyncRef, GlobalRef, GlobalRefFuture, Matrix,
        Pattern, Team, TeamSpec, World, WorldBuilder,
    };
}
