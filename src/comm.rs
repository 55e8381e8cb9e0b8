use crate::env_var::config;

use enum_dispatch::enum_dispatch;
use std::sync::Arc;

pub(crate) mod local;
pub(crate) mod shmem;

use local::LocalComm;
use shmem::ShmemComm;

/// Marker for types that may be placed in global memory and moved through
/// the one-sided transport.
pub trait Elem: Copy + Send + Sync + 'static {}
impl<T: Copy + Send + Sync + 'static> Elem for T {}

/// The list of available comm backends, used to specify how data is
/// transfered between units
#[derive(Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub enum Backend {
    /// Single unit execution
    Local,
    /// Multi unit execution, units share one process group's symmetric heap
    Shmem,
}

impl Default for Backend {
    fn default() -> Self {
        match config().backend.as_str() {
            "shmem" => Backend::Shmem,
            _ => Backend::Local,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AllocError {
    OutOfMemoryError(usize),
    IdError(usize),
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AllocError::OutOfMemoryError(size) => {
                write!(f, "not enough memory to allocate {} bytes", size)
            }
            AllocError::IdError(unit) => {
                write!(f, "unit {} must be part of the allocating team", unit)
            }
        }
    }
}

impl std::error::Error for AllocError {}

pub type AllocResult<T> = Result<T, AllocError>;

/// Raw global pointer: names one byte in one unit's portion of a segment.
///
/// This is the wire-level triple; the typed [`GlobalPtr`](crate::GlobalPtr)
/// layers element arithmetic on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawGptr {
    pub segment: usize,
    pub unit: usize,
    pub offset: usize,
}

impl RawGptr {
    pub const NULL: RawGptr = RawGptr {
        segment: usize::MAX,
        unit: usize::MAX,
        offset: 0,
    };

    pub fn new(segment: usize, unit: usize, offset: usize) -> RawGptr {
        RawGptr {
            segment,
            unit,
            offset,
        }
    }

    pub fn is_null(&self) -> bool {
        self.segment == usize::MAX
    }

    pub fn set_unit(&mut self, unit: usize) {
        self.unit = unit;
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Advance by a byte count within the owning unit's portion.
    pub fn inc_offset(&mut self, bytes: usize) {
        self.offset += bytes;
    }
}

/// Completion handle for a non-blocking transport operation.
///
/// The in-tree backends complete operations eagerly, so handles are born
/// complete; the interface still round-trips through `test_local`/`wait`
/// so that callers are written against the general contract.
#[derive(Debug)]
pub struct CommHandle {
    complete: bool,
}

impl CommHandle {
    pub(crate) fn ready() -> CommHandle {
        CommHandle { complete: true }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Comm-level team descriptor: an ordered set of global unit ids.
///
/// Shared by the public [`Team`](crate::Team) and every typed global
/// pointer, so pointer arithmetic can walk the team order without a
/// registry lookup.
#[derive(Debug, Clone)]
pub struct TeamHandle {
    pub(crate) id: u64,
    pub(crate) units: Arc<Vec<usize>>,
    pub(crate) my_pos: Option<usize>,
}

impl TeamHandle {
    pub(crate) fn new(id: u64, units: Vec<usize>, my_unit: usize) -> TeamHandle {
        let my_pos = units.iter().position(|u| *u == my_unit);
        TeamHandle {
            id,
            units: Arc::new(units),
            my_pos,
        }
    }

    pub(crate) fn empty() -> TeamHandle {
        TeamHandle {
            id: u64::MAX,
            units: Arc::new(Vec::new()),
            my_pos: None,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.units.len()
    }

    /// Position of a global unit id within the team order.
    pub(crate) fn pos_of(&self, unit: usize) -> Option<usize> {
        // teams are small; a scan beats carrying an index map in every pointer
        self.units.iter().position(|u| *u == unit)
    }

    pub(crate) fn global_unit(&self, pos: usize) -> usize {
        self.units[pos]
    }
}

/// Datatypes the transport can reduce natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    Usize,
    I8,
    I16,
    I32,
    I64,
    Isize,
    F32,
    F64,
    Bool,
}

/// Reduction operations the transport implements natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOp {
    Sum,
    Prod,
    Min,
    Max,
    LogAnd,
    LogOr,
    BitAnd,
    BitOr,
    BitXor,
}

/// Maps an element type onto the transport's native datatype table.
pub trait NativeElem: Elem {
    const DTYPE: DataType;
}

macro_rules! impl_native_elem {
    ($($t:ident),*) => {
        $(
            paste::paste! {
                impl NativeElem for $t {
                    const DTYPE: DataType = DataType::[<$t:camel>];
                }
            }
        )*
    };
}

impl_native_elem!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, bool);

macro_rules! int_combine {
    ($op:expr, $src:expr, $acc:expr, $t:ty) => {{
        let n = $src.len() / std::mem::size_of::<$t>();
        let src = unsafe { std::slice::from_raw_parts($src.as_ptr() as *const $t, n) };
        let acc = unsafe { std::slice::from_raw_parts_mut($acc.as_mut_ptr() as *mut $t, n) };
        for (a, s) in acc.iter_mut().zip(src.iter()) {
            match $op {
                NativeOp::Sum => *a = a.wrapping_add(*s),
                NativeOp::Prod => *a = a.wrapping_mul(*s),
                NativeOp::Min => *a = (*a).min(*s),
                NativeOp::Max => *a = (*a).max(*s),
                NativeOp::BitAnd => *a &= *s,
                NativeOp::BitOr => *a |= *s,
                NativeOp::BitXor => *a ^= *s,
                op => panic!("op {:?} not defined for {}", op, stringify!($t)),
            }
        }
    }};
}

macro_rules! float_combine {
    ($op:expr, $src:expr, $acc:expr, $t:ty) => {{
        let n = $src.len() / std::mem::size_of::<$t>();
        let src = unsafe { std::slice::from_raw_parts($src.as_ptr() as *const $t, n) };
        let acc = unsafe { std::slice::from_raw_parts_mut($acc.as_mut_ptr() as *mut $t, n) };
        for (a, s) in acc.iter_mut().zip(src.iter()) {
            match $op {
                NativeOp::Sum => *a += *s,
                NativeOp::Prod => *a *= *s,
                NativeOp::Min => *a = (*a).min(*s),
                NativeOp::Max => *a = (*a).max(*s),
                op => panic!("op {:?} not defined for {}", op, stringify!($t)),
            }
        }
    }};
}

/// Fold `src` into `acc` elementwise with a native op. Backends share this
/// table; an unsupported (op, dtype) pair is a fatal transport error.
pub(crate) fn combine_native(dtype: DataType, op: NativeOp, src: &[u8], acc: &mut [u8]) {
    debug_assert_eq!(src.len(), acc.len());
    match dtype {
        DataType::U8 => int_combine!(op, src, acc, u8),
        DataType::U16 => int_combine!(op, src, acc, u16),
        DataType::U32 => int_combine!(op, src, acc, u32),
        DataType::U64 => int_combine!(op, src, acc, u64),
        DataType::Usize => int_combine!(op, src, acc, usize),
        DataType::I8 => int_combine!(op, src, acc, i8),
        DataType::I16 => int_combine!(op, src, acc, i16),
        DataType::I32 => int_combine!(op, src, acc, i32),
        DataType::I64 => int_combine!(op, src, acc, i64),
        DataType::Isize => int_combine!(op, src, acc, isize),
        DataType::F32 => float_combine!(op, src, acc, f32),
        DataType::F64 => float_combine!(op, src, acc, f64),
        DataType::Bool => {
            let n = src.len();
            let src = unsafe { std::slice::from_raw_parts(src.as_ptr() as *const bool, n) };
            let acc = unsafe { std::slice::from_raw_parts_mut(acc.as_mut_ptr() as *mut bool, n) };
            for (a, s) in acc.iter_mut().zip(src.iter()) {
                match op {
                    NativeOp::LogAnd | NativeOp::BitAnd => *a &= *s,
                    NativeOp::LogOr | NativeOp::BitOr => *a |= *s,
                    NativeOp::BitXor => *a ^= *s,
                    op => panic!("op {:?} not defined for bool", op),
                }
            }
        }
    }
}

/// Pairwise combine for custom reductions: folds a contributed payload into
/// the accumulator. Applied on the contributing unit's own thread.
pub(crate) type CombineFn<'a> = dyn Fn(&[u8], &mut [u8]) + 'a;

#[enum_dispatch(CommOps)]
#[derive(Debug)]
pub(crate) enum Comm {
    Shmem(ShmemComm),
    Local(LocalComm),
}

/// The one-sided transport interface consumed by the container, reference,
/// and reduction layers. Byte-granular; typed wrappers live with the types.
#[enum_dispatch]
pub(crate) trait CommOps {
    fn my_unit(&self) -> usize;
    fn num_units(&self) -> usize;
    fn backend(&self) -> Backend;

    /// Collective barrier over a team; also establishes remote visibility.
    fn barrier(&self, team: &TeamHandle);

    /// Collective symmetric allocation: every unit of `team` contributes
    /// `bytes` of local storage; the returned pointer names the start of the
    /// allocation (first unit of the team, offset 0) and is identical on
    /// every participant.
    fn team_alloc(&self, team: &TeamHandle, bytes: usize, align: usize) -> AllocResult<RawGptr>;

    /// Collective release of a segment; the backing memory is reclaimed once
    /// every participant has released it.
    fn team_free(&self, team: &TeamHandle, segment: usize);

    /// Native address of a location owned by the calling unit.
    fn local_addr(&self, gptr: RawGptr) -> *mut u8;

    /// Blocking-from-the-caller put: the source buffer is reusable on
    /// return; remote visibility requires `flush` or `barrier`.
    fn put_blocking_local(&self, gptr: RawGptr, src: &[u8]);

    /// Blocking get: `dst` holds the remote value on return.
    fn get_blocking(&self, gptr: RawGptr, dst: &mut [u8]);

    /// Non-blocking put; the source buffer is reusable on return.
    fn put_handle(&self, gptr: RawGptr, src: &[u8]) -> CommHandle;

    /// Handle-returning get into a caller-owned buffer.
    fn get_handle(&self, gptr: RawGptr, dst: &mut [u8]) -> CommHandle;

    fn test_local(&self, handle: &CommHandle) -> bool;
    fn wait(&self, handle: CommHandle);

    /// Drain outstanding operations on `gptr`'s segment at its target unit.
    fn flush(&self, gptr: RawGptr);

    /// All-reduce of `src` into `dst` with a native (dtype, op) pair.
    fn allreduce(
        &self,
        team: &TeamHandle,
        dtype: DataType,
        op: NativeOp,
        src: &[u8],
        dst: &mut [u8],
    );

    /// All-reduce with a caller-supplied pairwise combine; subsumes custom
    /// type and op registration of wire-level transports.
    fn allreduce_custom(&self, team: &TeamHandle, src: &[u8], dst: &mut [u8], combine: &CombineFn<'_>);
}

pub(crate) fn create_comm(backend: Backend) -> Arc<Comm> {
    match backend {
        Backend::Shmem => {
            let group_id = config().group_id;
            let unit = config()
                .unit_id
                .expect("TESSERA_UNIT_ID must be set to attach to a shmem group");
            Arc::new(Comm::Shmem(ShmemComm::attach(group_id, unit)))
        }
        Backend::Local => Arc::new(Comm::Local(LocalComm::new())),
    }
}
