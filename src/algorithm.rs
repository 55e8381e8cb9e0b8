//! Collective reductions.
//!
//! [`accumulate`] reduces a global range in two phases: every unit folds its
//! local elements in canonical local order, then the per-unit results are
//! combined with an all-reduce and `init` is folded in last. The binary
//! operation must be associative and commutative.
//!
//! Recognized operations ([`Plus`], [`Prod`], [`Min`], [`Max`], the logical
//! and bitwise families) over native element types use the transport's
//! all-reduce directly when every unit is known to contribute. Everything
//! else travels as a `(value, valid)` payload whose combine applies the user
//! operation only to two valid operands, so units with empty local ranges
//! need no identity element.

use crate::array::GlobalRange;
use crate::comm::{CommOps, DataType, Elem, NativeElem, NativeOp};
use crate::team::Team;

use std::mem::MaybeUninit;
use tracing::warn;

/// An associative, commutative binary reduce operation.
pub trait BinaryFn<T: Elem> {
    fn apply(&self, a: T, b: T) -> T;

    /// The transport's native (dtype, op) pair, when one exists.
    fn native(&self) -> Option<(DataType, NativeOp)> {
        None
    }
}

/// Adapts an arbitrary closure as a reduce operation; always takes the
/// custom all-reduce path.
pub struct Fold<F>(pub F);

impl<T: Elem, F: Fn(T, T) -> T> BinaryFn<T> for Fold<F> {
    fn apply(&self, a: T, b: T) -> T {
        (self.0)(a, b)
    }
}

pub struct Plus;

impl<T: NativeElem + std::ops::Add<Output = T>> BinaryFn<T> for Plus {
    fn apply(&self, a: T, b: T) -> T {
        a + b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::Sum))
    }
}

pub struct Prod;

impl<T: NativeElem + std::ops::Mul<Output = T>> BinaryFn<T> for Prod {
    fn apply(&self, a: T, b: T) -> T {
        a * b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::Prod))
    }
}

pub struct Min;

impl<T: NativeElem + PartialOrd> BinaryFn<T> for Min {
    fn apply(&self, a: T, b: T) -> T {
        if b < a {
            b
        } else {
            a
        }
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::Min))
    }
}

pub struct Max;

impl<T: NativeElem + PartialOrd> BinaryFn<T> for Max {
    fn apply(&self, a: T, b: T) -> T {
        if b > a {
            b
        } else {
            a
        }
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::Max))
    }
}

pub struct LogAnd;

impl BinaryFn<bool> for LogAnd {
    fn apply(&self, a: bool, b: bool) -> bool {
        a && b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((DataType::Bool, NativeOp::LogAnd))
    }
}

pub struct LogOr;

impl BinaryFn<bool> for LogOr {
    fn apply(&self, a: bool, b: bool) -> bool {
        a || b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((DataType::Bool, NativeOp::LogOr))
    }
}

pub struct BitAnd;

impl<T: NativeElem + std::ops::BitAnd<Output = T>> BinaryFn<T> for BitAnd {
    fn apply(&self, a: T, b: T) -> T {
        a & b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::BitAnd))
    }
}

pub struct BitOr;

impl<T: NativeElem + std::ops::BitOr<Output = T>> BinaryFn<T> for BitOr {
    fn apply(&self, a: T, b: T) -> T {
        a | b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::BitOr))
    }
}

pub struct BitXor;

impl<T: NativeElem + std::ops::BitXor<Output = T>> BinaryFn<T> for BitXor {
    fn apply(&self, a: T, b: T) -> T {
        a ^ b
    }

    fn native(&self) -> Option<(DataType, NativeOp)> {
        Some((T::DTYPE, NativeOp::BitXor))
    }
}

fn bytes_of<T>(value: &T) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>())
    }
}

fn bytes_of_mut<T>(value: &mut T) -> &mut [u8] {
    unsafe {
        std::slice::from_raw_parts_mut(value as *mut T as *mut u8, std::mem::size_of::<T>())
    }
}

#[repr(C)]
struct Payload<T> {
    value: MaybeUninit<T>,
    valid: bool,
}

/// Reduce each unit's local slice, then all-reduce across `team`.
///
/// Collective. `non_empty` promises that every unit's slice is non-empty,
/// which unlocks the transport's native all-reduce for recognized
/// operations; a violated promise is diagnosed and yields an unspecified
/// contribution from the offending unit.
pub fn accumulate_local<T, F>(local: &[T], init: T, binary_op: F, non_empty: bool, team: &Team) -> T
where
    T: Elem,
    F: BinaryFn<T>,
{
    let comm = team.comm();
    let handle = team.handle();
    let local_value = local
        .split_first()
        .map(|(first, rest)| rest.iter().fold(*first, |acc, x| binary_op.apply(acc, *x)));

    if non_empty {
        if let Some((dtype, op)) = binary_op.native() {
            let contribution = match local_value {
                Some(v) => v,
                None => {
                    warn!("unit promised a non-empty local range but holds no elements");
                    unsafe { std::mem::zeroed() }
                }
            };
            let mut combined = MaybeUninit::<T>::uninit();
            comm.allreduce(
                handle,
                dtype,
                op,
                bytes_of(&contribution),
                bytes_of_mut(&mut combined),
            );
            return binary_op.apply(init, unsafe { combined.assume_init() });
        }
    }

    // zeroed so every byte is initialized before it crosses the transport
    let mut payload: Payload<T> = unsafe { std::mem::zeroed() };
    if let Some(v) = local_value {
        payload.value = MaybeUninit::new(v);
        payload.valid = true;
    }
    let mut combined: Payload<T> = unsafe { std::mem::zeroed() };
    let combine = |src: &[u8], acc: &mut [u8]| {
        let src = unsafe { &*(src.as_ptr() as *const Payload<T>) };
        let acc = unsafe { &mut *(acc.as_mut_ptr() as *mut Payload<T>) };
        if src.valid {
            if acc.valid {
                let merged = binary_op.apply(unsafe { src.value.assume_init() }, unsafe {
                    acc.value.assume_init()
                });
                acc.value = MaybeUninit::new(merged);
            } else {
                acc.value = src.value;
                acc.valid = true;
            }
        }
    };
    comm.allreduce_custom(
        handle,
        bytes_of(&payload),
        bytes_of_mut(&mut combined),
        &combine,
    );
    if combined.valid {
        binary_op.apply(init, unsafe { combined.value.assume_init() })
    } else {
        warn!("reduction found no valid contribution on any unit");
        init
    }
}

/// Reduce a global array range: the local sub-range is computed through the
/// pattern, folded in canonical local order, and combined across the
/// array's team.
///
/// Collective over the array's team.
pub fn accumulate<T, F>(range: GlobalRange<'_, T>, init: T, binary_op: F) -> T
where
    T: Elem,
    F: BinaryFn<T>,
{
    let array = range.array;
    let pattern = array.pattern();
    let u = pattern.team_coords(array.as_matrix().my_pos())[0];
    let lo = pattern.dim_owned_before(0, u, range.start);
    let hi = pattern.dim_owned_before(0, u, range.end);
    accumulate_local(
        &array.local_as_slice()[lo..hi],
        init,
        binary_op,
        false,
        array.team(),
    )
}
