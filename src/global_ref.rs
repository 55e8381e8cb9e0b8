//! Global references: value-like handles that read and write one element of
//! global memory, dispatching to a direct memory access when the referent is
//! local and to a one-sided transfer otherwise.
//!
//! ```no_run
//! # use tessera::{spawn_units, Array};
//! spawn_units(2, |world| {
//!     let arr = Array::<u32>::new(world.team(), 8);
//!     if world.my_unit() == 0 {
//!         arr.at(5).store(42); // blocking put if index 5 is remote
//!     }
//!     arr.barrier();
//!     assert_eq!(arr.at(5).load(), 42); // every unit reads 42
//! });
//! ```

use crate::comm::{CommOps, Elem};
use crate::future::GlobalRefFuture;
use crate::global_ptr::GlobalPtr;

use tracing::trace;

/// Synchronous reference to one element of global memory.
///
/// Like a native reference it cannot be copied; unlike one, reads and writes
/// are explicit (`load`/`store`) because either may be a remote transfer.
pub struct GlobalRef<T: Elem> {
    gptr: GlobalPtr<T>,
    /// cached native address, null when the referent is remote
    lptr: *mut T,
}

unsafe impl<T: Elem> Send for GlobalRef<T> {}
unsafe impl<T: Elem> Sync for GlobalRef<T> {}

impl<T: Elem> GlobalRef<T> {
    pub(crate) fn from_parts(gptr: GlobalPtr<T>, lptr: *mut T) -> GlobalRef<T> {
        GlobalRef { gptr, lptr }
    }

    pub fn new(gptr: GlobalPtr<T>) -> GlobalRef<T> {
        let lptr = gptr.to_local();
        GlobalRef { gptr, lptr }
    }

    /// Whether the referenced element is located in local memory.
    pub fn is_local(&self) -> bool {
        !self.lptr.is_null()
    }

    pub fn gptr(&self) -> &GlobalPtr<T> {
        &self.gptr
    }

    /// Read the referenced value; a blocking get when remote.
    pub fn load(&self) -> T {
        if self.is_local() {
            unsafe { *self.lptr }
        } else {
            trace!(gptr = ?self.gptr, "remote load");
            let mut value = std::mem::MaybeUninit::<T>::uninit();
            let bytes = unsafe {
                std::slice::from_raw_parts_mut(
                    value.as_mut_ptr() as *mut u8,
                    std::mem::size_of::<T>(),
                )
            };
            self.gptr.comm().get_blocking(self.gptr.raw(), bytes);
            unsafe { value.assume_init() }
        }
    }

    /// Write the referenced value. The call returns once `value` may be
    /// reused; remote visibility requires a flush or barrier.
    pub fn store(&self, value: T) {
        if self.is_local() {
            unsafe { *self.lptr = value };
        } else {
            trace!(gptr = ?self.gptr, "remote store");
            let bytes = unsafe {
                std::slice::from_raw_parts(
                    &value as *const T as *const u8,
                    std::mem::size_of::<T>(),
                )
            };
            self.gptr.comm().put_blocking_local(self.gptr.raw(), bytes);
        }
    }

    /// Begin a non-blocking read of the referenced value.
    pub fn fetch(&self) -> GlobalRefFuture<T> {
        GlobalRefFuture::new(&self.gptr)
    }

    /// Rebind to a member of type `M` at byte offset `offset` inside `T`.
    ///
    /// # Safety
    /// A value of type `M` must live at `offset` bytes into `T`; use
    /// `memoffset::offset_of!` to produce such offsets.
    pub unsafe fn member<M: Elem>(&self, offset: usize) -> GlobalRef<M> {
        debug_assert!(offset + std::mem::size_of::<M>() <= std::mem::size_of::<T>());
        let mut gptr = self.gptr.cast::<M>();
        gptr.inc_bytes(offset);
        let lptr = if self.lptr.is_null() {
            std::ptr::null_mut()
        } else {
            (self.lptr as *mut u8).add(offset) as *mut M
        };
        GlobalRef { gptr, lptr }
    }
}

impl<T: Elem> PartialEq for GlobalRef<T> {
    /// True when both references name the same element.
    fn eq(&self, other: &Self) -> bool {
        self.gptr == other.gptr
    }
}

impl<T: Elem> std::fmt::Debug for GlobalRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_local() {
            write!(f, "GlobalRef({:p})", self.lptr)
        } else {
            write!(f, "GlobalRef({:?})", self.gptr)
        }
    }
}

/// Exchange the referenced values through a temporary.
pub fn swap<T: Elem>(a: &GlobalRef<T>, b: &GlobalRef<T>) {
    let temp = a.load();
    a.store(b.load());
    b.store(temp);
}

/// Write-only reference for asynchronous stores.
///
/// Stores are non-blocking puts: the source value is reusable on return but
/// the write is only published by [`flush`](GlobalAsyncRef::flush) or a team
/// barrier. Reads go through [`fetch`](GlobalAsyncRef::fetch), which yields
/// a [`GlobalRefFuture`].
///
/// Reading the referenced location between a store and the flush that
/// publishes it is unspecified, even on the storing unit.
pub struct GlobalAsyncRef<T: Elem> {
    gptr: GlobalPtr<T>,
    lptr: *mut T,
}

unsafe impl<T: Elem> Send for GlobalAsyncRef<T> {}
unsafe impl<T: Elem> Sync for GlobalAsyncRef<T> {}

impl<T: Elem> GlobalAsyncRef<T> {
    pub fn new(gptr: GlobalPtr<T>) -> GlobalAsyncRef<T> {
        let lptr = gptr.to_local();
        GlobalAsyncRef { gptr, lptr }
    }

    pub fn is_local(&self) -> bool {
        !self.lptr.is_null()
    }

    pub fn gptr(&self) -> &GlobalPtr<T> {
        &self.gptr
    }

    /// Non-blocking store; complete after the next `flush`.
    pub fn store(&self, value: T) {
        if self.is_local() {
            unsafe { *self.lptr = value };
        } else {
            trace!(gptr = ?self.gptr, "async store");
            let bytes = unsafe {
                std::slice::from_raw_parts(
                    &value as *const T as *const u8,
                    std::mem::size_of::<T>(),
                )
            };
            self.gptr.comm().put_blocking_local(self.gptr.raw(), bytes);
        }
    }

    /// Begin a non-blocking read of the referenced value.
    pub fn fetch(&self) -> GlobalRefFuture<T> {
        GlobalRefFuture::new(&self.gptr)
    }

    /// Drain all outstanding stores to this reference's segment at its
    /// target unit and establish remote visibility.
    pub fn flush(&self) {
        if !self.gptr.is_null() {
            self.gptr.comm().flush(self.gptr.raw());
        }
    }

    /// Rebind to a member of type `M` at byte offset `offset` inside `T`.
    ///
    /// # Safety
    /// A value of type `M` must live at `offset` bytes into `T`.
    pub unsafe fn member<M: Elem>(&self, offset: usize) -> GlobalAsyncRef<M> {
        debug_assert!(offset + std::mem::size_of::<M>() <= std::mem::size_of::<T>());
        let mut gptr = self.gptr.cast::<M>();
        gptr.inc_bytes(offset);
        let lptr = if self.lptr.is_null() {
            std::ptr::null_mut()
        } else {
            (self.lptr as *mut u8).add(offset) as *mut M
        };
        GlobalAsyncRef { gptr, lptr }
    }
}

impl<T: Elem> PartialEq for GlobalAsyncRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.gptr == other.gptr
    }
}

impl<T: Elem> std::fmt::Debug for GlobalAsyncRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_local() {
            write!(f, "GlobalAsyncRef({:p})", self.lptr)
        } else {
            write!(f, "GlobalAsyncRef({:?})", self.gptr)
        }
    }
}
