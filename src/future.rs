//! Futures for asynchronous single-element reads.

use crate::comm::{Comm, CommHandle, CommOps, Elem};
use crate::global_ptr::GlobalPtr;

use std::future::Future;
use std::mem::MaybeUninit;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A pending single-element read: a transport handle plus the buffer the
/// value lands in.
///
/// Move-only. Dropping an incomplete future waits for the transfer, so the
/// buffer is never abandoned while the transport may still write to it.
pub struct GlobalRefFuture<T: Elem> {
    comm: Arc<Comm>,
    handle: Option<CommHandle>,
    buf: Box<MaybeUninit<T>>,
    completed: bool,
}

impl<T: Elem> GlobalRefFuture<T> {
    /// Issue the read immediately; completion is observed through
    /// [`test`](Self::test) / [`wait`](Self::wait) / [`get`](Self::get).
    pub(crate) fn new(gptr: &GlobalPtr<T>) -> GlobalRefFuture<T> {
        let comm = gptr.comm().clone();
        let mut buf = Box::new(MaybeUninit::<T>::uninit());
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, std::mem::size_of::<T>())
        };
        let handle = comm.get_handle(gptr.raw(), bytes);
        GlobalRefFuture {
            comm,
            handle: Some(handle),
            buf,
            completed: false,
        }
    }

    /// Poll whether the transfer has completed.
    pub fn test(&mut self) -> bool {
        if !self.completed {
            if let Some(handle) = &self.handle {
                self.completed = self.comm.test_local(handle);
            }
        }
        self.completed
    }

    /// Block until the transfer has completed.
    pub fn wait(&mut self) {
        if !self.completed {
            if let Some(handle) = self.handle.take() {
                self.comm.wait(handle);
            }
            self.completed = true;
        }
    }

    /// Wait if necessary and return the transfered value.
    pub fn get(mut self) -> T {
        self.wait();
        unsafe { std::ptr::read(self.buf.as_ptr()) }
    }
}

impl<T: Elem> Future for GlobalRefFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if this.test() {
            Poll::Ready(unsafe { std::ptr::read(this.buf.as_ptr()) })
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

impl<T: Elem> Drop for GlobalRefFuture<T> {
    fn drop(&mut self) {
        // drain the handle so the transport never writes into freed memory
        self.wait();
    }
}
