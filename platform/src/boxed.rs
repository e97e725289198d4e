use core::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};

/// Owned pointer to a `T`.
///
/// Intended for similar use cases as the standard library `Box`, but this one's
/// simpler and does not add a dependency on `alloc`. Using `alloc::boxed::Box`
/// would've been possible otherwise, but the allocator API is still unstable.
pub struct Box<T: 'static + ?Sized> {
    inner: &'static mut T,
}

impl<T: ?Sized> Box<T> {
    /// Creates a [`Box`] from a leaked borrow of the boxed value.
    pub fn from_mut(value: &'static mut T) -> Box<T> {
        Box { inner: value }
    }

    /// Creates a [`Box`] from a raw pointer.
    ///
    /// ### Safety
    /// The pointer must be non-null, valid for reads and writes, not aliased
    /// by any other reference or pointer, and the memory behind it must not
    /// be freed or reused for as long as the returned [`Box`] (or anything
    /// derived from it) is alive.
    pub unsafe fn from_ptr(ptr: *mut T) -> Box<T> {
        Box {
            // Safety: upheld by the caller.
            inner: unsafe { &mut *ptr },
        }
    }

    /// Consumes the [`Box`], returning the raw pointer it wrapped.
    ///
    /// The memory is not freed by this call; pass the pointer back into
    /// [`Box::from_ptr`] to avoid leaking it.
    pub fn into_ptr(self) -> *mut T {
        self.inner as *mut T
    }
}

impl<T: ?Sized> Deref for Box<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

impl<T: ?Sized> DerefMut for Box<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.inner
    }
}

impl<T: ?Sized + Debug> Debug for Box<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Box").field(&self.inner).finish()
    }
}
