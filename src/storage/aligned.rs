//! Cache-line aligned buffers for IA/JA storage
//!
//! Every allocation starts on a 64-byte boundary and its byte size is rounded
//! up to a whole number of cache lines, so the tail of one buffer never shares
//! a line with another buffer written by a different worker.
//!
//! ```text
//! request: 5 x u32 = 20 bytes
//! layout:  |<-------------- 64 bytes -------------->|
//!          [v0 v1 v2 v3 v4 | zero padding ........ ]
//! ```

use crate::error::{GraphError, GraphResult};
use bytemuck::Pod;
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::AtomicU32;

/// Alignment and size granule of every buffer (one cache line)
pub const CACHE_LINE: usize = 64;

/// Round a byte count up to whole cache lines (at least one line)
#[must_use]
pub const fn padded_bytes(bytes: usize) -> Option<usize> {
    let lines = if bytes == 0 {
        1
    } else {
        bytes.div_ceil(CACHE_LINE)
    };
    lines.checked_mul(CACHE_LINE)
}

/// Owned, zero-initialised, 64-byte aligned array of plain-old-data values
///
/// Behaves like a fixed-length boxed slice; memory is released on drop.
pub struct AlignedBuffer<T: Pod> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer uniquely owns its allocation; `T: Pod` has no interior
// references, so sending or sharing it is as safe as for `Box<[T]>`.
unsafe impl<T: Pod + Send> Send for AlignedBuffer<T> {}
// SAFETY: see above; shared access only hands out `&[T]`.
unsafe impl<T: Pod + Sync> Sync for AlignedBuffer<T> {}

impl<T: Pod> AlignedBuffer<T> {
    /// Allocate `len` zeroed elements
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] if the padded size overflows or the
    /// allocator refuses the request.
    pub fn zeroed(len: usize) -> GraphResult<Self> {
        let requested = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(GraphError::OutOfMemory { bytes: usize::MAX })?;
        let bytes = padded_bytes(requested).ok_or(GraphError::OutOfMemory { bytes: requested })?;
        let layout = Layout::from_size_align(bytes, CACHE_LINE)
            .map_err(|_| GraphError::OutOfMemory { bytes })?;

        // SAFETY: `layout` has a non-zero size (at least one cache line).
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<T>()).ok_or(GraphError::OutOfMemory { bytes })?;

        Ok(Self { ptr, len, layout })
    }

    /// Allocate a buffer holding a copy of `values`
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] on allocation failure.
    pub fn from_slice(values: &[T]) -> GraphResult<Self> {
        let mut buffer = Self::zeroed(values.len())?;
        buffer.copy_from_slice(values);
        Ok(buffer)
    }

    /// Number of elements
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when the buffer holds no elements
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes actually reserved (a multiple of [`CACHE_LINE`])
    #[must_use]
    pub const fn allocated_bytes(&self) -> usize {
        self.layout.size()
    }

    /// Start address, for alignment checks
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Copy into a `Vec`
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.deref().to_vec()
    }
}

impl AlignedBuffer<u32> {
    /// View the elements as atomic counters
    ///
    /// Requires exclusive access for the lifetime of the view, so no plain
    /// reads can observe concurrent atomic updates.
    pub fn as_atomic(&mut self) -> &[AtomicU32] {
        // SAFETY: `AtomicU32` has the same size and bit validity as `u32`;
        // its alignment (4) is satisfied because the buffer starts on a
        // 64-byte boundary. The `&mut self` borrow guarantees no other
        // reference to the elements exists while the view is alive.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<AtomicU32>(), self.len) }
    }
}

impl<T: Pod> Deref for AlignedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialised (zeroed or written) elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Pod> DerefMut for AlignedBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Pod> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

impl<T: Pod> Clone for AlignedBuffer<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self).unwrap_or_else(|_| handle_alloc_error(self.layout))
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Pod + PartialEq> PartialEq for AlignedBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deref() == other.deref()
    }
}

impl<T: Pod + Eq> Eq for AlignedBuffer<T> {}

/// Allocate an offsets array (`n_vertices + 1` entries)
///
/// # Errors
///
/// Returns [`GraphError::OutOfMemory`] on allocation failure.
pub fn alloc_offsets(n_vertices: usize) -> GraphResult<AlignedBuffer<u32>> {
    let len = n_vertices
        .checked_add(1)
        .ok_or(GraphError::OutOfMemory { bytes: usize::MAX })?;
    AlignedBuffer::zeroed(len)
}

/// Allocate a neighbor (or weight) array of `n_edges` entries
///
/// # Errors
///
/// Returns [`GraphError::OutOfMemory`] on allocation failure.
pub fn alloc_neighbors(n_edges: usize) -> GraphResult<AlignedBuffer<u32>> {
    AlignedBuffer::zeroed(n_edges)
}
