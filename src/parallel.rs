//! The parallel-iteration primitive.
//!
//! The transform engine splits work into contiguous blocks of the
//! outermost output dimension and hands each block to a closure. With the
//! `parallel` feature the blocks run on rayon's work-stealing pool;
//! without it they run serially on the calling thread, so the rest of the
//! crate is agnostic to the feature.

use std::ops::Range;

use crate::Index;

/// Work totals below this many elements stay on the calling thread.
pub const MIN_THREAD_LENGTH: Index = 32 * 1024;

/// Feature-gated `Send` marker (≡ `Send` with `parallel`, vacuous without).
#[cfg(feature = "parallel")]
pub trait MaybeSend: Send {}
#[cfg(feature = "parallel")]
impl<T: Send> MaybeSend for T {}

/// Feature-gated `Sync` marker (≡ `Sync` with `parallel`, vacuous without).
#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync> MaybeSync for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSend {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSend for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSync for T {}

/// Runs `f` over contiguous sub-ranges covering `range`.
///
/// `weight` is the number of elements processed per step of the range;
/// `weight * range.len()` below [`MIN_THREAD_LENGTH`] keeps the whole range
/// on the calling thread. Block boundaries are unspecified; `f` must accept
/// any partition.
pub fn parallel_for<F>(range: Range<Index>, weight: Index, f: F)
where
    F: Fn(Range<Index>) + MaybeSend + MaybeSync,
{
    let len = range.end - range.start;
    if len <= 0 {
        return;
    }
    if len * weight.max(1) <= MIN_THREAD_LENGTH {
        f(range);
        return;
    }
    run_blocks(range, f);
}

#[cfg(feature = "parallel")]
fn run_blocks<F>(range: Range<Index>, f: F)
where
    F: Fn(Range<Index>) + Send + Sync,
{
    use rayon::prelude::*;

    let len = range.end - range.start;
    let blocks = (rayon::current_num_threads() as Index * 4).clamp(1, len);
    let block_len = (len + blocks - 1) / blocks;
    (0..blocks).into_par_iter().for_each(|b| {
        let begin = range.start + b * block_len;
        let end = (begin + block_len).min(range.end);
        if begin < end {
            f(begin..end);
        }
    });
}

#[cfg(not(feature = "parallel"))]
fn run_blocks<F>(range: Range<Index>, f: F)
where
    F: Fn(Range<Index>),
{
    f(range);
}

/// A raw pointer that may cross thread boundaries.
///
/// Blocks produced by [`parallel_for`] write through disjoint offsets of
/// the same buffer; the pointer itself is the only thing shared.
#[derive(Clone, Copy)]
pub(crate) struct SendPtr<T>(pub *mut T);

unsafe impl<T: Send> Send for SendPtr<T> {}
unsafe impl<T: Send> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    #[inline]
    pub fn get(self) -> *mut T {
        self.0
    }
}
