// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel.  Everything else in this crate exists to
//! call `escape_time` once per pixel as fast as possible.

use num::traits::AsPrimitive;
use num::{Complex, Float};

/// |z|² beyond which a point is known to diverge.  A bailout radius of
/// two.
pub const BAILOUT_SQ: f64 = 4.0;

/// The floating point types the kernel can run in.  Sample points are
/// always stored as `f64` and narrowed on the way in.
pub trait Real: Float + AsPrimitive<f64> + Send + Sync {}

impl<T> Real for T
where
    T: Float + AsPrimitive<f64> + Send + Sync,
    f64: AsPrimitive<T>,
{
}

/// What the kernel learned about a single sample point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterationResult {
    /// How many iterations ran before |z| passed the bailout radius, or
    /// `max_iter` if it never did.
    pub count: u32,
    /// Whether the point escaped.  False means the point is treated as
    /// belonging to the set.
    pub escaped: bool,
    /// |z|² at the moment the loop stopped.  Used for smooth coloring.
    pub modulus_sq: f64,
}

impl IterationResult {
    /// The record reported for every pixel when `max_iter` is zero.
    pub const DEGENERATE: IterationResult = IterationResult {
        count: 0,
        escaped: true,
        modulus_sq: 0.0,
    };

    /// Rebuilds a record from a raw count and modulus, as read back
    /// from a device buffer.
    pub fn from_count(count: u32, modulus_sq: f64, max_iter: u32) -> Self {
        if max_iter == 0 {
            return IterationResult::DEGENERATE;
        }
        IterationResult {
            count,
            escaped: count < max_iter,
            modulus_sq,
        }
    }
}

impl Default for IterationResult {
    fn default() -> Self {
        IterationResult::DEGENERATE
    }
}

/// This is our classic iterator function.  Starting from z = 0, apply
/// z ← z² + c until either `max_iter` iterations have run or |z|² has
/// passed four.  The squares of both components are kept around so
/// that each step costs three multiplications and no square roots.
///
/// `max_iter` of zero is degenerate but well defined: the count is zero
/// and the point is reported as escaped.
#[inline]
pub fn escape_time<F>(c: Complex<F>, max_iter: u32) -> IterationResult
where
    F: Real,
    f64: AsPrimitive<F>,
{
    if max_iter == 0 {
        return IterationResult::DEGENERATE;
    }

    let bailout: F = AsPrimitive::<F>::as_(BAILOUT_SQ);
    let two = F::one() + F::one();
    let (mut re, mut im) = (F::zero(), F::zero());
    let (mut re2, mut im2) = (F::zero(), F::zero());
    let mut n = 0;
    while n < max_iter && re2 + im2 <= bailout {
        im = two * re * im + c.im;
        re = re2 - im2 + c.re;
        re2 = re * re;
        im2 = im * im;
        n += 1;
    }

    IterationResult {
        count: n,
        escaped: n < max_iter,
        modulus_sq: AsPrimitive::<f64>::as_(re2 + im2),
    }
}

/// Runs the kernel over a run of samples in whichever precision the
/// caller picked, writing into a matching run of results.
pub fn escape_run<F>(samples: &[Complex<f64>], out: &mut [IterationResult], max_iter: u32)
where
    F: Real,
    f64: AsPrimitive<F>,
{
    debug_assert_eq!(samples.len(), out.len());
    for (c, slot) in samples.iter().zip(out.iter_mut()) {
        let c = Complex::new(AsPrimitive::<F>::as_(c.re), AsPrimitive::<F>::as_(c.im));
        *slot = escape_time(c, max_iter);
    }
}
