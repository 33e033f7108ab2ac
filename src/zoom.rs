// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Zooming.  Deeper views need more iterations before the boundary
//! resolves, so a zoom step scales the iteration cap along with the
//! view: up by the zoom factor going in, down going out, clamped
//! between the starting cap and `MAX_ZOOM_ITERATIONS`.

use crate::errors::Result;
use crate::planes::{Pixel, Viewport};

/// The zoom applied by one click.
pub const ZOOM_FACTOR: f64 = 1.2;

/// Zooming in stops raising the iteration cap here.
pub const MAX_ZOOM_ITERATIONS: u32 = 2048;

/// A single zoom: where, and by how much.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomStep {
    /// The pixel that becomes the new center.
    pub at: Pixel,
    /// Above one zooms in, below one zooms out.
    pub factor: f64,
}

impl ZoomStep {
    /// Zoom in by the default factor.
    pub fn zoom_in(at: Pixel) -> Self {
        ZoomStep {
            at,
            factor: ZOOM_FACTOR,
        }
    }

    /// Zoom out by the default factor.
    pub fn zoom_out(at: Pixel) -> Self {
        ZoomStep {
            at,
            factor: 1.0 / ZOOM_FACTOR,
        }
    }

    /// Apply the step to a viewport and iteration cap.  `base_iter` is
    /// the cap the session started with; zooming out never drops below
    /// it.
    pub fn apply(
        &self,
        viewport: &Viewport,
        max_iter: u32,
        base_iter: u32,
    ) -> Result<(Viewport, u32)> {
        let viewport = viewport.zoom_at(&self.at, self.factor)?;
        Ok((viewport, scale_iterations(max_iter, self.factor, base_iter)))
    }
}

/// Scale an iteration cap by a zoom factor.  The result never falls
/// below `base_iter`, and never rises above the larger of
/// `MAX_ZOOM_ITERATIONS` and `base_iter`.
pub fn scale_iterations(max_iter: u32, factor: f64, base_iter: u32) -> u32 {
    let ceiling = MAX_ZOOM_ITERATIONS.max(base_iter);
    let scaled = (f64::from(max_iter) * factor).floor();
    if scaled >= f64::from(ceiling) {
        ceiling
    } else if scaled <= f64::from(base_iter) {
        base_iter
    } else {
        scaled as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Complex;

    #[test]
    fn iterations_grow_going_in() {
        assert_eq!(scale_iterations(256, ZOOM_FACTOR, 256), 307);
        assert_eq!(scale_iterations(2000, ZOOM_FACTOR, 256), 2048);
        assert_eq!(scale_iterations(2048, ZOOM_FACTOR, 256), 2048);
    }

    #[test]
    fn iterations_shrink_going_out_but_not_below_the_start() {
        assert_eq!(scale_iterations(307, 1.0 / ZOOM_FACTOR, 256), 256);
        assert_eq!(scale_iterations(1000, 1.0 / ZOOM_FACTOR, 256), 833);
    }

    #[test]
    fn a_large_starting_cap_is_kept() {
        assert_eq!(scale_iterations(5000, ZOOM_FACTOR, 5000), 5000);
    }

    #[test]
    fn in_then_out_returns_to_the_same_extent() {
        let vp = Viewport::new(Complex::new(-0.5, 0.0), 1.5, 1.5, 400, 300).unwrap();
        let center = Pixel(200, 150);
        let (zoomed, iters) = ZoomStep::zoom_in(center).apply(&vp, 256, 256).unwrap();
        assert_eq!(iters, 307);
        assert!((zoomed.half_width() - 1.25).abs() < 1e-12);
        let (back, iters) = ZoomStep::zoom_out(center).apply(&zoomed, iters, 256).unwrap();
        assert_eq!(iters, 256);
        assert!((back.half_width() - 1.5).abs() < 1e-12);
        assert_eq!(back.center(), vp.center());
    }

    #[test]
    fn zooming_off_the_grid_fails() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 1.0, 1.0, 10, 10).unwrap();
        assert!(ZoomStep::zoom_in(Pixel(10, 0)).apply(&vp, 100, 100).is_err());
    }
}
