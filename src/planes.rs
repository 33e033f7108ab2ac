// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport, which describes a relationship between a
//! rectangle on the integral plane with an origin at 0,0 and a
//! rectangle on the complex plane described by its center and its
//! half-extents, and the SampleGrid, which is every pixel of the
//! former mapped onto the latter.
//!
//! The sign convention is fixed: row 0 holds the most negative
//! imaginary values, and moving down the image (increasing y) moves up
//! the imaginary axis.  Zooming and panning go through the same
//! mapping, so the image never flips between renders.

use crate::errors::{Error, Result};
use num::Complex;

/// Describes the x, y of a point on the integral plane.  Column first,
/// row second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pixel(pub usize, pub usize);

/// The region of the complex plane being rendered, plus the pixel
/// resolution it is sampled at.  Once built it cannot be changed; the
/// zoom and resolution helpers hand back new viewports.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    center: Complex<f64>,
    half_width: f64,
    half_height: f64,
    width: usize,
    height: usize,
}

impl Viewport {
    /// Constructor.  Takes the center of the region, its half-width and
    /// half-height in plane units, and the pixel width and height of
    /// the grid.  Non-positive or non-finite extents and empty grids are
    /// rejected.
    pub fn new(
        center: Complex<f64>,
        half_width: f64,
        half_height: f64,
        width: usize,
        height: usize,
    ) -> Result<Viewport> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_viewport(format!(
                "pixel dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        if !(center.re.is_finite() && center.im.is_finite()) {
            return Err(Error::invalid_viewport("center is not a finite point"));
        }

        if !(half_width.is_finite() && half_width > 0.0) {
            return Err(Error::invalid_viewport(format!(
                "half-width must be positive, got {}",
                half_width
            )));
        }

        if !(half_height.is_finite() && half_height > 0.0) {
            return Err(Error::invalid_viewport(format!(
                "half-height must be positive, got {}",
                half_height
            )));
        }

        Ok(Viewport {
            center,
            half_width,
            half_height,
            width,
            height,
        })
    }

    /// Builds a viewport from the left-lower and right-upper corners of
    /// the complex plane, the way most people first describe the region
    /// around the set (-2..1 by -1.5..1.5).
    pub fn from_corners(
        leftlower: Complex<f64>,
        rightupper: Complex<f64>,
        width: usize,
        height: usize,
    ) -> Result<Viewport> {
        if rightupper.re <= leftlower.re {
            return Err(Error::invalid_viewport(
                "the left lower corner is not to the left of the right upper corner",
            ));
        }

        if rightupper.im <= leftlower.im {
            return Err(Error::invalid_viewport(
                "the left lower corner is not lower than the right upper corner",
            ));
        }

        Viewport::new(
            (leftlower + rightupper) / 2.0,
            (rightupper.re - leftlower.re) / 2.0,
            (rightupper.im - leftlower.im) / 2.0,
            width,
            height,
        )
    }

    /// The center of the region on the complex plane.
    pub fn center(&self) -> Complex<f64> {
        self.center
    }

    /// Half the width of the region, in plane units.
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Half the height of the region, in plane units.
    pub fn half_height(&self) -> f64 {
        self.half_height
    }

    /// Pixel width of the grid.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pixel height of the grid.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The total number of points in the integral grid.  Used to
    /// calculate memory needs.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// A validated viewport always has at least one pixel; this exists
    /// to keep `len` company.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The distance between neighbouring sample points, horizontally
    /// and vertically.
    fn steps(&self) -> (f64, f64) {
        (
            2.0 * self.half_width / (self.width as f64),
            2.0 * self.half_height / (self.height as f64),
        )
    }

    /// The left-lower and right-upper corners of the region.
    pub fn corners(&self) -> (Complex<f64>, Complex<f64>) {
        let extent = Complex::new(self.half_width, self.half_height);
        (self.center - extent, self.center + extent)
    }

    /// Given a pixel on the integral cartesian plane, return the complex
    /// number it samples.  The pixel at (width / 2, height / 2), using
    /// integer division, lands exactly on the center for any grid size.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        let (dre, dim) = self.steps();
        Complex::new(
            self.center.re + ((pixel.0 as f64) - ((self.width / 2) as f64)) * dre,
            self.center.im + ((pixel.1 as f64) - ((self.height / 2) as f64)) * dim,
        )
    }

    /// Given a complex number, find the pixel whose sample point is
    /// nearest to it, or nothing if it falls outside the grid.
    pub fn point_to_pixel(&self, point: &Complex<f64>) -> Option<Pixel> {
        let (dre, dim) = self.steps();
        let left = ((point.re - self.center.re) / dre).round() + ((self.width / 2) as f64);
        let top = ((point.im - self.center.im) / dim).round() + ((self.height / 2) as f64);
        if left < 0.0
            || left >= (self.width as f64)
            || top < 0.0
            || top >= (self.height as f64)
        {
            return None;
        }
        Some(Pixel(left as usize, top as usize))
    }

    /// Recenter on whatever lies under `pixel` and shrink both
    /// half-extents by `factor`.  A factor above one zooms in, below
    /// one zooms out.
    pub fn zoom_at(&self, pixel: &Pixel, factor: f64) -> Result<Viewport> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(Error::invalid_viewport(format!(
                "zoom factor must be positive, got {}",
                factor
            )));
        }
        if pixel.0 >= self.width || pixel.1 >= self.height {
            return Err(Error::invalid_viewport(format!(
                "zoom pixel ({}, {}) lies outside the {}x{} grid",
                pixel.0, pixel.1, self.width, self.height
            )));
        }
        Viewport::new(
            self.pixel_to_point(pixel),
            self.half_width / factor,
            self.half_height / factor,
            self.width,
            self.height,
        )
    }

    /// The same region of the complex plane, sampled at a different
    /// resolution.
    pub fn with_resolution(&self, width: usize, height: usize) -> Result<Viewport> {
        Viewport::new(self.center, self.half_width, self.half_height, width, height)
    }
}

/// Every pixel of a viewport mapped onto the complex plane, in
/// row-major order.  Built once per render and only read afterwards,
/// so any number of workers can share it.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleGrid {
    width: usize,
    height: usize,
    points: Vec<Complex<f64>>,
}

impl SampleGrid {
    /// Maps every pixel of the viewport.  Pure: the same viewport always
    /// produces the same grid, bit for bit.
    pub fn new(viewport: &Viewport) -> SampleGrid {
        let mut points = Vec::with_capacity(viewport.len());
        for row in 0..viewport.height() {
            for column in 0..viewport.width() {
                points.push(viewport.pixel_to_point(&Pixel(column, row)));
            }
        }
        SampleGrid {
            width: viewport.width(),
            height: viewport.height(),
            points,
        }
    }

    /// Pixel width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pixel height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True only for a grid with no samples, which a validated viewport
    /// cannot produce.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The sample for a given pixel.
    pub fn get(&self, pixel: &Pixel) -> Option<Complex<f64>> {
        if pixel.0 >= self.width || pixel.1 >= self.height {
            return None;
        }
        Some(self.points[pixel.1 * self.width + pixel.0])
    }

    /// All the samples, row-major.
    pub fn points(&self) -> &[Complex<f64>] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_fails_on_bad_shape() {
        let origin = Complex::new(0.0, 0.0);
        assert!(Viewport::new(origin, 1.0, 1.0, 0, 4).is_err());
        assert!(Viewport::new(origin, 1.0, 1.0, 4, 0).is_err());
        assert!(Viewport::new(origin, 0.0, 1.0, 4, 4).is_err());
        assert!(Viewport::new(origin, 1.0, -1.0, 4, 4).is_err());
        assert!(Viewport::new(origin, std::f64::NAN, 1.0, 4, 4).is_err());
        assert!(Viewport::new(Complex::new(std::f64::INFINITY, 0.0), 1.0, 1.0, 4, 4).is_err());
    }

    #[test]
    fn viewport_passes_on_good_shape() {
        let vp = Viewport::new(Complex::new(-0.5, 0.0), 1.5, 1.0, 4, 4);
        assert!(vp.is_ok());
    }

    #[test]
    fn bad_shape_is_reported_as_invalid_viewport() {
        match Viewport::new(Complex::new(0.0, 0.0), 1.0, 1.0, 0, 4) {
            Err(Error::InvalidViewport { .. }) => {}
            other => panic!("expected InvalidViewport, got {:?}", other),
        }
    }

    #[test]
    fn corners_fail_when_reversed() {
        let vp = Viewport::from_corners(Complex::new(1.0, 1.0), Complex::new(-1.0, -1.0), 4, 4);
        assert!(vp.is_err());
    }

    #[test]
    fn corners_round_trip() {
        let vp =
            Viewport::from_corners(Complex::new(-2.0, -1.5), Complex::new(1.0, 1.5), 800, 600)
                .unwrap();
        assert_eq!(vp.center(), Complex::new(-0.5, 0.0));
        assert_eq!(vp.half_width(), 1.5);
        assert_eq!(vp.half_height(), 1.5);
        assert_eq!(
            vp.corners(),
            (Complex::new(-2.0, -1.5), Complex::new(1.0, 1.5))
        );
    }

    #[test]
    fn center_pixel_is_center_point() {
        for &(w, h) in &[(4, 4), (5, 3), (1, 1), (800, 600), (799, 601)] {
            let vp = Viewport::new(Complex::new(-0.743, 0.131), 0.01, 0.02, w, h).unwrap();
            assert_eq!(vp.pixel_to_point(&Pixel(w / 2, h / 2)), vp.center());
        }
    }

    #[test]
    fn pixel_to_points_on_mixed_planes() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 2.0, 2.0, 4, 4).unwrap();
        assert_eq!(vp.pixel_to_point(&Pixel(2, 2)), Complex::new(0.0, 0.0));
        assert_eq!(vp.pixel_to_point(&Pixel(0, 0)), Complex::new(-2.0, -2.0));
        assert_eq!(vp.pixel_to_point(&Pixel(3, 3)), Complex::new(1.0, 1.0));
    }

    #[test]
    fn increasing_row_moves_up_the_imaginary_axis() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 1.0, 1.0, 10, 10).unwrap();
        let top = vp.pixel_to_point(&Pixel(5, 0));
        let bottom = vp.pixel_to_point(&Pixel(5, 9));
        assert!(top.im < bottom.im);
        assert_eq!(top.re, bottom.re);
    }

    #[test]
    fn point_to_pixel_on_mixed_planes() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 2.0, 2.0, 4, 4).unwrap();
        assert_eq!(vp.point_to_pixel(&Complex::new(0.0, 0.0)), Some(Pixel(2, 2)));
        assert_eq!(vp.point_to_pixel(&Complex::new(-2.0, -2.0)), Some(Pixel(0, 0)));
        assert_eq!(vp.point_to_pixel(&Complex::new(2.0, 2.0)), None);
        assert_eq!(vp.point_to_pixel(&Complex::new(-3.0, 0.0)), None);
    }

    #[test]
    fn point_to_pixel_inverts_pixel_to_point() {
        let vp = Viewport::new(Complex::new(-0.5, 0.1), 1.5, 1.1, 640, 480).unwrap();
        for &p in &[Pixel(0, 0), Pixel(320, 240), Pixel(639, 479), Pixel(17, 401)] {
            assert_eq!(vp.point_to_pixel(&vp.pixel_to_point(&p)), Some(p));
        }
    }

    #[test]
    fn zoom_recenters_and_shrinks() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 2.0, 2.0, 4, 4).unwrap();
        let zoomed = vp.zoom_at(&Pixel(3, 1), 2.0).unwrap();
        assert_eq!(zoomed.center(), Complex::new(1.0, -1.0));
        assert_eq!(zoomed.half_width(), 1.0);
        assert_eq!(zoomed.half_height(), 1.0);
        assert_eq!((zoomed.width(), zoomed.height()), (4, 4));

        let back = zoomed.zoom_at(&Pixel(2, 2), 0.5).unwrap();
        assert_eq!(back.half_width(), 2.0);
        assert_eq!(back.center(), zoomed.center());
    }

    #[test]
    fn zoom_rejects_nonsense() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 2.0, 2.0, 4, 4).unwrap();
        assert!(vp.zoom_at(&Pixel(1, 1), 0.0).is_err());
        assert!(vp.zoom_at(&Pixel(1, 1), -1.2).is_err());
        assert!(vp.zoom_at(&Pixel(4, 1), 1.2).is_err());
    }

    #[test]
    fn sample_grid_is_row_major() {
        let vp = Viewport::new(Complex::new(-0.5, 0.0), 1.5, 1.5, 4, 4).unwrap();
        let grid = SampleGrid::new(&vp);
        assert_eq!(grid.len(), 16);
        assert_eq!(grid.points()[0], Complex::new(-2.0, -1.5));
        assert_eq!(grid.points()[1], Complex::new(-1.25, -1.5));
        assert_eq!(grid.points()[4], Complex::new(-2.0, -0.75));
        assert_eq!(grid.get(&Pixel(2, 2)), Some(Complex::new(-0.5, 0.0)));
        assert_eq!(grid.get(&Pixel(4, 0)), None);
    }

    #[test]
    fn sample_grid_is_reproducible() {
        let vp = Viewport::new(Complex::new(-0.7436, 0.1318), 0.003, 0.002, 97, 53).unwrap();
        assert_eq!(SampleGrid::new(&vp), SampleGrid::new(&vp));
    }
}
