// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turns a ResultGrid into pixels.  Every scheme here is a pure
//! function of one IterationResult and the grid's iteration cap, and
//! every scheme paints the interior of the set black.

use crate::escape::IterationResult;
use crate::grid::ResultGrid;
use image::{Rgb, RgbImage};
use std::fmt;
use std::str::FromStr;

/// A W×H RGB image, ready to hand to a display or an encoder.
pub type ColorGrid = RgbImage;

const INTERIOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Bands per trip around the smooth gradient.
const SMOOTH_CYCLE: f64 = 64.0;

const GRADIENT: [[f64; 3]; 5] = [
    [0.0, 7.0, 100.0],
    [32.0, 107.0, 203.0],
    [237.0, 255.0, 255.0],
    [255.0, 170.0, 0.0],
    [0.0, 2.0, 0.0],
];

/// The coloring schemes on offer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Palette {
    /// Three channels cycling at different rates:
    /// (n mod 256, 5n mod 256, 13n mod 256).
    Banded,
    /// A linear ramp from black at zero iterations to white at the cap.
    Grayscale,
    /// Continuous coloring that uses |z|² at escape to blend between
    /// neighbouring bands.
    Smooth,
}

impl Palette {
    /// The color of a single result.
    pub fn color(self, result: &IterationResult, max_iter: u32) -> Rgb<u8> {
        if !result.escaped {
            return INTERIOR;
        }
        let n = result.count;
        match self {
            Palette::Banded => Rgb([
                (n % 256) as u8,
                (n.wrapping_mul(5) % 256) as u8,
                (n.wrapping_mul(13) % 256) as u8,
            ]),
            Palette::Grayscale => {
                let v = if max_iter == 0 {
                    0
                } else {
                    (u64::from(n) * 255 / u64::from(max_iter)) as u8
                };
                Rgb([v, v, v])
            }
            Palette::Smooth => gradient(continuous_count(result)),
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Palette::Banded => write!(f, "banded"),
            Palette::Grayscale => write!(f, "grayscale"),
            Palette::Smooth => write!(f, "smooth"),
        }
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "banded" => Ok(Palette::Banded),
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(Palette::Grayscale),
            "smooth" => Ok(Palette::Smooth),
            _ => Err(format!(
                "Unknown palette '{}', expected banded, grayscale or smooth",
                s
            )),
        }
    }
}

/// The normalized iteration count, n + 1 - log2(ln |z|).  Falls back to
/// the plain count when |z| is too small for the logarithms to mean
/// anything, which only happens for degenerate results.
pub fn continuous_count(result: &IterationResult) -> f64 {
    let n = f64::from(result.count);
    if result.modulus_sq <= 1.0 {
        return n;
    }
    let log_modulus = result.modulus_sq.ln() / 2.0;
    n + 1.0 - log_modulus.log2()
}

fn gradient(mu: f64) -> Rgb<u8> {
    let position = (mu / SMOOTH_CYCLE).rem_euclid(1.0) * (GRADIENT.len() as f64);
    let index = (position.floor() as usize) % GRADIENT.len();
    let frac = position - position.floor();
    let (from, to) = (GRADIENT[index], GRADIENT[(index + 1) % GRADIENT.len()]);
    let lerp = |c: usize| (from[c] + (to[c] - from[c]) * frac).round().max(0.0).min(255.0) as u8;
    Rgb([lerp(0), lerp(1), lerp(2)])
}

/// Paints a whole grid.
pub fn colorize(grid: &ResultGrid, palette: Palette) -> ColorGrid {
    let max_iter = grid.max_iter();
    let width = grid.width();
    let cells = grid.cells();
    RgbImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        palette.color(&cells[(y as usize) * width + (x as usize)], max_iter)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(count: u32, modulus_sq: f64) -> IterationResult {
        IterationResult {
            count,
            escaped: true,
            modulus_sq,
        }
    }

    #[test]
    fn interior_is_black_everywhere() {
        let inside = IterationResult::from_count(100, 0.25, 100);
        for p in &[Palette::Banded, Palette::Grayscale, Palette::Smooth] {
            assert_eq!(p.color(&inside, 100), INTERIOR);
        }
    }

    #[test]
    fn banded_channels_cycle() {
        assert_eq!(Palette::Banded.color(&escaped(1, 9.0), 256), Rgb([1, 5, 13]));
        assert_eq!(Palette::Banded.color(&escaped(20, 9.0), 256), Rgb([20, 100, 4]));
        assert_eq!(Palette::Banded.color(&escaped(256, 9.0), 512), Rgb([0, 0, 0]));
    }

    #[test]
    fn grayscale_ramps_with_count() {
        assert_eq!(Palette::Grayscale.color(&escaped(0, 0.0), 100), Rgb([0, 0, 0]));
        assert_eq!(Palette::Grayscale.color(&escaped(50, 5.0), 100), Rgb([127, 127, 127]));
        assert_eq!(Palette::Grayscale.color(&escaped(99, 5.0), 100), Rgb([252, 252, 252]));
        assert_eq!(Palette::Grayscale.color(&IterationResult::DEGENERATE, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn continuous_count_lies_between_bands() {
        // Escaping with |z|² = 4 exactly gives log2(ln 2) ≈ -0.53.
        let mu = continuous_count(&escaped(10, 4.0));
        assert!(mu > 11.0 && mu < 12.0, "mu = {}", mu);
        // A bigger modulus pulls the value back towards the count.
        assert!(continuous_count(&escaped(10, 1e6)) < mu);
        assert_eq!(continuous_count(&IterationResult::DEGENERATE), 0.0);
    }

    #[test]
    fn smooth_is_deterministic_and_bounded() {
        for &(n, m) in &[(1, 9.0), (7, 4.5), (300, 1e9), (3, 1e300)] {
            let a = Palette::Smooth.color(&escaped(n, m), 500);
            let b = Palette::Smooth.color(&escaped(n, m), 500);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn gradient_starts_at_first_stop() {
        assert_eq!(gradient(0.0), Rgb([0, 7, 100]));
        assert_eq!(gradient(SMOOTH_CYCLE), Rgb([0, 7, 100]));
    }

    #[test]
    fn colorize_keeps_the_layout() {
        let cells = vec![
            escaped(1, 9.0),
            IterationResult::from_count(8, 0.0, 8),
            escaped(2, 9.0),
            escaped(3, 9.0),
        ];
        let grid = ResultGrid::from_cells(2, 2, 8, cells);
        let image = colorize(&grid, Palette::Banded);
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(*image.get_pixel(0, 0), Rgb([1, 5, 13]));
        assert_eq!(*image.get_pixel(1, 0), INTERIOR);
        assert_eq!(*image.get_pixel(0, 1), Rgb([2, 10, 26]));
    }

    #[test]
    fn palettes_parse() {
        assert_eq!("Smooth".parse::<Palette>(), Ok(Palette::Smooth));
        assert_eq!("grey".parse::<Palette>(), Ok(Palette::Grayscale));
        assert!("plaid".parse::<Palette>().is_err());
    }
}
