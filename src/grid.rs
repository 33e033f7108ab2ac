// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The ResultGrid: one IterationResult per pixel, in row-major order,
//! the sole output of a backend.  It owns its storage outright; nothing
//! in it borrows from the SampleGrid it was computed from.

use crate::escape::IterationResult;
use crate::planes::Pixel;

/// The W×H answer to a render.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultGrid {
    width: usize,
    height: usize,
    max_iter: u32,
    cells: Vec<IterationResult>,
}

impl ResultGrid {
    /// Wraps a finished buffer.
    ///
    /// # Panics
    ///
    /// If the buffer does not hold exactly width × height results.
    pub(crate) fn from_cells(
        width: usize,
        height: usize,
        max_iter: u32,
        cells: Vec<IterationResult>,
    ) -> ResultGrid {
        assert_eq!(cells.len(), width * height);
        ResultGrid {
            width,
            height,
            max_iter,
            cells,
        }
    }

    /// The grid a render with `max_iter` of zero produces: every pixel
    /// escaped, on iteration zero.
    pub fn degenerate(width: usize, height: usize) -> ResultGrid {
        ResultGrid::from_cells(
            width,
            height,
            0,
            vec![IterationResult::DEGENERATE; width * height],
        )
    }

    /// Pixel width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pixel height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The iteration cap every pixel was computed against.
    pub fn max_iter(&self) -> u32 {
        self.max_iter
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Never true for a grid computed from a validated viewport.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The result for a pixel, if it lies on the grid.
    pub fn get(&self, pixel: &Pixel) -> Option<&IterationResult> {
        if pixel.0 >= self.width || pixel.1 >= self.height {
            return None;
        }
        self.cells.get(pixel.1 * self.width + pixel.0)
    }

    /// All results, row-major.
    pub fn cells(&self) -> &[IterationResult] {
        &self.cells
    }

    /// Iterates over rows of results, top to bottom.
    pub fn rows(&self) -> std::slice::Chunks<'_, IterationResult> {
        self.cells.chunks(self.width)
    }

    /// Just the iteration counts, row-major.  Handy for comparing two
    /// grids computed by different backends.
    pub fn counts(&self) -> Vec<u32> {
        self.cells.iter().map(|r| r.count).collect()
    }

    /// How many pixels never escaped.
    pub fn interior_count(&self) -> usize {
        self.cells.iter().filter(|r| !r.escaped).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_grid_is_all_escaped() {
        let grid = ResultGrid::degenerate(3, 2);
        assert_eq!(grid.len(), 6);
        assert!(grid.cells().iter().all(|r| r.escaped && r.count == 0));
        assert_eq!(grid.interior_count(), 0);
    }

    #[test]
    fn lookup_is_row_major() {
        let cells = (0..6)
            .map(|i| IterationResult::from_count(i, 0.0, 10))
            .collect();
        let grid = ResultGrid::from_cells(3, 2, 10, cells);
        assert_eq!(grid.get(&Pixel(0, 0)).map(|r| r.count), Some(0));
        assert_eq!(grid.get(&Pixel(2, 0)).map(|r| r.count), Some(2));
        assert_eq!(grid.get(&Pixel(0, 1)).map(|r| r.count), Some(3));
        assert_eq!(grid.get(&Pixel(3, 0)), None);
        assert_eq!(grid.rows().count(), 2);
        assert_eq!(grid.counts(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    #[should_panic]
    fn mismatched_buffer_is_refused() {
        ResultGrid::from_cells(3, 3, 10, vec![IterationResult::default(); 8]);
    }
}
