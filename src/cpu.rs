// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The multi-threaded CPU backend.
//!
//! The output buffer is cut into tiles: contiguous runs of pixels in
//! row-major order.  The tiles sit in a shared queue, and a fixed pool
//! of scoped worker threads pull them one at a time until the queue is
//! empty.  Each tile is a disjoint `&mut` slice of the output, so the
//! workers never contend for anything but the queue itself.
//!
//! Pixels inside the set cost `max_iter` iterations and pixels far
//! outside it cost one or two, so a fixed split of rows per thread
//! leaves most threads idle while one grinds through the cardioid.
//! Cutting the grid into several tiles per thread, and letting tiles
//! shrink below a single row when there are many threads, keeps them
//! all busy until the end.

use crossbeam::thread::ScopedJoinHandle;
use log::{debug, trace};
use num::traits::AsPrimitive;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::config::Precision;
use crate::engine::{Backend, CancelFlag};
use crate::errors::{Error, Result};
use crate::escape::{escape_run, IterationResult, Real};
use crate::grid::ResultGrid;
use crate::planes::SampleGrid;

/// How many tiles each thread should expect to process.
const TILES_PER_THREAD: usize = 8;

/// Tiles smaller than this are not worth the trip through the queue.
const MIN_TILE: usize = 64;

/// Renders on a pool of CPU threads.
#[derive(Copy, Clone, Debug)]
pub struct CpuBackend {
    threads: usize,
    precision: Precision,
}

impl CpuBackend {
    /// A backend with `threads` workers.  Zero is treated as one.
    pub fn new(threads: usize, precision: Precision) -> Self {
        CpuBackend {
            threads: threads.max(1),
            precision,
        }
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The tile length, in pixels, used for a grid of `pixels` pixels.
    pub fn tile_len(&self, pixels: usize) -> usize {
        let tiles = self.threads * TILES_PER_THREAD;
        let len = (pixels + tiles - 1) / tiles;
        len.max(MIN_TILE).min(pixels.max(1))
    }

    fn render_tiles<F>(
        &self,
        grid: &SampleGrid,
        cells: &mut [IterationResult],
        max_iter: u32,
        cancel: &CancelFlag,
    ) where
        F: Real,
        f64: AsPrimitive<F>,
    {
        let tile_len = self.tile_len(cells.len());
        let samples = grid.points();
        let tiles = Mutex::new(cells.chunks_mut(tile_len).enumerate());
        debug!(
            "cpu: {} pixels in tiles of {} on {} threads",
            samples.len(),
            tile_len,
            self.threads
        );

        crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<usize>> = (0..self.threads)
                .map(|_| {
                    let tiles = &tiles;
                    spawner.spawn(move |_| {
                        let mut done = 0;
                        while !cancel.is_cancelled() {
                            let tile = {
                                tiles
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .next()
                            };
                            match tile {
                                Some((index, out)) => {
                                    let start = index * tile_len;
                                    escape_run::<F>(
                                        &samples[start..start + out.len()],
                                        out,
                                        max_iter,
                                    );
                                    done += 1;
                                }
                                None => {
                                    break;
                                }
                            }
                        }
                        done
                    })
                })
                .collect();

            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(done) => trace!("cpu: worker {} finished {} tiles", worker, done),
                    Err(e) => std::panic::resume_unwind(e),
                }
            }
        })
        .unwrap_or_else(|e| std::panic::resume_unwind(e));
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn compute(
        &self,
        grid: &SampleGrid,
        max_iter: u32,
        cancel: &CancelFlag,
    ) -> Result<ResultGrid> {
        if cancel.is_cancelled() {
            return Err(Error::ComputationAborted);
        }

        let started = Instant::now();
        let mut cells = vec![IterationResult::default(); grid.len()];
        match self.precision {
            Precision::Single => self.render_tiles::<f32>(grid, &mut cells, max_iter, cancel),
            Precision::Double => self.render_tiles::<f64>(grid, &mut cells, max_iter, cancel),
        }

        if cancel.is_cancelled() {
            debug!("cpu: render abandoned after {:?}", started.elapsed());
            return Err(Error::ComputationAborted);
        }

        debug!("cpu: {} pixels in {:?}", grid.len(), started.elapsed());
        Ok(ResultGrid::from_cells(
            grid.width(),
            grid.height(),
            max_iter,
            cells,
        ))
    }
}
