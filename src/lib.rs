#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot renderer
//!
//! The Mandelbrot set is the set of points c on the complex plane for
//! which the iteration z ← z² + c, started at zero, stays bounded.
//! Outside the set the iteration runs off to infinity, and how many
//! steps it takes to pass a radius of two (the "escape time") is the
//! number used to color the image.
//!
//! A render runs in one direction: a `Viewport` is mapped to a
//! `SampleGrid` of complex points, a `Backend` runs the escape-time
//! kernel over every point to produce a `ResultGrid`, and a `Palette`
//! turns that into a `ColorGrid`.  Every pixel is independent of every
//! other, so the backends parallelize across pixels: the CPU backend
//! over a pool of threads, the GPU backend over a compute dispatch.
//! Zooming or panning just starts the pipeline again with a new
//! viewport.

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate log;
extern crate num;
extern crate num_cpus;

#[cfg(feature = "gpu")]
extern crate bytemuck;
#[cfg(feature = "gpu")]
extern crate pollster;
#[cfg(feature = "gpu")]
extern crate wgpu;

pub mod config;
pub mod cpu;
pub mod engine;
pub mod errors;
pub mod escape;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod grid;
pub mod palette;
pub mod planes;
pub mod zoom;

pub use config::{BackendKind, Precision, RenderConfig};
pub use cpu::CpuBackend;
pub use engine::{
    backend_for, compute_grid, Backend, CancelFlag, RenderJob, RenderRequest, Renderer,
};
pub use errors::{Error, Result};
pub use escape::{escape_time, IterationResult};
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;
pub use grid::ResultGrid;
pub use palette::{colorize, ColorGrid, Palette};
pub use planes::{Pixel, SampleGrid, Viewport};
pub use zoom::{ZoomStep, MAX_ZOOM_ITERATIONS, ZOOM_FACTOR};
