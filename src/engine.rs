// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time engine: the seam between the kernel and the
//! backends that run it, plus the pipeline that takes a viewport all
//! the way to a finished image.
//!
//! A backend is chosen once, when the `Renderer` is built, so a GPU
//! device is set up a single time and reused for every render.  If the
//! backend cannot be brought up the renderer refuses to exist; picking
//! a different one is the caller's decision.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::{BackendKind, RenderConfig};
use crate::cpu::CpuBackend;
use crate::errors::{Error, Result};
use crate::grid::ResultGrid;
use crate::palette::{colorize, ColorGrid};
use crate::planes::{SampleGrid, Viewport};

/// A coarse-grained stop button for a render.  Clones share the same
/// flag.  Backends look at it between units of work, never inside the
/// per-pixel loop, so a raised flag takes effect within one tile.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, lowered flag.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Raise the flag.  Every render watching it gives up at its next
    /// check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An execution strategy for the kernel.  Implementations must write
/// each pixel's result at that pixel's offset, whatever order the work
/// completes in, and must return `ComputationAborted` rather than a
/// partial grid when the flag is raised.
pub trait Backend: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Evaluate every sample in the grid.
    fn compute(&self, grid: &SampleGrid, max_iter: u32, cancel: &CancelFlag)
        -> Result<ResultGrid>;
}

/// Runs a backend over a sample grid.  A cap of zero iterations never
/// reaches the backend: every pixel is reported as escaped on
/// iteration zero.
pub fn compute_grid(
    grid: &SampleGrid,
    max_iter: u32,
    backend: &dyn Backend,
    cancel: &CancelFlag,
) -> Result<ResultGrid> {
    if cancel.is_cancelled() {
        return Err(Error::ComputationAborted);
    }
    if max_iter == 0 {
        return Ok(ResultGrid::degenerate(grid.width(), grid.height()));
    }
    backend.compute(grid, max_iter, cancel)
}

/// Builds the backend a configuration asks for.  Fails with
/// `BackendUnavailable` if it cannot be brought up; there is no
/// fallback here.
pub fn backend_for(config: &RenderConfig) -> Result<Arc<dyn Backend>> {
    match config.backend {
        BackendKind::Cpu => Ok(Arc::new(CpuBackend::new(config.threads, config.precision))),
        BackendKind::Gpu => gpu_backend(config),
    }
}

#[cfg(feature = "gpu")]
fn gpu_backend(config: &RenderConfig) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(crate::gpu::GpuBackend::new(config.precision)?))
}

#[cfg(not(feature = "gpu"))]
fn gpu_backend(_config: &RenderConfig) -> Result<Arc<dyn Backend>> {
    Err(Error::backend_unavailable(
        "gpu",
        "built without the gpu feature",
    ))
}

/// One render: what to look at, and how hard.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// The region and resolution.
    pub viewport: Viewport,
    /// The iteration cap shared by every pixel.
    pub max_iter: u32,
}

/// The whole pipeline: viewport to sample grid to result grid to
/// colors.
#[derive(Clone)]
pub struct Renderer {
    config: RenderConfig,
    backend: Arc<dyn Backend>,
}

impl Renderer {
    /// Brings up the backend named by `config`.
    pub fn new(config: RenderConfig) -> Result<Self> {
        let backend = backend_for(&config)?;
        info!(
            "renderer ready: {} backend, {} precision",
            backend.name(),
            config.precision
        );
        Ok(Renderer { config, backend })
    }

    /// A renderer around a backend built elsewhere.
    pub fn with_backend(config: RenderConfig, backend: Arc<dyn Backend>) -> Self {
        Renderer { config, backend }
    }

    /// The configuration this renderer was built with.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Compute iteration results for a viewport.
    pub fn compute(
        &self,
        viewport: &Viewport,
        max_iter: u32,
        cancel: &CancelFlag,
    ) -> Result<ResultGrid> {
        let started = Instant::now();
        let grid = SampleGrid::new(viewport);
        let result = compute_grid(&grid, max_iter, self.backend.as_ref(), cancel)?;
        debug!(
            "{}x{} at {} iterations on {} in {:?}",
            viewport.width(),
            viewport.height(),
            max_iter,
            self.backend.name(),
            started.elapsed()
        );
        Ok(result)
    }

    /// Compute and color a viewport with the configured palette.
    pub fn render(
        &self,
        viewport: &Viewport,
        max_iter: u32,
        cancel: &CancelFlag,
    ) -> Result<ColorGrid> {
        let result = self.compute(viewport, max_iter, cancel)?;
        Ok(colorize(&result, self.config.palette))
    }

    /// Start a render on a background thread.  The returned job can be
    /// cancelled while it runs and joined for its result.
    pub fn spawn(&self, request: RenderRequest) -> RenderJob {
        let cancel = CancelFlag::new();
        let renderer = self.clone();
        let flag = cancel.clone();
        let handle = thread::spawn(move || {
            renderer.compute(&request.viewport, request.max_iter, &flag)
        });
        RenderJob { cancel, handle }
    }
}

/// A render running on its own thread.
pub struct RenderJob {
    cancel: CancelFlag,
    handle: JoinHandle<Result<ResultGrid>>,
}

impl RenderJob {
    /// Ask the render to stop.  It will finish with
    /// `ComputationAborted` unless it had already completed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the background thread has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the render and take its result.
    pub fn join(self) -> Result<ResultGrid> {
        match self.handle.join() {
            Ok(result) => result,
            Err(e) => std::panic::resume_unwind(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Precision;
    use crate::escape::IterationResult;
    use crate::planes::Pixel;
    use num::Complex;
    use std::sync::atomic::AtomicUsize;

    /// Counts how often it is asked to do anything, and answers with a
    /// grid of zeros.
    #[derive(Default)]
    struct Recording(AtomicUsize);

    impl Backend for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn compute(
            &self,
            grid: &SampleGrid,
            max_iter: u32,
            _cancel: &CancelFlag,
        ) -> Result<ResultGrid> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ResultGrid::from_cells(
                grid.width(),
                grid.height(),
                max_iter,
                vec![IterationResult::from_count(0, 0.0, max_iter); grid.len()],
            ))
        }
    }

    fn cpu_renderer() -> Renderer {
        Renderer::new(RenderConfig {
            threads: 3,
            ..RenderConfig::default()
        })
        .unwrap()
    }

    fn classic(width: usize, height: usize) -> Viewport {
        Viewport::new(Complex::new(-0.5, 0.0), 1.5, 1.5, width, height).unwrap()
    }

    #[test]
    fn zero_iterations_skip_the_backend() {
        let backend = Recording::default();
        let grid = SampleGrid::new(&classic(4, 4));
        let result = compute_grid(&grid, 0, &backend, &CancelFlag::new()).unwrap();
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);
        assert!(result.cells().iter().all(|r| r.escaped && r.count == 0));
    }

    #[test]
    fn raised_flag_stops_before_the_backend() {
        let backend = Recording::default();
        let grid = SampleGrid::new(&classic(4, 4));
        let cancel = CancelFlag::new();
        cancel.clone().cancel();
        assert!(cancel.is_cancelled());
        let result = compute_grid(&grid, 10, &backend, &cancel);
        assert_eq!(result, Err(Error::ComputationAborted));
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn the_classic_four_by_four() {
        let result = cpu_renderer()
            .compute(&classic(4, 4), 50, &CancelFlag::new())
            .unwrap();
        for corner in &[Pixel(0, 0), Pixel(3, 0), Pixel(0, 3), Pixel(3, 3)] {
            let r = result.get(corner).unwrap();
            assert!(r.escaped, "{:?} did not escape", corner);
            assert!(r.count < 10, "{:?} took {}", corner, r.count);
        }
        let middle = result.get(&Pixel(2, 2)).unwrap();
        assert!(!middle.escaped);
        assert_eq!(middle.count, 50);
    }

    #[test]
    fn rendering_twice_is_identical() {
        let renderer = cpu_renderer();
        let vp = classic(64, 48);
        let a = renderer.compute(&vp, 300, &CancelFlag::new()).unwrap();
        let b = renderer.compute(&vp, 300, &CancelFlag::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn render_produces_an_image_of_the_right_size() {
        let image = cpu_renderer()
            .render(&classic(20, 10), 64, &CancelFlag::new())
            .unwrap();
        assert_eq!(image.dimensions(), (20, 10));
    }

    #[test]
    fn injected_backends_are_used() {
        let backend = Arc::new(Recording::default());
        let renderer = Renderer::with_backend(RenderConfig::default(), backend.clone());
        assert_eq!(renderer.backend_name(), "recording");
        renderer.compute(&classic(4, 4), 10, &CancelFlag::new()).unwrap();
        assert_eq!(backend.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn background_job_completes() {
        let job = cpu_renderer().spawn(RenderRequest {
            viewport: classic(32, 32),
            max_iter: 100,
        });
        let result = job.join().unwrap();
        assert_eq!(result.len(), 32 * 32);
        assert_eq!(result.max_iter(), 100);
    }

    #[test]
    fn cancelled_job_is_aborted_or_finished() {
        let renderer = Renderer::new(RenderConfig {
            threads: 2,
            precision: Precision::Double,
            ..RenderConfig::default()
        })
        .unwrap();
        let job = renderer.spawn(RenderRequest {
            viewport: classic(400, 400),
            max_iter: 20_000,
        });
        job.cancel();
        match job.join() {
            Err(Error::ComputationAborted) => {}
            Ok(grid) => assert_eq!(grid.len(), 400 * 400),
            Err(e) => panic!("unexpected error {}", e),
        }
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn gpu_without_the_feature_is_unavailable() {
        let config = RenderConfig {
            backend: BackendKind::Gpu,
            ..RenderConfig::default()
        };
        match Renderer::new(config) {
            Err(Error::BackendUnavailable { .. }) => {}
            _ => panic!("expected BackendUnavailable"),
        }
    }
}
