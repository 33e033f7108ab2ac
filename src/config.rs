// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Render configuration.  Everything a render needs besides the
//! viewport and the iteration cap is carried in a `RenderConfig` value
//! handed to the renderer; there is no module-level state.

use crate::palette::Palette;
use std::fmt;
use std::str::FromStr;

/// Which execution strategy evaluates the kernel across the grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Scoped worker threads, one tile at a time.
    Cpu,
    /// A single compute dispatch on whatever adapter wgpu finds.
    Gpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(BackendKind::Cpu),
            "gpu" => Ok(BackendKind::Gpu),
            _ => Err(format!("Unknown backend '{}', expected cpu or gpu", s)),
        }
    }
}

/// The float width the kernel iterates in.  Two backends agree on
/// every iteration count only when they run at the same precision.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precision {
    /// f32
    Single,
    /// f64
    Double,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Precision::Single => write!(f, "single"),
            Precision::Double => write!(f, "double"),
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "f32" => Ok(Precision::Single),
            "double" | "f64" => Ok(Precision::Double),
            _ => Err(format!("Unknown precision '{}', expected single or double", s)),
        }
    }
}

/// The knobs of a render.  Build one with `Default` and adjust what you
/// need.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// CPU or GPU.
    pub backend: BackendKind,
    /// Float width of the kernel.
    pub precision: Precision,
    /// Worker threads for the CPU backend.  Ignored by the GPU.
    pub threads: usize,
    /// How iteration counts become colors.
    pub palette: Palette,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            backend: BackendKind::Cpu,
            precision: Precision::Double,
            threads: num_cpus::get(),
            palette: Palette::Banded,
        }
    }
}
