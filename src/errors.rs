// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The three ways a render can fail.  None of them are retried inside
//! the engine: the computation is deterministic, so the only useful
//! recovery (picking another backend, asking for new parameters)
//! belongs to whoever called us.

use failure::Fail;

/// Everything the renderer can report back to its caller.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum Error {
    /// The viewport had a non-positive or non-finite extent, a zero pixel
    /// dimension, or a zoom factor that made no sense.  Raised before
    /// any computation starts.
    #[fail(display = "invalid viewport: {}", reason)]
    InvalidViewport {
        /// What was wrong with it.
        reason: String,
    },

    /// The requested backend could not be brought up.  The engine never
    /// falls back on its own.
    #[fail(display = "{} backend unavailable: {}", backend, reason)]
    BackendUnavailable {
        /// Which backend was asked for.
        backend: String,
        /// Why it could not be used.
        reason: String,
    },

    /// The cancellation flag was raised while the render was running.
    /// Whatever had been computed is thrown away.
    #[fail(display = "computation aborted")]
    ComputationAborted,
}

impl Error {
    pub(crate) fn invalid_viewport<S: Into<String>>(reason: S) -> Self {
        Error::InvalidViewport {
            reason: reason.into(),
        }
    }

    pub(crate) fn backend_unavailable<S: Into<String>>(backend: &str, reason: S) -> Self {
        Error::BackendUnavailable {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
