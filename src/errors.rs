// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Everything that can stop a worker.  There is no recovery anywhere
//! in the pipeline: every one of these ends the worker that raised it.

use std::io;
use std::result;

/// The crate's error type.
#[derive(Debug, Fail)]
pub enum Error {
    /// The two corners do not describe a rectangle with positive area.
    #[fail(display = "Invalid region: {}", _0)]
    InvalidRegion(String),

    /// The integral grid or iteration cap is unusable.
    #[fail(display = "Invalid grid: {}", _0)]
    InvalidGrid(String),

    /// A worker was started with a rank its group does not contain.
    #[fail(display = "Worker rank {} is outside a group of {} workers", rank, size)]
    Rank {
        /// The rank the worker was given.
        rank: usize,
        /// The number of workers in the group.
        size: usize,
    },

    /// The launcher environment held a rank or size that is not a number.
    #[fail(display = "Could not parse {}={:?} from the launcher environment", _0, _1)]
    Environment(String, String),

    /// The field buffer for a shard could not be allocated.
    #[fail(display = "Could not allocate a field of {} pixels", _0)]
    Allocation(usize),

    /// One of the compute lanes panicked before the join.
    #[fail(display = "A compute lane panicked while filling the field")]
    LanePanic,

    /// A raster file could not be created, written or read.
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] io::Error),

    /// A raster file did not parse as a binary graymap.
    #[fail(display = "Malformed raster: {}", _0)]
    Malformed(String),

    /// A sample is larger than the max value declared for its raster.
    #[fail(display = "Sample {} exceeds the declared max value {}", sample, max_value)]
    SampleRange {
        /// The offending sample.
        sample: u32,
        /// The max value the raster declares.
        max_value: u32,
    },

    /// The number of encoded samples does not match width times height.
    #[fail(display = "Encoded image holds {} samples, but {}x{} was requested", len, width, height)]
    Dimensions {
        /// Samples present.
        len: usize,
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = result::Result<T, Error>;
