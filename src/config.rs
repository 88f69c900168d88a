// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run parameters, shared read-only by every lane of a worker.

use std::path::PathBuf;

use num_cpus;

use field::Schedule;
use packer::WidthPolicy;
use planes::{Anchor, GlobalGrid, Region};

/// File name prefix used when none is given.
pub const DEFAULT_PREFIX: &str = "mandelbrot";

/// Everything a worker needs to render and write its shard.
#[derive(Clone, Debug)]
pub struct Config {
    /// The rectangle of the complex plane being rendered.
    pub region: Region,
    /// Global image dimensions and iteration cap.
    pub grid: GlobalGrid,
    /// Compute lanes per worker.
    pub lanes: usize,
    /// How pixels are divided among lanes.
    pub schedule: Schedule,
    /// Where each shard starts on the real axis.
    pub anchor: Anchor,
    /// How the sample width is chosen.
    pub width_policy: WidthPolicy,
    /// Directory the raster files go into.
    pub output_dir: PathBuf,
    /// Raster file name prefix; the rank is appended.
    pub prefix: String,
}

impl Config {
    /// A configuration with one lane per CPU, the static schedule,
    /// global anchoring, value-based widths, and files named
    /// `mandelbrot_<rank>.pgm` in the current directory.
    pub fn new(region: Region, grid: GlobalGrid) -> Config {
        Config {
            region,
            grid,
            lanes: num_cpus::get(),
            schedule: Schedule::default(),
            anchor: Anchor::default(),
            width_policy: WidthPolicy::default(),
            output_dir: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}
