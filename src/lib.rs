#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sharded Mandelbrot renderer
//!
//! The Mandelbrot set takes a point c on the complex plane and
//! repeatedly squares a number and adds c to it, starting from zero,
//! counting how many steps it takes before that number runs off
//! towards infinity.  That count is the grey level of the pixel; points
//! that never run off get the iteration cap.
//!
//! The image is split by columns across a group of workers, each of
//! which may be a separate process.  Every worker takes a contiguous
//! slab of columns (the shard), fills it using several threads, packs
//! the counts into 8- or 16-bit samples, and writes its own graymap.
//! Workers share nothing but the run parameters, so no messages pass
//! between them, and the shards line up column for column with what a
//! single worker would have drawn.

extern crate crossbeam;
#[macro_use]
extern crate failure;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate tempfile;

pub mod config;
pub mod errors;
pub mod escape;
pub mod field;
pub mod packer;
pub mod partition;
pub mod pgm;
pub mod planes;
pub mod worker;

pub use config::Config;
pub use errors::{Error, Result};
pub use escape::escape_time;
pub use field::{FieldBuffer, FieldComputer, Schedule};
pub use packer::{EncodedImage, IntensityPacker, WidthPolicy};
pub use partition::{partition, Shard};
pub use planes::{Anchor, GlobalGrid, PlaneMapper, Region};
pub use worker::WorkerContext;
