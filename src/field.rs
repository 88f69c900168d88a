// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fills one worker's shard with escape counts.
//!
//! The shard's pixels are treated as a single flat, row-major index
//! space, so the way work is split across lanes does not depend on
//! whether the shard is tall and thin or short and wide.  Every pixel
//! reads only the immutable plane mapping and writes only its own cell,
//! so lanes never synchronise with one another; the scope join is the
//! only barrier.

use std::mem;
use std::sync::Mutex;

use crossbeam;

use errors::{Error, Result};
use escape::escape_time;
use partition::{shards, Shard};
use planes::PlaneMapper;

/// Pixels handed out at a time under the dynamic schedule.
pub const DEFAULT_CHUNK: usize = 256;

/// A row-major grid of escape counts, `width` columns by `height` rows.
/// Owned by exactly one worker.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBuffer {
    width: usize,
    height: usize,
    counts: Vec<u32>,
}

impl FieldBuffer {
    /// Allocates a zeroed buffer.  Allocation failure is reported
    /// rather than aborting the process outright.
    pub fn zeroed(width: usize, height: usize) -> Result<FieldBuffer> {
        let len = width
            .checked_mul(height)
            .ok_or(Error::Allocation(usize::max_value()))?;
        let mut counts: Vec<u32> = Vec::new();
        counts
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation(len))?;
        counts.resize(len, 0);
        Ok(FieldBuffer {
            width,
            height,
            counts,
        })
    }

    /// Wraps counts that were produced elsewhere, e.g. decoded from a
    /// raster.
    pub fn from_counts(width: usize, height: usize, counts: Vec<u32>) -> Result<FieldBuffer> {
        if width.checked_mul(height) != Some(counts.len()) {
            return Err(Error::Dimensions {
                len: counts.len(),
                width,
                height,
            });
        }
        Ok(FieldBuffer {
            width,
            height,
            counts,
        })
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True for a buffer with no cells, such as the field of a worker
    /// that received no columns.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The escape count at column `i`, row `j`.
    pub fn get(&self, i: usize, j: usize) -> Option<u32> {
        if i >= self.width || j >= self.height {
            return None;
        }
        self.counts.get(j * self.width + i).cloned()
    }

    /// The counts in row-major order.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Gives up the buffer, keeping only the counts.
    pub fn into_counts(self) -> Vec<u32> {
        self.counts
    }
}

/// How the flattened pixel space is divided among compute lanes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Each lane gets one contiguous run of pixels; run lengths differ by
    /// at most one.
    Static,
    /// Lanes repeatedly take the next run of this many pixels from a
    /// shared iterator until none are left.
    Dynamic(usize),
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Static
    }
}

/// Evaluates the escape-time kernel over every pixel of a shard using
/// a fixed number of compute lanes.
#[derive(Copy, Clone, Debug)]
pub struct FieldComputer {
    lanes: usize,
    schedule: Schedule,
}

impl FieldComputer {
    /// A computer using `lanes` threads (at least one) and the static
    /// schedule.
    pub fn new(lanes: usize) -> Self {
        FieldComputer {
            lanes: lanes.max(1),
            schedule: Schedule::Static,
        }
    }

    /// Replaces the schedule.
    pub fn with_schedule(self, schedule: Schedule) -> Self {
        FieldComputer { schedule, ..self }
    }

    /// Number of compute lanes.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Fills a freshly allocated buffer for the shard described by
    /// `plane`, running at most `limit` iterations per pixel.  An empty
    /// shard yields an empty buffer without spawning anything.
    pub fn compute(&self, plane: &PlaneMapper, limit: u32) -> Result<FieldBuffer> {
        let mut field = FieldBuffer::zeroed(plane.width(), plane.height)?;
        if field.is_empty() {
            return Ok(field);
        }

        match self.schedule {
            Schedule::Static => self.compute_static(plane, limit, &mut field.counts)?,
            Schedule::Dynamic(chunk) => {
                self.compute_dynamic(plane, limit, chunk.max(1), &mut field.counts)?
            }
        }
        Ok(field)
    }

    fn compute_static(&self, plane: &PlaneMapper, limit: u32, cells: &mut [u32]) -> Result<()> {
        let len = cells.len();
        debug!(
            "static schedule: {} pixels across {} lanes, {} or {} per lane",
            len,
            self.lanes.min(len),
            len / self.lanes,
            (len + self.lanes - 1) / self.lanes
        );
        let mut rest = cells;
        crossbeam::scope(|spawner| {
            for run in static_runs(len, self.lanes) {
                let (head, tail) = mem::replace(&mut rest, &mut []).split_at_mut(run.width);
                rest = tail;
                spawner.spawn(move |_| fill(plane, limit, run.col_start, head));
            }
        })
        .map_err(|_| Error::LanePanic)
    }

    fn compute_dynamic(
        &self,
        plane: &PlaneMapper,
        limit: u32,
        chunk: usize,
        cells: &mut [u32],
    ) -> Result<()> {
        debug!(
            "dynamic schedule: {} pixels in runs of {} across {} lanes",
            cells.len(),
            chunk,
            self.lanes
        );
        let runs = Mutex::new(cells.chunks_mut(chunk).enumerate());
        let runs = &runs;
        crossbeam::scope(|spawner| {
            for _ in 0..self.lanes {
                spawner.spawn(move |_| loop {
                    let run = { runs.lock().ok().and_then(|mut it| it.next()) };
                    match run {
                        Some((n, run)) => fill(plane, limit, n * chunk, run),
                        None => break,
                    }
                });
            }
        })
        .map_err(|_| Error::LanePanic)
    }
}

// The static schedule splits pixels among lanes exactly the way columns
// are split among workers: the first `len % lanes` lanes take one extra
// pixel, and lanes that would get nothing are not started.
fn static_runs(len: usize, lanes: usize) -> impl Iterator<Item = Shard> {
    shards(len, lanes).filter(|run| !run.is_empty())
}

// Evaluates a run of cells beginning at flat offset `start`.
fn fill(plane: &PlaneMapper, limit: u32, start: usize, run: &mut [u32]) {
    for (k, cell) in run.iter_mut().enumerate() {
        let pixel = plane.offset_to_pixel(start + k);
        *cell = escape_time(plane.pixel_to_point(&pixel), limit);
    }
}
