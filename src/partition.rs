// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Splits the columns of the global grid into contiguous shards, one
//! per worker.  Rows are never split: every shard spans the full
//! height of the grid.

use std::ops::Range;

/// A worker's slice of the global grid: the contiguous column range
/// `[col_start, col_start + width)`.  The row extent is always the full
/// height of the grid, so it isn't stored here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shard {
    /// The rank of the worker that owns this shard.
    pub rank: usize,
    /// The number of workers the grid was split across.
    pub workers: usize,
    /// The first global column of the shard.
    pub col_start: usize,
    /// The number of columns in the shard.  May be zero when there
    /// are more workers than columns.
    pub width: usize,
}

impl Shard {
    /// The global columns this shard covers.
    pub fn columns(&self) -> Range<usize> {
        self.col_start..self.col_start + self.width
    }

    /// True when the shard received no columns at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }
}

/// Given the width of the grid and the size of the worker group,
/// returns the shard belonging to `rank`.  The first `columns %
/// workers` ranks receive one extra column, so no two shards differ in
/// width by more than one.
///
/// # Panics
///
/// `workers` must be positive and `rank` must lie inside the group;
/// anything else is a programming error, not a runtime condition.
pub fn partition(columns: usize, workers: usize, rank: usize) -> Shard {
    assert!(workers > 0, "cannot partition a grid across zero workers");
    assert!(
        rank < workers,
        "rank {} is outside a group of {} workers",
        rank,
        workers
    );

    let base = columns / workers;
    let remainder = columns % workers;
    Shard {
        rank,
        workers,
        col_start: rank * base + rank.min(remainder),
        width: if rank < remainder { base + 1 } else { base },
    }
}

/// Every shard of the group, in rank order.
pub fn shards(columns: usize, workers: usize) -> impl Iterator<Item = Shard> {
    (0..workers).map(move |rank| partition(columns, workers, rank))
}
