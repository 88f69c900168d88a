// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between one worker's shard of the integral plane and the matching
//! rectangle of the complex plane.  The global integral plane has its
//! origin at 0,0; the complex plane has an arbitrary pair of corners
//! defining its leftlower and rightupper corners.

use num::Complex;

use errors::{Error, Result};
use partition::Shard;

/// The largest iteration cap a grid accepts.  Every escape count must
/// fit a 16-bit graymap sample.
pub const MAX_LIMIT: u32 = 65535;

/// The leftlower and rightupper corners of the complex plane, treating
/// the real part of each value as the x-component and the imaginary
/// part as the y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Region {
    /// The corner with the smallest real and imaginary parts.
    pub leftlower: Complex<f64>,
    /// The corner with the largest real and imaginary parts.
    pub rightupper: Complex<f64>,
}

impl Region {
    /// Both corners must be finite, and the leftlower corner must lie
    /// strictly to the left of and strictly below the rightupper one.
    pub fn new(leftlower: Complex<f64>, rightupper: Complex<f64>) -> Result<Region> {
        if !(leftlower.re.is_finite()
            && leftlower.im.is_finite()
            && rightupper.re.is_finite()
            && rightupper.im.is_finite())
        {
            return Err(Error::InvalidRegion(
                "The corners of the region must be finite.".to_string(),
            ));
        }

        if rightupper.re <= leftlower.re {
            return Err(Error::InvalidRegion(
                "The left lower corner is not to the left of the right upper corner.".to_string(),
            ));
        }

        if rightupper.im <= leftlower.im {
            return Err(Error::InvalidRegion(
                "The left lower corner is not lower than the right upper corner.".to_string(),
            ));
        }

        Ok(Region {
            leftlower,
            rightupper,
        })
    }

    /// Extent along the real axis.
    pub fn width(&self) -> f64 {
        self.rightupper.re - self.leftlower.re
    }

    /// Extent along the imaginary axis.
    pub fn height(&self) -> f64 {
        self.rightupper.im - self.leftlower.im
    }
}

/// The logical dimensions of the whole image and the iteration cap
/// shared by every worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalGrid {
    /// Columns in the full image, across all workers.
    pub width: usize,
    /// Rows in the full image; every shard has all of them.
    pub height: usize,
    /// The iteration cap, which is also the largest possible escape count.
    pub limit: u32,
}

impl GlobalGrid {
    /// Dimensions and cap must all be at least one, and the cap may not
    /// exceed `MAX_LIMIT`.
    pub fn new(width: usize, height: usize, limit: u32) -> Result<GlobalGrid> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGrid(format!(
                "The grid must be at least 1x1, not {}x{}.",
                width, height
            )));
        }
        if limit == 0 {
            return Err(Error::InvalidGrid(
                "The iteration cap must be at least 1.".to_string(),
            ));
        }
        if limit > MAX_LIMIT {
            return Err(Error::InvalidGrid(format!(
                "The iteration cap must be at most {}, not {}.",
                MAX_LIMIT, limit
            )));
        }
        Ok(GlobalGrid {
            width,
            height,
            limit,
        })
    }
}

/// Where a shard's first column sits on the real axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// At `x_L + col_start * dx`.  Shards line up exactly with the
    /// columns an unsplit render would produce.
    Global,
    /// At `x_L + rank * (x_R - x_L) / workers`, i.e. a proportional
    /// slice of the region.  Identical to `Global` when the worker count
    /// divides the grid width; drifts by a fraction of a column otherwise.
    RankProportional,
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::Global
    }
}

/// Describes the x, y of a pixel inside a shard.  `Pixel(0, 0)` is the
/// shard's first column and the grid's bottom row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps the pixels of one shard onto the complex plane.  The step
/// sizes always come from the global grid, never from the shard, so
/// that neighbouring shards meet without a gap or an overlap.
#[derive(Debug)]
pub struct PlaneMapper {
    /// The shard this mapper covers.
    pub shard: Shard,
    /// Rows in the shard (the full grid height).
    pub height: usize,
    // The width and height of a single pixel on the complex plane.
    grid_factors: (f64, f64),
    // x_L of the whole region.
    left: f64,
    // The complex coordinate of Pixel(0, 0).
    origin: Complex<f64>,
    anchor: Anchor,
}

impl PlaneMapper {
    /// Constructor.  Takes the region, the global grid, and the shard
    /// this worker owns.
    pub fn new(region: &Region, grid: &GlobalGrid, shard: Shard, anchor: Anchor) -> PlaneMapper {
        let grid_factors = (
            region.width() / (grid.width as f64),
            region.height() / (grid.height as f64),
        );

        let origin_re = match anchor {
            Anchor::Global => region.leftlower.re + (shard.col_start as f64) * grid_factors.0,
            Anchor::RankProportional => {
                region.leftlower.re + (shard.rank as f64) * region.width() / (shard.workers as f64)
            }
        };

        PlaneMapper {
            shard,
            height: grid.height,
            grid_factors,
            left: region.leftlower.re,
            origin: Complex::new(origin_re, region.leftlower.im),
            anchor,
        }
    }

    /// Columns in the shard.
    pub fn width(&self) -> usize {
        self.shard.width
    }

    /// The total number of points in the shard.  Used to calculate
    /// memory needs.
    pub fn len(&self) -> usize {
        self.shard.width * self.height
    }

    /// Describes that the shard is of no size.
    pub fn is_empty(&self) -> bool {
        self.shard.width == 0 || self.height == 0
    }

    /// The spacing between neighbouring pixels: (dx, dy).
    pub fn steps(&self) -> (f64, f64) {
        self.grid_factors
    }

    /// The complex coordinate of the shard's first pixel.
    pub fn origin(&self) -> Complex<f64> {
        self.origin
    }

    /// Given a pixel of the shard, return the complex number it samples.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        let re = match self.anchor {
            Anchor::Global => {
                self.left + ((self.shard.col_start + pixel.0) as f64) * self.grid_factors.0
            }
            Anchor::RankProportional => self.origin.re + (pixel.0 as f64) * self.grid_factors.0,
        };
        Complex::new(re, self.origin.im + (pixel.1 as f64) * self.grid_factors.1)
    }

    /// Pixels are stored row-major; this maps a linear offset back to
    /// its pixel.
    pub fn offset_to_pixel(&self, offset: usize) -> Pixel {
        Pixel(offset % self.shard.width, offset / self.shard.width)
    }
}
