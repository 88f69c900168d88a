// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel.

use num::Complex;

/// The squared radius past which an orbit is known to diverge.  We
/// compare against the squared magnitude so that no square root is
/// ever taken.
pub const ESCAPE_RADIUS_SQR: f64 = 4.0;

/// This is our classic iterator function.  Starting from zero, it
/// applies z <- z * z + c until the orbit leaves the radius-2 disk or
/// `limit` iterations have been performed, and returns the number of
/// iterations performed.  Points that never escape return `limit`.
///
/// Both the update and the magnitude test run in `f64`.
#[inline]
pub fn escape_time(c: Complex<f64>, limit: u32) -> u32 {
    let mut z = Complex {
        re: 0.0_f64,
        im: 0.0_f64,
    };
    for i in 0..limit {
        if z.norm_sqr() >= ESCAPE_RADIUS_SQR {
            return i;
        }
        z = z * z + c;
    }
    limit
}
