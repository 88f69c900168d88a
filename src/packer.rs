// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Packs a field of escape counts into the narrowest sample width that
//! can hold the iteration cap.  Samples are kept in native byte order;
//! putting them on disk in the right order is the raster writer's job.

use std::mem;

use errors::{Error, Result};
use field::FieldBuffer;

/// Decides how many bytes each sample gets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WidthPolicy {
    /// One byte when the max value is at most 255, two otherwise.
    ByValue,
    /// Compares the size of a 16-bit integer against a byte instead of
    /// looking at the max value.  On every real platform that picks two
    /// bytes, whatever the cap.  Kept so the in-memory layout of older
    /// renders can be reproduced.
    Legacy,
}

impl Default for WidthPolicy {
    fn default() -> Self {
        WidthPolicy::ByValue
    }
}

impl WidthPolicy {
    /// Bytes per sample for a field whose counts never exceed `max_value`.
    pub fn sample_bytes(self, max_value: u32) -> usize {
        match self {
            WidthPolicy::ByValue => {
                if max_value <= u32::from(u8::max_value()) {
                    1
                } else {
                    2
                }
            }
            WidthPolicy::Legacy => {
                if mem::size_of::<i16>() <= 2 {
                    mem::size_of::<i16>()
                } else {
                    mem::size_of::<u8>()
                }
            }
        }
    }
}

/// A packed field.  The width is chosen once, when packing, and every
/// later access goes through the variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodedImage {
    /// One byte per sample.
    Narrow(Vec<u8>),
    /// Two bytes per sample, native byte order.
    Wide(Vec<u16>),
}

impl EncodedImage {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match *self {
            EncodedImage::Narrow(ref samples) => samples.len(),
            EncodedImage::Wide(ref samples) => samples.len(),
        }
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per sample.
    pub fn sample_bytes(&self) -> usize {
        match *self {
            EncodedImage::Narrow(_) => mem::size_of::<u8>(),
            EncodedImage::Wide(_) => mem::size_of::<u16>(),
        }
    }

    /// The sample at `offset`, widened.
    pub fn get(&self, offset: usize) -> Option<u32> {
        match *self {
            EncodedImage::Narrow(ref samples) => samples.get(offset).map(|&s| u32::from(s)),
            EncodedImage::Wide(ref samples) => samples.get(offset).map(|&s| u32::from(s)),
        }
    }

    /// Every sample, widened, in order.
    pub fn samples<'a>(&'a self) -> Box<dyn Iterator<Item = u32> + 'a> {
        match *self {
            EncodedImage::Narrow(ref samples) => Box::new(samples.iter().map(|&s| u32::from(s))),
            EncodedImage::Wide(ref samples) => Box::new(samples.iter().map(|&s| u32::from(s))),
        }
    }

    /// Decodes back into escape counts.
    pub fn to_counts(&self) -> Vec<u32> {
        self.samples().collect()
    }
}

/// Chooses a sample width and encodes a field with it.
#[derive(Copy, Clone, Debug, Default)]
pub struct IntensityPacker {
    policy: WidthPolicy,
}

impl IntensityPacker {
    /// A packer following `policy`.
    pub fn new(policy: WidthPolicy) -> Self {
        IntensityPacker { policy }
    }

    /// Consumes the field and packs each count into the width the
    /// policy picks for `max_value`.  A max value beyond what 16 bits
    /// hold, or a count above the max value, is refused rather than
    /// truncated.
    pub fn pack(&self, field: FieldBuffer, max_value: u32) -> Result<EncodedImage> {
        if max_value > u32::from(u16::max_value()) {
            return Err(Error::InvalidGrid(format!(
                "A max value of {} does not fit a 16-bit sample.",
                max_value
            )));
        }
        let counts = field.into_counts();
        if let Some(&sample) = counts.iter().find(|&&c| c > max_value) {
            return Err(Error::SampleRange { sample, max_value });
        }
        Ok(match self.policy.sample_bytes(max_value) {
            1 => EncodedImage::Narrow(counts.into_iter().map(|c| c as u8).collect()),
            _ => EncodedImage::Wide(counts.into_iter().map(|c| c as u16).collect()),
        })
    }
}
