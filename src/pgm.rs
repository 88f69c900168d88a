// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Binary graymap (`P5`) files, one per worker.
//!
//! The header is the magic number, a comment, the width and height,
//! and the max value, each on its own line.  Samples follow
//! immediately: one byte each when the max value is at most 255, two
//! big-endian bytes otherwise.  The sample width on disk is dictated by
//! the max value alone, whatever width the image was packed with.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use errors::{Error, Result};
use packer::EncodedImage;

/// The magic number of a binary graymap.
pub const MAGIC: &str = "P5";

/// The largest max value the format allows.
pub const MAX_VALUE: u32 = 65535;

/// A raster read back from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// The max value from the header.
    pub max_value: u32,
    /// The samples, packed at the width the file used.
    pub image: EncodedImage,
}

/// The file a worker writes: `<dir>/<prefix>_<rank>.pgm`.  Names sort
/// by rank, which is also column order.
pub fn output_path<P: AsRef<Path>>(dir: P, prefix: &str, rank: usize) -> PathBuf {
    dir.as_ref().join(format!("{}_{}.pgm", prefix, rank))
}

/// Bytes per sample on disk for a given max value.
pub fn sample_bytes(max_value: u32) -> usize {
    if max_value > 255 {
        2
    } else {
        1
    }
}

/// Creates `path` and writes the image into it.
pub fn write_image<P: AsRef<Path>>(
    path: P,
    image: &EncodedImage,
    max_value: u32,
    width: usize,
    height: usize,
) -> Result<()> {
    let output = File::create(path.as_ref())?;
    let mut output = BufWriter::new(output);
    write_to(&mut output, image, max_value, width, height)?;
    output.flush()?;
    Ok(())
}

/// Writes header and samples to any sink.  Fails without writing
/// anything if the dimensions disagree with the image, the max value is
/// outside what the format allows, or a sample exceeds the max value.
pub fn write_to<W: Write>(
    output: &mut W,
    image: &EncodedImage,
    max_value: u32,
    width: usize,
    height: usize,
) -> Result<()> {
    if max_value == 0 || max_value > MAX_VALUE {
        return Err(Error::InvalidGrid(format!(
            "A graymap max value must be between 1 and {}, not {}.",
            MAX_VALUE, max_value
        )));
    }
    if width.checked_mul(height) != Some(image.len()) {
        return Err(Error::Dimensions {
            len: image.len(),
            width,
            height,
        });
    }

    let mut raster = Vec::with_capacity(image.len() * sample_bytes(max_value));
    for sample in image.samples() {
        if sample > max_value {
            return Err(Error::SampleRange { sample, max_value });
        }
        if sample_bytes(max_value) == 1 {
            raster.push(sample as u8);
        } else {
            raster.extend_from_slice(&(sample as u16).to_be_bytes());
        }
    }

    write!(
        output,
        "{}\n# generated by shardbrot\n{} {}\n{}\n",
        MAGIC, width, height, max_value
    )?;
    output.write_all(&raster)?;
    Ok(())
}

/// Opens and parses a graymap.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let mut input = File::open(path.as_ref())?;
    read_from(&mut input)
}

/// Parses a graymap from any source.
pub fn read_from<R: Read>(input: &mut R) -> Result<Raster> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;

    let mut header = Header {
        bytes: &bytes,
        pos: 0,
    };
    let magic = header.token()?;
    if magic != MAGIC.as_bytes() {
        return Err(Error::Malformed(format!(
            "expected magic number {}, found {:?}",
            MAGIC,
            String::from_utf8_lossy(magic)
        )));
    }

    let (width, height, max_value) = (0..3)
        .map(|_| header.number())
        .collect::<Result<Vec<usize>>>()?
        .into_iter()
        .next_tuple()
        .ok_or_else(|| Error::Malformed("incomplete header".to_string()))?;
    if max_value == 0 || max_value > MAX_VALUE as usize {
        return Err(Error::Malformed(format!("max value {} out of range", max_value)));
    }
    let max_value = max_value as u32;

    // Exactly one whitespace byte separates the header from the samples.
    let start = header.pos + 1;
    let body = bytes.get(start..).unwrap_or(&[]);
    let expected = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(sample_bytes(max_value)))
        .ok_or_else(|| Error::Malformed(format!("{}x{} is too large", width, height)))?;
    if body.len() != expected {
        return Err(Error::Malformed(format!(
            "expected {} bytes of samples, found {}",
            expected,
            body.len()
        )));
    }

    let image = if sample_bytes(max_value) == 1 {
        EncodedImage::Narrow(body.to_vec())
    } else {
        EncodedImage::Wide(
            body.chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        )
    };
    if let Some(sample) = image.samples().find(|&s| s > max_value) {
        return Err(Error::SampleRange { sample, max_value });
    }

    Ok(Raster {
        width,
        height,
        max_value,
        image,
    })
}

// A cursor over the text header.  Tokens are separated by whitespace;
// a '#' starts a comment that runs to the end of the line.
struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    fn skip_separators(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while self.bytes.get(self.pos).map_or(false, |&c| c != b'\n') {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<&'a [u8]> {
        self.skip_separators();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .map_or(false, |c| !c.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(Error::Malformed("truncated header".to_string()));
        }
        Ok(&self.bytes[start..self.pos])
    }

    fn number(&mut self) -> Result<usize> {
        let token = self.token()?;
        String::from_utf8_lossy(token)
            .parse::<usize>()
            .map_err(|_| {
                Error::Malformed(format!(
                    "expected a number in the header, found {:?}",
                    String::from_utf8_lossy(token)
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::FieldBuffer;
    use packer::{IntensityPacker, WidthPolicy};
    use std::io::Cursor;
    use tempfile;

    #[test]
    fn narrow_header_and_samples() {
        let mut out = Vec::new();
        write_to(&mut out, &EncodedImage::Narrow(vec![1, 3, 1, 50]), 50, 2, 2).unwrap();
        let header = b"P5\n# generated by shardbrot\n2 2\n50\n";
        assert_eq!(&out[..header.len()], &header[..]);
        assert_eq!(&out[header.len()..], &[1, 3, 1, 50]);
    }

    #[test]
    fn wide_samples_are_big_endian() {
        let mut out = Vec::new();
        write_to(&mut out, &EncodedImage::Wide(vec![0x0102, 300]), 1000, 2, 1).unwrap();
        let header = b"P5\n# generated by shardbrot\n2 1\n1000\n";
        assert_eq!(&out[header.len()..], &[0x01, 0x02, 0x01, 0x2c]);
    }

    #[test]
    fn wide_images_with_small_caps_are_written_narrow() {
        let mut out = Vec::new();
        write_to(&mut out, &EncodedImage::Wide(vec![7, 50]), 50, 2, 1).unwrap();
        let raster = read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(raster.image, EncodedImage::Narrow(vec![7, 50]));
    }

    #[test]
    fn rejects_inconsistent_images() {
        let mut out = Vec::new();
        let image = EncodedImage::Narrow(vec![1, 2, 3]);
        assert!(write_to(&mut out, &image, 50, 2, 2).is_err());
        assert!(write_to(&mut out, &image, 2, 3, 1).is_err());
        assert!(write_to(&mut out, &image, 0, 3, 1).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn reads_comments_anywhere_in_the_header() {
        let mut bytes = b"P5 # a\n# b\n2 # c\n1\n# d\n9\n".to_vec();
        bytes.extend_from_slice(&[4, 9]);
        let raster = read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!((raster.width, raster.height, raster.max_value), (2, 1, 9));
        assert_eq!(raster.image.to_counts(), vec![4, 9]);
    }

    #[test]
    fn rejects_malformed_files() {
        assert!(read_from(&mut Cursor::new(b"P6\n1 1\n9\n\x01".to_vec())).is_err());
        assert!(read_from(&mut Cursor::new(b"P5\n2 1\n9\n\x01".to_vec())).is_err());
        assert!(read_from(&mut Cursor::new(b"P5\n1 1\n9\n\x0a".to_vec())).is_err());
        assert!(read_from(&mut Cursor::new(b"P5\n1 x\n9\n\x01".to_vec())).is_err());
        assert!(read_from(&mut Cursor::new(b"P5\n1 1".to_vec())).is_err());
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let cases: Vec<(u32, Vec<u32>)> = vec![
            (50, vec![1, 3, 1, 50, 4, 4]),
            (255, vec![0, 255, 128, 1, 2, 3]),
            (1000, vec![0, 999, 1000, 256, 255, 17]),
            (65535, vec![65535, 0, 1, 40000, 2, 3]),
        ];
        for (n, (max_value, counts)) in cases.into_iter().enumerate() {
            for policy in &[WidthPolicy::ByValue, WidthPolicy::Legacy] {
                let field = FieldBuffer::from_counts(3, 2, counts.clone()).unwrap();
                let image = IntensityPacker::new(*policy).pack(field, max_value).unwrap();
                let path = output_path(dir.path(), "roundtrip", n);
                write_image(&path, &image, max_value, 3, 2).unwrap();

                let raster = read_image(&path).unwrap();
                assert_eq!((raster.width, raster.height), (3, 2));
                assert_eq!(raster.max_value, max_value);
                assert_eq!(raster.image.sample_bytes(), sample_bytes(max_value));
                let restored =
                    FieldBuffer::from_counts(raster.width, raster.height, raster.image.to_counts())
                        .unwrap();
                assert_eq!(restored.into_counts(), counts);
            }
        }
    }

    #[test]
    fn empty_rasters_are_valid() {
        let mut out = Vec::new();
        write_to(&mut out, &EncodedImage::Narrow(vec![]), 50, 0, 4).unwrap();
        let raster = read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!((raster.width, raster.height), (0, 4));
        assert!(raster.image.is_empty());
    }

    #[test]
    fn output_names_follow_rank() {
        assert_eq!(
            output_path("out", "mandelbrot", 3),
            Path::new("out").join("mandelbrot_3.pgm")
        );
    }
}
