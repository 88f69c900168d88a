// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! One worker's run: find out who we are, take our columns, fill them,
//! pack them, write them.  Workers never talk to each other once they
//! know their rank and the size of their group.

use std::env;
use std::path::PathBuf;

use config::Config;
use errors::{Error, Result};
use field::{FieldBuffer, FieldComputer};
use packer::IntensityPacker;
use partition::partition;
use pgm::{output_path, write_image};
use planes::PlaneMapper;

/// Rank and size variables set by common launchers, tried in order.
pub const LAUNCHER_VARS: [(&str, &str); 3] = [
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("SLURM_PROCID", "SLURM_NTASKS"),
];

/// A worker's place in its group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    /// This worker's rank, in `[0, size)`.
    pub rank: usize,
    /// Number of workers in the group.
    pub size: usize,
}

impl WorkerContext {
    /// Fails unless the group is non-empty and contains `rank`.
    pub fn new(rank: usize, size: usize) -> Result<WorkerContext> {
        if size == 0 || rank >= size {
            return Err(Error::Rank { rank, size });
        }
        Ok(WorkerContext { rank, size })
    }

    /// The group of one that a worker started without a launcher is in.
    pub fn solo() -> WorkerContext {
        WorkerContext { rank: 0, size: 1 }
    }

    /// The lead worker is the one that speaks for the group.
    pub fn is_lead(&self) -> bool {
        self.rank == 0
    }

    /// Resolves this worker's context.  Explicit values win; anything
    /// not given comes from the launcher environment, and failing that
    /// from the solo group.
    pub fn discover(rank: Option<usize>, size: Option<usize>) -> Result<WorkerContext> {
        let launched = launcher_context(|name| env::var(name).ok())?;
        let rank = rank.or_else(|| launched.map(|l| l.0)).unwrap_or(0);
        let size = size.or_else(|| launched.map(|l| l.1)).unwrap_or(1);
        WorkerContext::new(rank, size)
    }
}

/// The (rank, size) pair published by the first launcher whose
/// variables are both present.  Neither value is validated here.
pub fn launcher_context<F>(lookup: F) -> Result<Option<(usize, usize)>>
where
    F: Fn(&str) -> Option<String>,
{
    for &(rank_var, size_var) in LAUNCHER_VARS.iter() {
        if let (Some(rank), Some(size)) = (lookup(rank_var), lookup(size_var)) {
            let rank = parse_var(rank_var, &rank)?;
            let size = parse_var(size_var, &size)?;
            return Ok(Some((rank, size)));
        }
    }
    Ok(None)
}

fn parse_var(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Environment(name.to_string(), value.to_string()))
}

/// Partitions the grid and fills this worker's shard.
pub fn compute_shard(config: &Config, context: &WorkerContext) -> Result<FieldBuffer> {
    let shard = partition(config.grid.width, context.size, context.rank);
    if shard.is_empty() {
        warn!(
            "worker {} of {} received no columns of a {}-column grid",
            context.rank, context.size, config.grid.width
        );
    } else {
        debug!(
            "worker {} of {} owns columns {:?}",
            context.rank,
            context.size,
            shard.columns()
        );
    }

    let plane = PlaneMapper::new(&config.region, &config.grid, shard, config.anchor);
    FieldComputer::new(config.lanes)
        .with_schedule(config.schedule)
        .compute(&plane, config.grid.limit)
}

/// Runs the whole pipeline for one worker and returns the file it wrote.
pub fn render(config: &Config, context: &WorkerContext) -> Result<PathBuf> {
    let field = compute_shard(config, context)?;
    let (width, height) = (field.width(), field.height());
    let image = IntensityPacker::new(config.width_policy).pack(field, config.grid.limit)?;

    let path = output_path(&config.output_dir, &config.prefix, context.rank);
    write_image(&path, &image, config.grid.limit, width, height)?;
    info!(
        "worker {} wrote {}x{} samples to {}",
        context.rank,
        width,
        height,
        path.display()
    );
    Ok(path)
}

/// Renders every rank of a group of `size` workers, one after another,
/// in this process.
pub fn render_all(config: &Config, size: usize) -> Result<Vec<PathBuf>> {
    (0..size)
        .map(|rank| WorkerContext::new(rank, size).and_then(|ctx| render(config, &ctx)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Complex;
    use packer::{EncodedImage, WidthPolicy};
    use pgm::read_image;
    use planes::{GlobalGrid, Region};
    use std::collections::HashMap;
    use tempfile;

    fn config(columns: usize, rows: usize, limit: u32, dir: &tempfile::TempDir) -> Config {
        let region = Region::new(Complex::new(-2.0, -1.0), Complex::new(1.0, 1.0)).unwrap();
        let mut config = Config::new(region, GlobalGrid::new(columns, rows, limit).unwrap());
        config.lanes = 2;
        config.output_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn contexts_must_lie_inside_their_group() {
        assert!(WorkerContext::new(0, 1).is_ok());
        assert!(WorkerContext::new(3, 4).is_ok());
        assert!(WorkerContext::new(4, 4).is_err());
        assert!(WorkerContext::new(0, 0).is_err());
        assert!(WorkerContext::solo().is_lead());
    }

    #[test]
    fn launcher_variables_are_tried_in_order() {
        let mut vars = HashMap::new();
        vars.insert("PMI_RANK", "2");
        vars.insert("PMI_SIZE", "3");
        vars.insert("SLURM_PROCID", "5");
        vars.insert("SLURM_NTASKS", "8");
        let found = launcher_context(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(found, Some((2, 3)));

        vars.insert("OMPI_COMM_WORLD_RANK", "1");
        let partial = launcher_context(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(partial, Some((2, 3)));

        vars.insert("OMPI_COMM_WORLD_SIZE", " 4 ");
        let open_mpi = launcher_context(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(open_mpi, Some((1, 4)));
    }

    #[test]
    fn no_launcher_means_no_context() {
        assert_eq!(launcher_context(|_| None).unwrap(), None);
    }

    #[test]
    fn garbage_in_the_environment_is_fatal() {
        let result = launcher_context(|name| match name {
            "PMI_RANK" => Some("first".to_string()),
            "PMI_SIZE" => Some("2".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn explicit_values_override_the_environment() {
        let ctx = WorkerContext::discover(Some(1), Some(2)).unwrap();
        assert_eq!(ctx, WorkerContext { rank: 1, size: 2 });
        assert!(WorkerContext::discover(Some(2), Some(2)).is_err());
    }

    #[test]
    fn two_workers_render_the_four_by_two_grid() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(4, 2, 50, &dir);
        let paths = render_all(&config, 2).unwrap();
        assert_eq!(paths[0], dir.path().join("mandelbrot_0.pgm"));
        assert_eq!(paths[1], dir.path().join("mandelbrot_1.pgm"));

        let left = read_image(&paths[0]).unwrap();
        let right = read_image(&paths[1]).unwrap();
        assert_eq!((left.width, left.height, left.max_value), (2, 2, 50));
        assert_eq!(left.image, EncodedImage::Narrow(vec![1, 3, 1, 50]));
        assert_eq!(right.image, EncodedImage::Narrow(vec![4, 4, 50, 50]));
    }

    #[test]
    fn caps_above_255_use_two_byte_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(4, 2, 300, &dir);
        config.width_policy = WidthPolicy::Legacy;
        let path = render(&config, &WorkerContext::new(1, 2).unwrap()).unwrap();
        let raster = read_image(&path).unwrap();
        assert_eq!(raster.image, EncodedImage::Wide(vec![4, 4, 300, 300]));
    }

    #[test]
    fn idle_workers_still_write_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(2, 3, 50, &dir);
        let paths = render_all(&config, 3).unwrap();
        let idle = read_image(&paths[2]).unwrap();
        assert_eq!((idle.width, idle.height), (0, 3));
        assert!(idle.image.is_empty());
    }

    #[test]
    fn shards_match_their_columns_of_a_solo_render() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(23, 7, 80, &dir);
        let whole = compute_shard(&config, &WorkerContext::solo()).unwrap();
        let mut start = 0;
        for rank in 0..5 {
            let part = compute_shard(&config, &WorkerContext::new(rank, 5).unwrap()).unwrap();
            for j in 0..part.height() {
                for i in 0..part.width() {
                    assert_eq!(part.get(i, j), whole.get(start + i, j));
                }
            }
            start += part.width();
        }
        assert_eq!(start, 23);
    }
}
