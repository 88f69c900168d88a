extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;
extern crate shardbrot;

use clap::{App, AppSettings, Arg, ArgMatches, ErrorKind};
use failure::Fail;
use num::Complex;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use shardbrot::field::DEFAULT_CHUNK;
use shardbrot::planes::MAX_LIMIT;
use shardbrot::worker::{self, launcher_context, WorkerContext};
use shardbrot::{Anchor, Config, GlobalGrid, Region, Schedule, WidthPolicy};

// A clap validator accepting anything that parses as a `T`.
fn parses<T: FromStr>(what: &'static str) -> impl Fn(String) -> Result<(), String> {
    move |s| {
        T::from_str(&s)
            .map(|_| ())
            .map_err(|_| format!("Could not parse {} from {:?}", what, s))
    }
}

// A clap validator accepting a `T` no smaller than `low` and, when
// given, no larger than `high`.
fn bounded<T>(
    what: &'static str,
    low: T,
    high: Option<T>,
) -> impl Fn(String) -> Result<(), String>
where
    T: FromStr + PartialOrd + Display + Copy,
{
    move |s| {
        let value =
            T::from_str(&s).map_err(|_| format!("Could not parse {} from {:?}", what, s))?;
        match high {
            Some(high) if value < low || value > high => Err(format!(
                "The {} must be between {} and {}, not {}",
                what, low, high, value
            )),
            None if value < low => Err(format!(
                "The {} must be at least {}, not {}",
                what, low, value
            )),
            _ => Ok(()),
        }
    }
}

const WIDTH: &str = "n_x";
const HEIGHT: &str = "n_y";
const LEFT_X: &str = "x_L";
const LEFT_Y: &str = "y_L";
const RIGHT_X: &str = "x_R";
const RIGHT_Y: &str = "y_R";
const ITERATIONS: &str = "I_max";
const THREADS: &str = "threads";
const WORKERS: &str = "workers";
const RANK: &str = "rank";
const ALL_RANKS: &str = "all-ranks";
const OUTPUT_DIR: &str = "output-dir";
const PREFIX: &str = "prefix";
const SCHEDULE: &str = "schedule";
const CHUNK: &str = "chunk";
const LEGACY_WIDTH: &str = "legacy-width";
const LEGACY_ORIGIN: &str = "legacy-origin";

// Largest grid side accepted on the command line.
const MAX_DIMENSION: usize = 65535;

fn dimension<'a>(name: &'a str, index: u64, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .required(true)
        .index(index)
        .validator(bounded("grid dimension", 1, Some(MAX_DIMENSION)))
        .help(help)
}

fn coordinate<'a>(name: &'a str, index: u64, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .required(true)
        .index(index)
        .validator(parses::<f64>("coordinate"))
        .help(help)
}

fn args<'a>() -> App<'a, 'a> {
    let max_threads = num_cpus::get();

    App::new("shardbrot")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Renders one column shard of the Mandelbrot set per worker")
        .setting(AppSettings::AllowNegativeNumbers)
        .arg(dimension(WIDTH, 1, "Columns in the full image"))
        .arg(dimension(HEIGHT, 2, "Rows in the full image"))
        .arg(coordinate(LEFT_X, 3, "Real part of the left lower corner"))
        .arg(coordinate(LEFT_Y, 4, "Imaginary part of the left lower corner"))
        .arg(coordinate(RIGHT_X, 5, "Real part of the right upper corner"))
        .arg(coordinate(RIGHT_Y, 6, "Imaginary part of the right upper corner"))
        .arg(
            Arg::with_name(ITERATIONS)
                .required(true)
                .index(7)
                .validator(bounded("iteration count", 1, Some(MAX_LIMIT)))
                .help("Maximum number of iterations per pixel"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(bounded("thread count", 1, Some(max_threads)))
                .help("Number of threads each worker computes with [default: one per CPU]"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .long(WORKERS)
                .short("w")
                .takes_value(true)
                .validator(bounded("worker count", 1, None))
                .help("Size of the worker group [default: from the launcher, or 1]"),
        )
        .arg(
            Arg::with_name(RANK)
                .long(RANK)
                .short("r")
                .takes_value(true)
                .conflicts_with(ALL_RANKS)
                .validator(parses::<usize>("rank"))
                .help("This worker's rank [default: from the launcher, or 0]"),
        )
        .arg(
            Arg::with_name(ALL_RANKS)
                .long(ALL_RANKS)
                .help("Render every rank of the group in this process"),
        )
        .arg(
            Arg::with_name(OUTPUT_DIR)
                .long(OUTPUT_DIR)
                .short("o")
                .takes_value(true)
                .default_value(".")
                .help("Directory the graymaps are written to"),
        )
        .arg(
            Arg::with_name(PREFIX)
                .long(PREFIX)
                .short("p")
                .takes_value(true)
                .default_value(shardbrot::config::DEFAULT_PREFIX)
                .help("File name prefix; files are <prefix>_<rank>.pgm"),
        )
        .arg(
            Arg::with_name(SCHEDULE)
                .long(SCHEDULE)
                .takes_value(true)
                .possible_values(&["static", "dynamic"])
                .default_value("static")
                .help("How pixels are divided among threads"),
        )
        .arg(
            Arg::with_name(CHUNK)
                .long(CHUNK)
                .takes_value(true)
                .validator(bounded("chunk size", 1, Some(1usize << 24)))
                .help("Pixels handed out at a time under the dynamic schedule"),
        )
        .arg(
            Arg::with_name(LEGACY_WIDTH)
                .long(LEGACY_WIDTH)
                .help("Always pack samples as 16-bit in memory"),
        )
        .arg(
            Arg::with_name(LEGACY_ORIGIN)
                .long(LEGACY_ORIGIN)
                .help("Start each shard at rank * (x_R - x_L) / workers"),
        )
}

fn parsed<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>, failure::Error>
where
    T: FromStr,
    T::Err: Fail,
{
    match matches.value_of(name) {
        Some(s) => Ok(Some(T::from_str(s)?)),
        None => Ok(None),
    }
}

fn required<T>(matches: &ArgMatches, name: &str) -> Result<T, failure::Error>
where
    T: FromStr,
    T::Err: Fail,
{
    parsed(matches, name)?.ok_or_else(|| format_err!("Missing argument {}", name))
}

fn config_from(matches: &ArgMatches) -> Result<Config, failure::Error> {
    let leftlower: Complex<f64> =
        Complex::new(required(matches, LEFT_X)?, required(matches, LEFT_Y)?);
    let rightupper: Complex<f64> =
        Complex::new(required(matches, RIGHT_X)?, required(matches, RIGHT_Y)?);
    let region = Region::new(leftlower, rightupper)?;
    let grid = GlobalGrid::new(
        required(matches, WIDTH)?,
        required(matches, HEIGHT)?,
        required(matches, ITERATIONS)?,
    )?;

    let mut config = Config::new(region, grid);
    if let Some(threads) = parsed(matches, THREADS)? {
        config.lanes = threads;
    }
    config.schedule = match matches.value_of(SCHEDULE) {
        Some("dynamic") => Schedule::Dynamic(parsed(matches, CHUNK)?.unwrap_or(DEFAULT_CHUNK)),
        _ => Schedule::Static,
    };
    if matches.is_present(LEGACY_WIDTH) {
        config.width_policy = WidthPolicy::Legacy;
    }
    if matches.is_present(LEGACY_ORIGIN) {
        config.anchor = Anchor::RankProportional;
    }
    if let Some(dir) = matches.value_of(OUTPUT_DIR) {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(prefix) = matches.value_of(PREFIX) {
        config.prefix = prefix.to_string();
    }
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<(), failure::Error> {
    let config = config_from(matches)?;
    debug!("{:?}", config);
    let workers = parsed(matches, WORKERS)?;

    if matches.is_present(ALL_RANKS) {
        let size = match workers {
            Some(size) => size,
            None => WorkerContext::discover(None, None)?.size,
        };
        worker::render_all(&config, size)?;
    } else {
        let context = WorkerContext::discover(parsed(matches, RANK)?, workers)?;
        worker::render(&config, &context)?;
    }
    Ok(())
}

// Before the arguments are understood, only the launcher can say which
// worker we are.  Without one, we are the lead.
fn launched_as_lead() -> bool {
    match launcher_context(|name| env::var(name).ok()) {
        Ok(Some((rank, _))) => rank == 0,
        _ => true,
    }
}

fn main() {
    env_logger::init();

    let matches = match args().get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                if launched_as_lead() {
                    eprintln!("{}", e.message);
                }
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = run(&matches) {
        error!("{:?}", e);
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(extra: &[&str]) -> Result<ArgMatches<'static>, clap::Error> {
        let mut argv = vec!["shardbrot", "4", "2", "-2", "-1", "1", "1", "50"];
        argv.extend_from_slice(extra);
        args().get_matches_from_safe(argv)
    }

    #[test]
    fn seven_positionals_with_negative_numbers() {
        let config = config_from(&matches(&[]).unwrap()).unwrap();
        assert_eq!(config.grid, GlobalGrid::new(4, 2, 50).unwrap());
        assert_eq!(config.region.leftlower, Complex::new(-2.0, -1.0));
        assert_eq!(config.region.rightupper, Complex::new(1.0, 1.0));
        assert_eq!(config.schedule, Schedule::Static);
        assert_eq!(config.anchor, Anchor::Global);
        assert_eq!(config.width_policy, WidthPolicy::ByValue);
        assert_eq!(config.prefix, "mandelbrot");
    }

    #[test]
    fn wrong_argument_counts_are_rejected() {
        assert!(args()
            .get_matches_from_safe(vec!["shardbrot", "4", "2", "-2", "-1", "1", "1"])
            .is_err());
        assert!(matches(&["7"]).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(args()
            .get_matches_from_safe(vec!["shardbrot", "0", "2", "-2", "-1", "1", "1", "50"])
            .is_err());
        assert!(args()
            .get_matches_from_safe(vec!["shardbrot", "4", "2", "-2", "-1", "1", "1", "0"])
            .is_err());
        assert!(args()
            .get_matches_from_safe(vec!["shardbrot", "4", "2", "-2", "-1", "1", "1", "65536"])
            .is_err());
        assert!(args()
            .get_matches_from_safe(vec!["shardbrot", "4", "2", "left", "-1", "1", "1", "50"])
            .is_err());
    }

    #[test]
    fn validators_name_the_argument() {
        let chunk = bounded("chunk size", 1usize, Some(4));
        assert_eq!(chunk("4".to_string()), Ok(()));
        assert_eq!(
            chunk("5".to_string()),
            Err("The chunk size must be between 1 and 4, not 5".to_string())
        );
        assert_eq!(
            chunk("many".to_string()),
            Err("Could not parse chunk size from \"many\"".to_string())
        );

        let workers = bounded("worker count", 1usize, None);
        assert_eq!(workers("100000".to_string()), Ok(()));
        assert_eq!(
            workers("0".to_string()),
            Err("The worker count must be at least 1, not 0".to_string())
        );

        let coordinate = parses::<f64>("coordinate");
        assert!(coordinate("-1.5e-3".to_string()).is_ok());
        assert!(coordinate("left".to_string()).is_err());
    }

    #[test]
    fn inverted_regions_fail_after_parsing() {
        let m = args()
            .get_matches_from_safe(vec!["shardbrot", "4", "2", "1", "1", "-2", "-1", "50"])
            .unwrap();
        assert!(config_from(&m).is_err());
    }

    #[test]
    fn options_reach_the_config() {
        let m = matches(&[
            "--schedule",
            "dynamic",
            "--chunk",
            "64",
            "--legacy-width",
            "--legacy-origin",
            "--prefix",
            "tile",
            "--output-dir",
            "out",
            "--threads",
            "1",
        ])
        .unwrap();
        let config = config_from(&m).unwrap();
        assert_eq!(config.schedule, Schedule::Dynamic(64));
        assert_eq!(config.width_policy, WidthPolicy::Legacy);
        assert_eq!(config.anchor, Anchor::RankProportional);
        assert_eq!(config.prefix, "tile");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.lanes, 1);
    }

    #[test]
    fn rank_conflicts_with_all_ranks() {
        assert!(matches(&["--rank", "1", "--all-ranks"]).is_err());
    }
}
