extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate log;
extern crate mandelbrot;
extern crate num;
extern crate num_cpus;

use clap::{value_t, App, Arg, ArgMatches};
use failure::format_err;
use log::{info, warn};
use mandelbrot::{
    BackendKind, CancelFlag, Error, Palette, Pixel, Precision, RenderConfig, Renderer, Viewport,
    ZoomStep,
};
use num::Complex;
use std::str::FromStr;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_parse<T: FromStr<Err = String>>(s: &str) -> Result<(), String> {
    T::from_str(s).map(|_| ())
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const EXTENT: &str = "extent";
const ITERATIONS: &str = "iterations";
const THREADS: &str = "threads";
const BACKEND: &str = "backend";
const PRECISION: &str = "precision";
const PALETTE: &str = "palette";
const ZOOM: &str = "zoom";
const ZOOM_AT: &str = "zoom-at";
const ZOOM_STEPS: &str = "zoom-steps";
const NO_FALLBACK: &str = "no-fallback";
const VERBOSE: &str = "verbose";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandel")
        .version("0.1.0")
        .about("Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file; the extension picks the format"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(CENTER)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-0.5,0")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse center point"))
                .help("Center of the region, as RE,IM"),
        )
        .arg(
            Arg::with_name(EXTENT)
                .long(EXTENT)
                .short("e")
                .takes_value(true)
                .default_value("1.5,1.5")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse region extent"))
                .help("Half-width and half-height of the region, as W,H"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("256")
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iteration cap per pixel"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of threads to use in the CPU backend (default: all cores)"),
        )
        .arg(
            Arg::with_name(BACKEND)
                .long(BACKEND)
                .short("b")
                .takes_value(true)
                .default_value("cpu")
                .validator(|s| validate_parse::<BackendKind>(&s))
                .help("cpu or gpu"),
        )
        .arg(
            Arg::with_name(PRECISION)
                .long(PRECISION)
                .short("p")
                .takes_value(true)
                .default_value("double")
                .validator(|s| validate_parse::<Precision>(&s))
                .help("single or double"),
        )
        .arg(
            Arg::with_name(PALETTE)
                .long(PALETTE)
                .takes_value(true)
                .default_value("banded")
                .validator(|s| validate_parse::<Palette>(&s))
                .help("banded, grayscale or smooth"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .default_value("1.2")
                .validator(|s| {
                    validate_range(
                        &s,
                        0.01,
                        100.0,
                        "Could not parse zoom factor",
                        "Zoom factor must be between 0.01 and 100",
                    )
                })
                .help("Zoom factor per step; below 1 zooms out"),
        )
        .arg(
            Arg::with_name(ZOOM_AT)
                .long(ZOOM_AT)
                .takes_value(true)
                .validator(|s| validate_pair::<usize>(&s, ',', "Could not parse zoom pixel"))
                .help("Pixel to zoom on, as X,Y (default: the center pixel)"),
        )
        .arg(
            Arg::with_name(ZOOM_STEPS)
                .long(ZOOM_STEPS)
                .short("n")
                .takes_value(true)
                .default_value("0")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        500,
                        "Could not parse zoom step count",
                        "Zoom step count must be between 0 and 500",
                    )
                })
                .help("How many zoom steps to apply before rendering"),
        )
        .arg(
            Arg::with_name(NO_FALLBACK)
                .long(NO_FALLBACK)
                .help("Fail instead of falling back to the CPU when the GPU is unavailable"),
        )
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .multiple(true)
                .help("More logging; repeat for more"),
        )
        .get_matches()
}

fn renderer(config: RenderConfig, fallback: bool) -> Result<Renderer, failure::Error> {
    match Renderer::new(config) {
        Ok(renderer) => Ok(renderer),
        Err(Error::BackendUnavailable { backend, reason }) => {
            if !fallback {
                return Err(Error::BackendUnavailable { backend, reason }.into());
            }
            warn!("{} backend unavailable ({}), falling back to cpu", backend, reason);
            Ok(Renderer::new(RenderConfig {
                backend: BackendKind::Cpu,
                ..config
            })?)
        }
        Err(e) => Err(e.into()),
    }
}

fn run(matches: &ArgMatches) -> Result<(), failure::Error> {
    let output = matches
        .value_of(OUTPUT)
        .ok_or_else(|| format_err!("No output file given"))?;
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_pair::<usize>(s, 'x'))
        .ok_or_else(|| format_err!("Error parsing image dimensions"))?;
    let center = matches
        .value_of(CENTER)
        .and_then(parse_complex)
        .ok_or_else(|| format_err!("Error parsing center point"))?;
    let (half_width, half_height) = matches
        .value_of(EXTENT)
        .and_then(|s| parse_pair::<f64>(s, ','))
        .ok_or_else(|| format_err!("Error parsing region extent"))?;
    let iterations = value_t!(matches, ITERATIONS, u32)?;
    let zoom = value_t!(matches, ZOOM, f64)?;
    let zoom_steps = value_t!(matches, ZOOM_STEPS, usize)?;
    let zoom_at = match matches.value_of(ZOOM_AT) {
        Some(s) => {
            let (x, y) =
                parse_pair::<usize>(s, ',').ok_or_else(|| format_err!("Error parsing zoom pixel"))?;
            Pixel(x, y)
        }
        None => Pixel(width / 2, height / 2),
    };

    let config = RenderConfig {
        backend: value_t!(matches, BACKEND, BackendKind)?,
        precision: value_t!(matches, PRECISION, Precision)?,
        threads: if matches.is_present(THREADS) {
            value_t!(matches, THREADS, usize)?
        } else {
            num_cpus::get()
        },
        palette: value_t!(matches, PALETTE, Palette)?,
    };

    let mut viewport = Viewport::new(center, half_width, half_height, width, height)?;
    let mut max_iter = iterations;
    let step = ZoomStep {
        at: zoom_at,
        factor: zoom,
    };
    for _ in 0..zoom_steps {
        let (next, iters) = step.apply(&viewport, max_iter, iterations)?;
        viewport = next;
        max_iter = iters;
    }

    let renderer = renderer(config, !matches.is_present(NO_FALLBACK))?;
    info!(
        "rendering {}x{} around {} ± ({}, {}) at {} iterations on {}",
        width,
        height,
        viewport.center(),
        viewport.half_width(),
        viewport.half_height(),
        max_iter,
        renderer.backend_name()
    );
    let image = renderer.render(&viewport, max_iter, &CancelFlag::new())?;
    image.save(output)?;
    info!("wrote {}", output);
    Ok(())
}

fn main() {
    let matches = args();
    let level = match matches.occurrences_of(VERBOSE) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
