use clap::builder::NonEmptyStringValueParser;
use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, Command};
use gif2avif::progress::{NoProgress, ProgressReporter};
use gif2avif::{Codec, Converter, Settings, Toolchain, Yuv};
use pbr::ProgressBar;
use std::env;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        if let Some(e) = e.source() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Converts animated GIF to animated AVIF, keeping frame timing")
        .arg_required_else_help(true)
        .arg(Arg::new("output")
            .long("output")
            .short('o')
            .help("Destination file to write to. Defaults to the input file name with .avif extension")
            .value_parser(value_parser!(PathBuf))
            .value_name("a.avif"))
        .arg(Arg::new("quality")
            .long("quality")
            .short('Q')
            .value_name("0-100")
            .value_parser(value_parser!(u8))
            .default_value("30")
            .help("Color quality. Higher is better, and gives larger files"))
        .arg(Arg::new("quality-alpha")
            .long("quality-alpha")
            .value_name("0-100")
            .value_parser(value_parser!(u8))
            .default_value("95")
            .help("Quality of the transparency channel"))
        .arg(Arg::new("speed")
            .long("speed")
            .short('s')
            .value_name("0-10")
            .value_parser(value_parser!(u8))
            .default_value("2")
            .help("Encoder speed. 0 is slowest with the best compression"))
        .arg(Arg::new("jobs")
            .long("jobs")
            .short('j')
            .value_name("n")
            .value_parser(value_parser!(u16))
            .default_value("8")
            .help("Number of encoder threads"))
        .arg(Arg::new("yuv")
            .long("yuv")
            .value_name("420|422|444")
            .value_parser(NonEmptyStringValueParser::new())
            .default_value("420")
            .help("Chroma subsampling"))
        .arg(Arg::new("codec")
            .long("codec")
            .value_name("aom|rav1e|svt")
            .value_parser(NonEmptyStringValueParser::new())
            .default_value("aom")
            .help("AV1 encoder used by avifenc"))
        .arg(Arg::new("avifenc")
            .long("avifenc")
            .value_name("path")
            .value_parser(value_parser!(PathBuf))
            .help("Path to the avifenc executable. By default it's searched next to this program, then in PATH"))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"))
        .arg(Arg::new("FILE")
            .help("Animated GIF file")
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .get_matches_from(wild::args_os());

    let quiet = matches.get_flag("quiet");
    init_logging(quiet);

    let input = matches.get_one::<PathBuf>("FILE").ok_or("Missing input file")?;
    let output = matches.get_one::<PathBuf>("output").cloned()
        .unwrap_or_else(|| input.with_extension("avif"));

    let settings = Settings {
        quality_color: *matches.get_one::<u8>("quality").ok_or("Missing quality")?,
        quality_alpha: *matches.get_one::<u8>("quality-alpha").ok_or("Missing alpha quality")?,
        speed: *matches.get_one::<u8>("speed").ok_or("Missing speed")?,
        jobs: *matches.get_one::<u16>("jobs").ok_or("Missing jobs")?,
        yuv: matches.get_one::<String>("yuv").ok_or("Missing yuv")?.parse()?,
        codec: matches.get_one::<String>("codec").ok_or("Missing codec")?.parse()?,
        quiet,
        ..Settings::default()
    };
    check_settings(&settings)?;

    check_if_path_exists(input)?;
    if !is_gif(input)? {
        return Err(format!("{} is not a GIF file. Only GIF animations can be converted", input.display()).into());
    }
    if output == *input {
        return Err("The output file would overwrite the input".into());
    }

    let toolchain = match matches.get_one::<PathBuf>("avifenc") {
        Some(path) => Toolchain::at_path(path)?,
        None => Toolchain::discover()?,
    };
    let converter = Converter::new(toolchain, settings);

    let file = BufReader::new(File::open(input)?);
    let frames = converter.decode(file)?;
    let plan = frames.plan();

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::new(plan.frames.len() as u64);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("Frame ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    converter.encode(frames, &plan, &output, progress)?;
    progress.done(&format!("gif2avif created {}", DestPath(&output)));

    Ok(())
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn check_settings(settings: &Settings) -> BinResult<()> {
    if settings.quality_color > 100 || settings.quality_alpha > 100 {
        return Err("Quality 100 is maximum".into());
    }
    if settings.speed > 10 {
        return Err("Speed 10 is maximum".into());
    }
    if settings.jobs == 0 {
        return Err("Needs at least one job".into());
    }
    if settings.quality_color < 10 {
        warn!("quality {} will give really bad results", settings.quality_color);
    }
    if settings.codec != Codec::Aom && settings.yuv != Yuv::Yuv420 {
        warn!("{} may not support {} subsampling", settings.codec.as_arg(), settings.yuv.as_arg());
    }
    Ok(())
}

fn is_gif(path: &Path) -> BinResult<bool> {
    let mut file = File::open(path)?;
    let mut buf = [0; 4];
    if file.read_exact(&mut buf).is_err() {
        return Ok(false);
    }
    Ok(&buf == b"GIF8")
}

fn check_if_path_exists(path: &Path) -> BinResult<()> {
    if !path.exists() {
        let mut msg = format!("Unable to find the input file: \"{}\"", path.display());
        if path.to_str().map_or(false, |p| p.contains('*')) {
            msg += "\nThe path contains a literal \"*\" character. Only one GIF file can be converted at a time.";
        } else if path.is_relative() {
            msg += &format!(" (searched in \"{}\")", env::current_dir()?.display());
        }
        return Err(msg.into())
    }
    Ok(())
}

struct DestPath<'a>(&'a Path);

impl fmt::Display for DestPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let abs_path = dunce::canonicalize(self.0);
        abs_path.as_ref().map(|p| p.as_path()).unwrap_or(self.0).display().fmt(f)
    }
}
