//! Runs `avifenc` on the materialized frames

use crate::error::*;
use crate::toolchain::Toolchain;
use crate::{Codec, Settings};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Durations are given to avifenc in ms
const TIMESCALE: u32 = 1000;

/// CICP: BT.709 primaries, sRGB transfer, BT.709 matrix
const NCLX: &str = "1/13/1";

/// Arguments for encoding `frames`, each shown for `frame_duration_ms`, into `output`
pub(crate) fn build_args(settings: &Settings, frame_duration_ms: u32, output: &Path, frames: &[PathBuf]) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(40 + frames.len());
    let mut push = |a: &str| args.push(a.into());

    push("--yuv");
    push(settings.yuv.as_arg());
    push("--nclx");
    push(NCLX);
    push("--codec");
    push(settings.codec.as_arg());
    push("--qcolor");
    push(&settings.quality_color.to_string());
    push("--qalpha");
    push(&settings.quality_alpha.to_string());
    push("--jobs");
    push(&settings.jobs.to_string());
    push("--speed");
    push(&settings.speed.to_string());
    if settings.autotiling {
        push("--autotiling");
    }
    // libaom-specific tuning
    if settings.codec == Codec::Aom {
        let mut aom_opts = vec!["aq-mode=3", "enable-qm=1", "enable-chroma-deltaq=1", "enable-tpl-model=1", "end-usage=vbr"];
        if settings.tune_ssim {
            aom_opts.push("tune=ssim");
        }
        for opt in aom_opts {
            push("-a");
            push(opt);
        }
    }
    push("--timescale");
    push(&TIMESCALE.to_string());
    push("--duration");
    push(&frame_duration_ms.to_string());
    push("-o");
    args.push(output.into());
    args.extend(frames.iter().map(|f| f.as_os_str().to_owned()));
    args
}

/// Encodes the frames into one animated AVIF file
///
/// The encoder's progress output is shown unless `settings.quiet` is set. Its stderr is kept for the error message.
pub fn encode(toolchain: &Toolchain, settings: &Settings, frame_duration_ms: u32, output: &Path, frames: &[PathBuf]) -> ConvResult<()> {
    if frames.is_empty() {
        return Err(Error::NoFrames);
    }
    let args = build_args(settings, frame_duration_ms, output, frames);
    debug!("{} {:?}", toolchain.avifenc.display(), args);
    info!("Converting {} PNG frames to AVIF", frames.len());

    let res = Command::new(&toolchain.avifenc)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(if settings.quiet { Stdio::null() } else { Stdio::inherit() })
        .stderr(Stdio::piped())
        .output()?;

    if !res.status.success() {
        return Err(Error::Encoder(res.status, String::from_utf8_lossy(&res.stderr).into_owned()));
    }
    Ok(())
}

#[cfg(test)]
fn args_str(args: &[OsString]) -> Vec<&str> {
    args.iter().map(|a| a.to_str().unwrap()).collect()
}

#[test]
fn default_args() {
    let frames = [PathBuf::from("a.png"), PathBuf::from("b.png")];
    let args = build_args(&Settings::default(), 70, Path::new("out.avif"), &frames);
    assert_eq!(args_str(&args).join(" "),
        "--yuv 420 --nclx 1/13/1 --codec aom --qcolor 30 --qalpha 95 --jobs 8 --speed 2 --autotiling \
         -a aq-mode=3 -a enable-qm=1 -a enable-chroma-deltaq=1 -a enable-tpl-model=1 -a end-usage=vbr -a tune=ssim \
         --timescale 1000 --duration 70 -o out.avif a.png b.png");
}

#[test]
fn other_codec() {
    let settings = Settings {
        codec: Codec::Rav1e,
        yuv: crate::Yuv::Yuv444,
        autotiling: false,
        quality_color: 80,
        ..Settings::default()
    };
    let args = build_args(&settings, 40, Path::new("x.avif"), &[PathBuf::from("f.png")]);
    let args = args_str(&args);
    assert!(!args.contains(&"-a"));
    assert!(!args.contains(&"--autotiling"));
    assert_eq!(&args[..6], ["--yuv", "444", "--nclx", "1/13/1", "--codec", "rav1e"]);
    assert_eq!(&args[args.len() - 5..], ["--duration", "40", "-o", "x.avif", "f.png"]);
    assert!(args.windows(2).any(|w| w == ["--qcolor", "80"]));
}

#[test]
fn missing_encoder() {
    let t = Toolchain::with_avifenc("/nonexistent/gif2avif/avifenc");
    let res = encode(&t, &Settings::default(), 40, Path::new("x.avif"), &[PathBuf::from("f.png")]);
    assert!(matches!(res, Err(Error::Io(_))));
}

#[cfg(target_os = "linux")]
#[test]
fn encoder_stdout() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("avifenc");
    std::fs::write(&script, r#"#!/bin/sh
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
readlink /proc/$$/fd/1 > "$out""#).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let toolchain = Toolchain::with_avifenc(script);
    let frames = [PathBuf::from("f.png")];
    let out = dir.path().join("out.avif");

    let quiet = Settings { quiet: true, ..Settings::default() };
    encode(&toolchain, &quiet, 40, &out, &frames).unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "/dev/null");

    encode(&toolchain, &Settings::default(), 40, &out, &frames).unwrap();
    let ours = std::fs::read_link("/proc/self/fd/1").unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), ours.to_str().unwrap());
}
