use gif2avif::progress::{NoProgress, ProgressReporter};
use gif2avif::source::GifSource;
use gif2avif::*;
use rgb::RGBA8;
use std::borrow::Cow;

const COLORS: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]];

/// 4×3 GIF where frame `n` is filled with `COLORS[n % 4]`, delays in 1/100s
fn make_gif(delays: &[u16]) -> Vec<u8> {
    let (w, h) = (4, 3);
    let palette: Vec<u8> = COLORS.iter().flatten().copied().collect();
    let mut out = Vec::new();
    {
        let mut enc = gif::Encoder::new(&mut out, w, h, &palette).unwrap();
        enc.set_repeat(gif::Repeat::Infinite).unwrap();
        for (n, &delay) in delays.iter().enumerate() {
            let pixels = vec![(n % COLORS.len()) as u8; usize::from(w * h)];
            let frame = gif::Frame {
                width: w,
                height: h,
                delay,
                buffer: Cow::Owned(pixels),
                ..gif::Frame::default()
            };
            enc.write_frame(&frame).unwrap();
        }
    }
    out
}

fn color(n: usize) -> RGBA8 {
    let [r, g, b] = COLORS[n % COLORS.len()];
    RGBA8::new(r, g, b, 255)
}

fn decode(gif: &[u8]) -> ConvResult<SourceFrames> {
    materialize::decode_to_pngs(GifSource::new(gif)?, 2)
}

#[test]
fn decodes_frames_and_delays() {
    let gif = make_gif(&[20, 10, 0]);
    let mut source = GifSource::new(&gif[..]).unwrap();
    assert_eq!((source.width(), source.height()), (4, 3));
    let mut delays = Vec::new();
    while let Some(f) = source.next_frame().unwrap() {
        assert_eq!((f.image.width(), f.image.height()), (4, 3));
        assert!(f.image.pixels().all(|px| px == color(delays.len())), "frame {}", delays.len());
        delays.push(f.delay_ms);
    }
    assert_eq!(delays, [200, 100, 100]);
}

#[test]
fn writes_each_frame_once_while_decoding() {
    let frames = decode(&make_gif(&[20, 10, 0])).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.delays_ms(), [200, 100, 100]);
    for (n, path) in frames.paths().iter().enumerate() {
        let png = lodepng::decode32_file(path).unwrap();
        assert_eq!((png.width, png.height), (4, 3));
        assert!(png.buffer.iter().all(|&px| px == color(n)), "{}", path.display());
    }
}

#[test]
fn empty_gif() {
    let res = decode(&make_gif(&[]));
    assert!(matches!(res, Err(Error::NoFrames)));
}

#[test]
fn not_a_gif() {
    assert!(GifSource::new(&b"\x89PNG\r\n\x1a\n"[..]).is_err());
}

#[test]
fn plan_balances_timing() {
    let frames = decode(&make_gif(&[20, 10, 10])).unwrap();
    let plan = frames.plan();
    assert_eq!(frames.len(), 3);
    assert_eq!(plan.frame_duration_ms, 100);
    assert_eq!(plan.frames.iter().collect::<Vec<_>>(), [0, 0, 1, 2]);
    assert_eq!(plan.total_duration_ms(), 400);
}

#[test]
fn zero_delays_play_at_100ms() {
    let plan = decode(&make_gif(&[0, 0, 0])).unwrap().plan();
    assert_eq!(plan.frame_duration_ms, 100);
    assert_eq!(plan.frames.iter().collect::<Vec<_>>(), [0, 1, 2]);

    // 100ms and 500ms
    let plan = decode(&make_gif(&[0, 50])).unwrap().plan();
    assert_eq!(plan.frame_duration_ms, 28);
    assert_eq!(plan.frames.runs().map(|(_, n)| n).collect::<Vec<_>>(), [4, 16]);
    assert_eq!(plan.total_duration_ms(), 560);
}

#[test]
fn plan_single_frame() {
    let plan = decode(&make_gif(&[50])).unwrap().plan();
    assert!(plan.duplicated_single_frame);
    assert_eq!(plan.frame_duration_ms, 500);
    assert_eq!(plan.frames.len(), 2);
}

#[test]
fn writes_repeated_pngs() {
    let frames = decode(&make_gif(&[40, 10, 20])).unwrap();
    let plan = frames.plan();
    assert_eq!(plan.frames.iter().collect::<Vec<_>>(), [0, 0, 0, 0, 1, 2, 2]);

    let files = frames.arrange(&plan, &mut NoProgress {}).unwrap();
    let dir = files.dir().to_path_buf();
    assert_eq!(files.paths().len(), 7);

    let mut names: Vec<_> = files.paths().iter().map(|p| p.file_name().unwrap().to_owned()).collect();
    let in_order = names.clone();
    names.sort();
    assert_eq!(names, in_order, "file names must sort in playback order");

    for (path, src) in files.paths().iter().zip(plan.frames.iter()) {
        let png = lodepng::decode32_file(path).unwrap();
        assert_eq!((png.width, png.height), (4, 3));
        assert!(png.buffer.iter().all(|&px| px == color(src)), "{}", path.display());
    }

    drop(files);
    assert!(!dir.exists());
}

#[test]
#[should_panic(expected = "plan doesn't match decoded frames")]
fn plan_for_another_gif() {
    let frames = decode(&make_gif(&[10, 10])).unwrap();
    let plan = decode(&make_gif(&[10, 10, 10])).unwrap().plan();
    let _ = frames.arrange(&plan, &mut NoProgress {});
}

struct StopAfter(usize);

impl ProgressReporter for StopAfter {
    fn increase(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        true
    }
}

#[test]
fn abort_from_progress() {
    let frames = decode(&make_gif(&[10, 10, 10, 10, 10, 10])).unwrap();
    let plan = frames.plan();
    let res = frames.arrange(&plan, &mut StopAfter(2));
    assert!(matches!(res, Err(Error::Aborted)));
}

#[test]
fn counts_progress() {
    struct Count(usize);
    impl ProgressReporter for Count {
        fn increase(&mut self) -> bool {
            self.0 += 1;
            true
        }
    }

    let frames = decode(&make_gif(&[30, 10])).unwrap();
    let plan = frames.plan();
    let mut count = Count(0);
    frames.arrange(&plan, &mut count).unwrap();
    assert_eq!(count.0, plan.frames.len());
}

#[test]
fn missing_encoder() {
    let gif = make_gif(&[10, 10]);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.avif");
    let conv = Converter::new(Toolchain::with_avifenc(dir.path().join("no-avifenc")), Settings::default());
    let res = conv.convert(&gif[..], &out, &mut NoProgress {});
    assert!(matches!(res, Err(Error::Io(_))));
    assert!(!out.exists());
}

#[cfg(unix)]
fn fake_encoder(dir: &std::path::Path, body: &str) -> Toolchain {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("avifenc");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    Toolchain::with_avifenc(path)
}

// Both cases spawn processes, so they're kept in one test
#[cfg(unix)]
#[test]
fn runs_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let gif = make_gif(&[20, 10]);

    // Writes its arguments, one per line, into the -o file
    let echo = fake_encoder(dir.path(), r#"
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
for a in "$@"; do
  case "$a" in *.png) [ -f "$a" ] || exit 9 ;; esac
done
printf '%s\n' "$@" > "$out""#);
    let out = dir.path().join("out.avif");
    let plan = Converter::new(echo, Settings::default()).convert(&gif[..], &out, &mut NoProgress {}).unwrap();
    assert_eq!(plan.frame_duration_ms, 100);

    let args = std::fs::read_to_string(&out).unwrap();
    let args: Vec<_> = args.lines().collect();
    assert!(args.windows(2).any(|w| w == ["--duration", "100"]));
    assert!(args.windows(2).any(|w| w == ["--timescale", "1000"]));
    assert_eq!(args.iter().filter(|a| a.ends_with(".png")).count(), 3);

    let failing = fake_encoder(dir.path(), "echo boom >&2\nexit 3");
    let res = Converter::new(failing, Settings::default()).convert(&gif[..], &dir.path().join("fail.avif"), &mut NoProgress {});
    match res {
        Err(Error::Encoder(status, stderr)) => {
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr.trim(), "boom");
        },
        other => panic!("{:?}", other.map(|_| ())),
    }
}
