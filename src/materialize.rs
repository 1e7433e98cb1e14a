//! Writes frames as numbered PNG files for the encoder
//!
//! Frames are written once, as they're decoded, so only one canvas per thread is in memory.
//! After timing is known they're linked (or copied) into playback order.

use crate::error::*;
use crate::plan::EncodePlan;
use crate::progress::ProgressReporter;
use crate::source::GifSource;
use crossbeam_channel::Sender;
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;
use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use tempfile::TempDir;
use tracing::debug;

/// Decoded GIF frames stored as PNG files, one per source frame, plus their delays
pub struct SourceFrames {
    dir: TempDir,
    paths: Vec<PathBuf>,
    delays_ms: Vec<u32>,
}

/// PNG files in a temporary directory, in playback order.
///
/// The directory and the files are deleted when this is dropped.
pub struct FrameFiles {
    dir: TempDir,
    paths: Vec<PathBuf>,
}

impl FrameFiles {
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// One path per expanded frame. Repeated frames are separate files.
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

struct Job {
    frame_index: usize,
    image: ImgVec<RGBA8>,
    path: PathBuf,
}

/// Decodes all frames, writing each to a PNG file on up to `num_threads` threads.
///
/// Fails with [`Error::NoFrames`] if the GIF has no frames.
pub fn decode_to_pngs<R: Read>(mut source: GifSource<R>, num_threads: u8) -> ConvResult<SourceFrames> {
    let dir = tempfile::Builder::new().prefix("gif2avif").tempdir()?;
    let dir_path = dir.path().to_path_buf();

    let (paths, delays_ms) = pool(num_threads.max(1), |sender| {
        let mut paths = Vec::new();
        let mut delays_ms = Vec::new();
        while let Some(frame) = source.next_frame()? {
            let frame_index = paths.len();
            let path = dir_path.join(format!("source_{frame_index:05}.png"));
            paths.try_reserve(1)?;
            paths.push(path.clone());
            delays_ms.push(frame.delay_ms);
            sender.send(Job { frame_index, image: frame.image, path })?;
        }
        Ok((paths, delays_ms))
    })?;

    if paths.is_empty() {
        return Err(Error::NoFrames);
    }
    debug!("Found {} frames with individual durations", paths.len());
    Ok(SourceFrames { dir, paths, delays_ms })
}

/// Runs `producer` on this thread, and writes the jobs it sends on `num_threads` workers
fn pool<R>(num_threads: u8, producer: impl FnOnce(Sender<Job>) -> ConvResult<R>) -> ConvResult<R> {
    let failed = &AtomicBool::new(false);
    std::thread::scope(move |scope| {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(num_threads.into());
        let mut handles = Vec::with_capacity(num_threads.into());
        for n in 0..num_threads {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new().name(format!("png{n}")).spawn_scoped(scope, move || {
                for job in receiver {
                    if failed.load(SeqCst) {
                        break;
                    }
                    if let Err(e) = write_job(&job) {
                        failed.store(true, SeqCst);
                        return Err(e);
                    }
                }
                Ok(())
            }).map_err(|_| {
                failed.store(true, SeqCst);
                Error::ThreadSend
            })?;
            handles.push(handle);
        }
        drop(receiver);

        // A failed send means workers quit, and their error is reported instead
        let res = producer(sender).map_err(|e| {
            failed.store(true, SeqCst);
            e
        });
        handles.into_iter().try_for_each(|h| h.join().map_err(|_| Error::ThreadSend)?)?;
        res
    })
}

fn write_job(job: &Job) -> ConvResult<()> {
    let png = encode_png(job.image.as_ref()).map_err(|e| Error::PNG(format!("Can't encode frame {}: {}", job.frame_index + 1, e)))?;
    std::fs::write(&job.path, png)
        .map_err(|e| Error::PNG(format!("Can't write {}: {}", job.path.display(), e)))
}

fn encode_png(image: ImgRef<'_, RGBA8>) -> Result<Vec<u8>, lodepng::Error> {
    let (width, height) = (image.width(), image.height());
    let pixels = if image.stride() == width {
        Cow::Borrowed(&image.buf()[..width * height])
    } else {
        Cow::Owned(image.pixels().collect::<Vec<_>>())
    };
    lodepng::encode32(&pixels[..], width, height)
}

impl SourceFrames {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Per-frame durations in ms, in frame order
    #[inline]
    #[must_use]
    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }

    /// One PNG per source frame
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Works out the frame order and timing
    #[must_use]
    pub fn plan(&self) -> EncodePlan {
        EncodePlan::new(self.paths.len(), &self.delays_ms)
    }

    /// Puts one file per expanded frame in playback order. Repeats are hard links where possible.
    ///
    /// Panics if the plan refers to frames that don't exist, since that means it was made for another GIF.
    /// Fails with [`Error::Aborted`] if the reporter asks to stop.
    pub fn arrange(self, plan: &EncodePlan, reporter: &mut dyn ProgressReporter) -> ConvResult<FrameFiles> {
        if plan.frames.is_empty() {
            return Err(Error::NoFrames);
        }
        assert!(plan.frames.iter().all(|i| i < self.paths.len()), "plan doesn't match decoded frames");

        let mut paths = Vec::with_capacity(plan.frames.len());
        for (n, source_index) in plan.frames.iter().enumerate() {
            let path = self.dir.path().join(format!("frame_{n:05}.png"));
            link_or_copy(&self.paths[source_index], &path)?;
            paths.push(path);
            if !reporter.increase() {
                return Err(Error::Aborted);
            }
        }
        debug!("Arranged {} frames ({} unique) in {}", paths.len(), self.paths.len(), self.dir.path().display());
        Ok(FrameFiles { dir: self.dir, paths })
    }
}

fn link_or_copy(from: &Path, to: &Path) -> ConvResult<()> {
    std::fs::hard_link(from, to)
        .or_else(|_| std::fs::copy(from, to).map(drop))
        .map_err(|e| Error::PNG(format!("Can't write {}: {}", to.display(), e)))
}

/// Number of threads for PNG compression
#[must_use]
pub fn default_thread_count() -> u8 {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(8) as u8)
}

#[test]
fn stride_is_dropped() {
    let buf = vec![RGBA8::new(1, 2, 3, 255); 3 * 2];
    let img = ImgRef::new_stride(&buf, 2, 2, 3);
    let png = encode_png(img).unwrap();
    let decoded = lodepng::decode32(&png).unwrap();
    assert_eq!((decoded.width, decoded.height), (2, 2));
    assert!(decoded.buffer.iter().all(|&px| px == RGBA8::new(1, 2, 3, 255)));
}

#[test]
fn worker_error_wins_over_send_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad_path = dir.path().join("missing-dir").join("x.png");
    let res = pool(1, |sender| {
        for frame_index in 0..10 {
            let image = ImgVec::new(vec![RGBA8::new(0, 0, 0, 255)], 1, 1);
            sender.send(Job { frame_index, image, path: bad_path.clone() })?;
        }
        Ok(())
    });
    assert!(matches!(res, Err(Error::PNG(_))), "{res:?}");
}
