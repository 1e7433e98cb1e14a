/*
 gif2avif animated GIF to AVIF converter
 © 2026 gif2avif contributors

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

mod error;
pub use crate::error::*;
pub mod avifenc;
pub mod expand;
pub mod materialize;
pub mod plan;
pub mod progress;
pub mod source;
pub mod timing;
pub mod toolchain;

pub use crate::expand::{expand, ExpandedFrames};
pub use crate::materialize::SourceFrames;
pub use crate::plan::EncodePlan;
pub use crate::timing::{normalize, NormalizedTiming};
pub use crate::toolchain::Toolchain;

use crate::progress::ProgressReporter;
use crate::source::GifSource;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Chroma subsampling passed to the encoder
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Yuv {
    Yuv444,
    Yuv422,
    #[default]
    Yuv420,
}

impl Yuv {
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Yuv444 => "444",
            Self::Yuv422 => "422",
            Self::Yuv420 => "420",
        }
    }
}

impl std::str::FromStr for Yuv {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "444" => Self::Yuv444,
            "422" => Self::Yuv422,
            "420" => Self::Yuv420,
            _ => return Err("YUV format must be 444, 422 or 420"),
        })
    }
}

/// AV1 encoder library used by avifenc
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Aom,
    Rav1e,
    Svt,
}

impl Codec {
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Aom => "aom",
            Self::Rav1e => "rav1e",
            Self::Svt => "svt",
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "aom" => Self::Aom,
            "rav1e" => Self::Rav1e,
            "svt" => Self::Svt,
            _ => return Err("codec must be aom, rav1e or svt"),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settings {
    /// 0-100, higher is better
    pub quality_color: u8,
    /// 0-100, higher is better
    pub quality_alpha: u8,
    /// 0-10, 0 is slowest
    pub speed: u8,
    /// Encoder worker threads
    pub jobs: u16,
    pub yuv: Yuv,
    pub codec: Codec,
    pub autotiling: bool,
    /// Tune libaom for SSIM rather than PSNR
    pub tune_ssim: bool,
    /// Hide the encoder's own progress output
    pub quiet: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality_color: 30,
            quality_alpha: 95,
            speed: 2,
            jobs: 8,
            yuv: Yuv::Yuv420,
            codec: Codec::Aom,
            autotiling: true,
            tune_ssim: true,
            quiet: false,
        }
    }
}

/// Converts GIF files using the given external tools
pub struct Converter {
    toolchain: Toolchain,
    settings: Settings,
    png_threads: u8,
}

impl Converter {
    #[must_use]
    pub fn new(toolchain: Toolchain, settings: Settings) -> Self {
        Self {
            toolchain,
            settings,
            png_threads: materialize::default_thread_count(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decodes the GIF, writing each frame to a temporary PNG file as it goes.
    ///
    /// Use [`SourceFrames::plan()`] to get the frame order and timing.
    pub fn decode(&self, input: impl Read) -> ConvResult<SourceFrames> {
        materialize::decode_to_pngs(GifSource::new(input)?, self.png_threads)
    }

    /// Writes an animated AVIF to `output`.
    ///
    /// `ProgressReporter.increase()` is called each time a frame is ready for the encoder.
    /// Temporary files are removed when this returns, also on error.
    pub fn convert(&self, input: impl Read, output: &Path, reporter: &mut dyn ProgressReporter) -> ConvResult<EncodePlan> {
        let frames = self.decode(input)?;
        let plan = frames.plan();
        self.encode(frames, &plan, output, reporter)?;
        Ok(plan)
    }

    /// Encodes decoded frames according to the plan (see [`Converter::decode()`])
    pub fn encode(&self, frames: SourceFrames, plan: &EncodePlan, output: &Path, reporter: &mut dyn ProgressReporter) -> ConvResult<()> {
        let files = frames.arrange(plan, reporter)?;
        avifenc::encode(&self.toolchain, &self.settings, plan.frame_duration_ms, output, files.paths())?;
        info!("Conversion complete: {}", output.display());
        Ok(())
    }

    /// Same as [`Converter::convert()`], but reads from a file
    pub fn convert_file(&self, input: &Path, output: &Path, reporter: &mut dyn ProgressReporter) -> ConvResult<EncodePlan> {
        info!("Converting: {} -> {}", input.display(), output.display());
        let file = BufReader::new(File::open(input)?);
        self.convert(file, output, reporter)
    }
}

#[test]
fn settings_parse() {
    assert_eq!("422".parse::<Yuv>(), Ok(Yuv::Yuv422));
    assert!("400".parse::<Yuv>().is_err());
    assert_eq!("svt".parse::<Codec>(), Ok(Codec::Svt));
    assert_eq!(Settings::default().codec, Codec::Aom);
    assert!(!Settings::default().quiet);
}
